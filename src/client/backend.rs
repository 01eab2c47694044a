//! Transports between a TimerClient and the shared stores

use std::{future::Future, sync::Arc};

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    api::{
        handlers::ACTIVE_TIMER_ACTION,
        payloads::{ActivityPayload, TimerPayload},
        responses::{CreatedResponse, DataResponse, ErrorResponse, SuccessResponse},
        API_PATH,
    },
    error::{AppError, AppResult},
    state::{ActivityEntry, ActivityRecord, AppState, TimerState},
    utils::time,
};

/// What a client needs from the server: the timer slot and the activity log.
///
/// Calls are the only suspension points of the client runtime.
pub trait TimerBackend: Send + Sync + 'static {
    fn get_active(&self) -> impl Future<Output = AppResult<Option<TimerState>>> + Send;

    fn set_active(&self, state: TimerState) -> impl Future<Output = AppResult<()>> + Send;

    fn clear_active(&self) -> impl Future<Output = AppResult<()>> + Send;

    fn append_activity(&self, entry: ActivityEntry) -> impl Future<Output = AppResult<i64>> + Send;

    /// Recent history, optionally limited to one type tag
    fn history(
        &self,
        type_filter: Option<String>,
    ) -> impl Future<Output = AppResult<Vec<ActivityPayload>>> + Send;
}

/// Talks to a running server over its JSON API
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: String,
}

impl HttpBackend {
    /// `server` is the base URL, e.g. `http://localhost:8080`
    pub fn new(server: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}{}", server.trim_end_matches('/'), API_PATH),
        }
    }

    async fn post_timer(&self, payload: &TimerPayload) -> AppResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("action", ACTIVE_TIMER_ACTION)])
            .json(payload)
            .send()
            .await?;
        let _: SuccessResponse = decode(response).await?;
        Ok(())
    }
}

impl TimerBackend for HttpBackend {
    async fn get_active(&self) -> AppResult<Option<TimerState>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("action", ACTIVE_TIMER_ACTION)])
            .send()
            .await?;
        let body: DataResponse<Option<TimerPayload>> = decode(response).await?;
        match body.data {
            Some(payload) => payload.into_state(),
            None => Ok(None),
        }
    }

    async fn set_active(&self, state: TimerState) -> AppResult<()> {
        self.post_timer(&TimerPayload::from(&state)).await
    }

    async fn clear_active(&self) -> AppResult<()> {
        self.post_timer(&TimerPayload::clear()).await
    }

    async fn append_activity(&self, entry: ActivityEntry) -> AppResult<i64> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ActivityPayload::from(&entry))
            .send()
            .await?;
        let body: CreatedResponse = decode(response).await?;
        Ok(body.id)
    }

    async fn history(&self, type_filter: Option<String>) -> AppResult<Vec<ActivityPayload>> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(type_tag) = &type_filter {
            request = request.query(&[("type", type_tag.as_str())]);
        }
        let body: DataResponse<Vec<ActivityPayload>> = decode(request.send().await?).await?;
        Ok(body.data)
    }
}

/// Map a response onto the error taxonomy: 400 is the caller's fault, any
/// other failure status is a server-side storage fault.
async fn decode<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => format!("HTTP {}", status),
    };
    debug!("Server answered {}: {}", status, message);

    if status == reqwest::StatusCode::BAD_REQUEST {
        Err(AppError::Validation(message))
    } else {
        Err(AppError::Storage(message))
    }
}

/// Calls the stores in-process, bypassing HTTP
#[derive(Debug, Clone)]
pub struct LocalBackend {
    state: Arc<AppState>,
}

impl LocalBackend {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl TimerBackend for LocalBackend {
    async fn get_active(&self) -> AppResult<Option<TimerState>> {
        self.state.timer_store.get_active()
    }

    async fn set_active(&self, state: TimerState) -> AppResult<()> {
        self.state.timer_store.set_active(&state)
    }

    async fn clear_active(&self) -> AppResult<()> {
        self.state.timer_store.clear_active()
    }

    async fn append_activity(&self, entry: ActivityEntry) -> AppResult<i64> {
        self.state.activity_log.append(&entry)
    }

    async fn history(&self, type_filter: Option<String>) -> AppResult<Vec<ActivityPayload>> {
        let records: Vec<ActivityRecord> = match type_filter {
            Some(type_tag) => self.state.activity_log.latest_of_type(&type_tag)?,
            None => self.state.activity_log.recent(time::now())?,
        };
        Ok(records.iter().map(ActivityPayload::from).collect())
    }
}
