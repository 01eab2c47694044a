//! HTTP endpoint handlers
//!
//! One resource path dispatched on method and the `action` / `type` query
//! parameters.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, info};

use super::{
    payloads::{ActivityPayload, TimerPayload},
    responses::{CreatedResponse, DataResponse, HealthResponse, SuccessResponse},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    utils::time,
};

/// The only `action` value the endpoint understands
pub const ACTIVE_TIMER_ACTION: &str = "active-timer";

#[derive(Debug, Default, Deserialize)]
pub struct ApiQuery {
    pub action: Option<String>,
    #[serde(rename = "type")]
    pub type_filter: Option<String>,
}

impl ApiQuery {
    fn targets_timer(&self) -> AppResult<bool> {
        match self.action.as_deref() {
            None => Ok(false),
            Some(ACTIVE_TIMER_ACTION) => Ok(true),
            Some(other) => Err(AppError::validation(format!("Unknown action '{}'", other))),
        }
    }
}

/// Handle GET - the active timer or the activity history
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ApiQuery>,
) -> Result<Response, AppError> {
    if query.targets_timer()? {
        let timer = state.timer_store.get_active()?;
        let payload = timer.as_ref().map(TimerPayload::from);
        return Ok(Json(DataResponse::new(payload)).into_response());
    }

    let records = match query.type_filter.as_deref() {
        Some(type_tag) => state.activity_log.latest_of_type(type_tag)?,
        None => state.activity_log.recent(time::now())?,
    };
    debug!("Returning {} activities", records.len());

    let activities: Vec<ActivityPayload> = records.iter().map(ActivityPayload::from).collect();
    Ok(Json(DataResponse::new(activities)).into_response())
}

/// Handle POST - write the timer slot or append to the history
pub async fn post_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ApiQuery>,
    body: Bytes,
) -> Result<Response, AppError> {
    if query.targets_timer()? {
        let payload: TimerPayload = parse_body(&body)?;
        match payload.into_state()? {
            Some(timer) => state.timer_store.set_active(&timer)?,
            None => state.timer_store.clear_active()?,
        }
        return Ok(Json(SuccessResponse::ok()).into_response());
    }

    let payload: ActivityPayload = parse_body(&body)?;
    let entry = payload.into_entry()?;
    let id = state.activity_log.append(&entry)?;
    info!("Activity endpoint stored {} #{}", entry.type_tag(), id);
    Ok(Json(CreatedResponse::new(id)).into_response())
}

/// Handle OPTIONS - CORS preflight without a body
pub async fn options_handler() -> StatusCode {
    StatusCode::OK
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.get_uptime()))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    if body.is_empty() {
        return Err(AppError::validation("Invalid input data: empty body"));
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::validation(format!("Invalid input data: {}", e)))
}
