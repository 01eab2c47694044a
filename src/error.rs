//! Error taxonomy shared by the server, the stores and the client runtime

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::{api::responses::ErrorResponse, state::ActivityType};

#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or out-of-range input. Not retriable without correction.
    #[error("{0}")]
    Validation(String),

    /// I/O or database fault. Retriable by the caller.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Client-side request failure; the next poll or tick retries it.
    #[error("Network error: {0}")]
    Network(String),

    // ---------------------------
    // Client state machine rejections
    // ---------------------------
    #[error("A {0} timer is already active")]
    TimerActive(ActivityType),

    #[error("No timer is active")]
    NoActiveTimer,

    #[error("Timer is not running")]
    NotRunning,

    #[error("Timer is not paused")]
    NotPaused,

    #[error("A stop is already in progress")]
    StopInProgress,

    #[error("Timer client has shut down")]
    ClientClosed,

    /// The shared slot was cleared but the completed activity never reached the log.
    #[error("Timer stopped but the activity was not saved: {0}")]
    ActivityNotSaved(Box<AppError>),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn status_code(&self) -> StatusCode {
        if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
