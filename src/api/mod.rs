//! HTTP API module
//!
//! This module contains the endpoint handlers, wire payloads and response
//! structures.

pub mod handlers;
pub mod payloads;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Path of the single method-dispatched resource
pub const API_PATH: &str = "/api";

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            API_PATH,
            get(get_handler).post(post_handler).options(options_handler),
        )
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
