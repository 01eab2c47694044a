//! Baby Tracker - caregiving activity log with a shared active timer
//!
//! The server owns a single timer slot and an append-only activity log. Any
//! number of clients mirror the slot locally, push their own changes to it
//! and poll it to pick up changes made elsewhere.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use client::{HttpBackend, LocalBackend, TimerBackend, TimerClient};
pub use config::Config;
pub use db::Database;
pub use error::{AppError, AppResult};
pub use state::AppState;
pub use tasks::{spawn_client, ClientHandle, LoopConfig};
pub use utils::signals::shutdown_signal;
