//! Main application state shared by the HTTP handlers

use std::time::Instant;

use chrono::TimeDelta;

use crate::{
    db::Database,
    services::{ActivityLog, TimerStore},
};

/// Server state: the two stores plus metadata for the health endpoint
#[derive(Debug)]
pub struct AppState {
    pub timer_store: TimerStore,
    pub activity_log: ActivityLog,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl AppState {
    /// Build the stores on top of an opened database
    pub fn new(db: Database, port: u16, host: String, max_clock_skew: TimeDelta) -> Self {
        Self {
            timer_store: TimerStore::new(db.clone(), max_clock_skew),
            activity_log: ActivityLog::new(db),
            start_time: Instant::now(),
            port,
            host,
        }
    }

    /// In-memory state with strict clock checks, for tests and embedded use
    pub fn in_memory() -> crate::error::AppResult<Self> {
        Ok(Self::new(
            Database::open_in_memory()?,
            0,
            "127.0.0.1".to_string(),
            TimeDelta::zero(),
        ))
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
