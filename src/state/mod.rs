//! State management module
//!
//! Domain records (the shared timer, activity log entries) and the server's
//! application state.

pub mod activity;
pub mod app_state;
pub mod timer_state;

// Re-export main types
pub use activity::{
    ActivityEntry, ActivityRecord, ActivityType, NappyKind, TimedActivity, MAX_MILK_AMOUNT,
    MIN_MILK_AMOUNT,
};
pub use app_state::AppState;
pub use timer_state::TimerState;
