//! Server-side stores
//!
//! The shared timer slot and the activity history, both backed by the
//! embedded database.

pub mod activity_log;
pub mod timer_store;

// Re-export main types
pub use activity_log::{ActivityLog, HISTORY_WINDOW_DAYS, RECENT_PER_TYPE};
pub use timer_store::TimerStore;
