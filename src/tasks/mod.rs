//! Background tasks module
//!
//! This module contains the client runtime that keeps a local timer in step
//! with the shared slot.

pub mod reconciliation;

// Re-export main types
pub use reconciliation::{spawn_client, ClientHandle, LoopConfig, ReconciliationLoop};
