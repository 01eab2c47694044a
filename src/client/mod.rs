//! Client side of the shared timer
//!
//! A [`TimerClient`] mirrors the server's timer slot for one tab or process;
//! a [`TimerBackend`] carries its reads and writes.

pub mod backend;
pub mod timer_client;

// Re-export main types
pub use backend::{HttpBackend, LocalBackend, TimerBackend};
pub use timer_client::{
    ClientState, ClientView, PendingWrite, PollTicket, Reconciled, StopPlan, TimerClient,
    TimerStatus, WriteAck,
};
