#![allow(dead_code)]
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use baby_tracker::{
    api::payloads::ActivityPayload,
    client::{LocalBackend, TimerBackend},
    error::{AppError, AppResult},
    state::{ActivityEntry, AppState, TimerState},
    tasks::LoopConfig,
};

/// Fresh server state over an in-memory database
pub fn memory_state() -> Arc<AppState> {
    Arc::new(AppState::in_memory().expect("in-memory database"))
}

/// Loop timing that leaves polling to explicit `sync` calls
pub fn manual_sync() -> LoopConfig {
    LoopConfig {
        poll_interval: Duration::from_secs(3600),
        tick_interval: Duration::from_secs(3600),
    }
}

/// Loop timing fast enough for tests that wait on the poll interval
pub fn fast_poll() -> LoopConfig {
    LoopConfig {
        poll_interval: Duration::from_millis(20),
        tick_interval: Duration::from_millis(20),
    }
}

/// Local backend whose calls can be made to fail on demand
pub struct FlakyBackend {
    inner: LocalBackend,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_appends: AtomicBool,
}

impl FlakyBackend {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            inner: LocalBackend::new(state),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_appends: AtomicBool::new(false),
        }
    }

    fn check(flag: &AtomicBool) -> AppResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(AppError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl TimerBackend for FlakyBackend {
    async fn get_active(&self) -> AppResult<Option<TimerState>> {
        Self::check(&self.fail_reads)?;
        self.inner.get_active().await
    }

    async fn set_active(&self, state: TimerState) -> AppResult<()> {
        Self::check(&self.fail_writes)?;
        self.inner.set_active(state).await
    }

    async fn clear_active(&self) -> AppResult<()> {
        Self::check(&self.fail_writes)?;
        self.inner.clear_active().await
    }

    async fn append_activity(&self, entry: ActivityEntry) -> AppResult<i64> {
        Self::check(&self.fail_appends)?;
        self.inner.append_activity(entry).await
    }

    async fn history(&self, type_filter: Option<String>) -> AppResult<Vec<ActivityPayload>> {
        Self::check(&self.fail_reads)?;
        self.inner.history(type_filter).await
    }
}

/// Local backend whose first `set_active` is held back, so later writes would
/// overtake it if they were allowed on the wire at the same time
pub struct SlowFirstWriteBackend {
    inner: LocalBackend,
    delay: Duration,
    delayed: AtomicBool,
}

impl SlowFirstWriteBackend {
    pub fn new(state: Arc<AppState>, delay: Duration) -> Self {
        Self {
            inner: LocalBackend::new(state),
            delay,
            delayed: AtomicBool::new(false),
        }
    }
}

impl TimerBackend for SlowFirstWriteBackend {
    async fn get_active(&self) -> AppResult<Option<TimerState>> {
        self.inner.get_active().await
    }

    async fn set_active(&self, state: TimerState) -> AppResult<()> {
        if !self.delayed.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.set_active(state).await
    }

    async fn clear_active(&self) -> AppResult<()> {
        self.inner.clear_active().await
    }

    async fn append_activity(&self, entry: ActivityEntry) -> AppResult<i64> {
        self.inner.append_activity(entry).await
    }

    async fn history(&self, type_filter: Option<String>) -> AppResult<Vec<ActivityPayload>> {
        self.inner.history(type_filter).await
    }
}
