//! Per-client timer state machine
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//! Running|Paused --stop--> Idle
//! any --reconcile(remote)--> Running|Paused|Idle
//! ```
//!
//! The machine performs no I/O and takes `now` explicitly. Local actions are
//! applied immediately and hand back the write the caller should persist;
//! the caller reports the outcome through [`TimerClient::ack_write`]. Every
//! change of local state bumps a revision, and any write acknowledgement or
//! poll result tagged with an older revision is ignored so a slow response
//! can never undo a newer state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    error::{AppError, AppResult},
    state::{ActivityEntry, ActivityType, TimerState},
    utils::{format::format_clock, time::format_timestamp},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Running(TimerState),
    Paused(TimerState),
}

impl ClientState {
    /// Client state matching a slot value
    pub fn from_slot(remote: Option<TimerState>) -> Self {
        match remote {
            None => ClientState::Idle,
            Some(timer) if timer.is_paused() => ClientState::Paused(timer),
            Some(timer) => ClientState::Running(timer),
        }
    }

    pub fn timer(&self) -> Option<&TimerState> {
        match self {
            ClientState::Idle => None,
            ClientState::Running(timer) | ClientState::Paused(timer) => Some(timer),
        }
    }

    pub fn status(&self) -> TimerStatus {
        match self {
            ClientState::Idle => TimerStatus::Idle,
            ClientState::Running(_) => TimerStatus::Running,
            ClientState::Paused(_) => TimerStatus::Paused,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

/// A local change waiting to be pushed to the shared slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub revision: u64,
    pub snapshot: TimerState,
}

/// Revision a poll was issued at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    revision: u64,
}

/// A stop in progress: the slot must be cleared, then `entry` appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopPlan {
    pub entry: ActivityEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAck {
    /// The write carried the state currently shown
    Current,
    /// A newer local state superseded it
    Stale,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Remote state matches what was last seen
    Unchanged,
    /// Local state moved on while the poll was in flight
    Stale,
    /// An idle client picked up a timer started elsewhere
    Restored,
    /// A different remote timer overwrote the local one
    Replaced,
    /// The slot was emptied elsewhere
    Cleared,
}

/// Snapshot published to whatever renders the timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientView {
    pub status: TimerStatus,
    pub activity: Option<ActivityType>,
    pub started_at: Option<String>,
    pub milk_amount: Option<u32>,
    pub elapsed_ms: i64,
    pub display: String,
}

impl Default for ClientView {
    fn default() -> Self {
        Self {
            status: TimerStatus::Idle,
            activity: None,
            started_at: None,
            milk_amount: None,
            elapsed_ms: 0,
            display: format_clock(0),
        }
    }
}

#[derive(Debug)]
pub struct TimerClient {
    state: ClientState,
    revision: u64,
    writes_in_flight: usize,
    /// Remote slot as of the last applied poll or acknowledged write.
    /// `None` means unknown, which forces the next poll to reconcile.
    last_seen: Option<Option<TimerState>>,
    stopping: bool,
}

impl Default for TimerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerClient {
    pub fn new() -> Self {
        Self {
            state: ClientState::Idle,
            revision: 0,
            writes_in_flight: 0,
            last_seen: None,
            stopping: false,
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn writes_in_flight(&self) -> usize {
        self.writes_in_flight
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    // ── Local commands ───────────────────────────────────────────────

    /// Start timing `activity`. Rejected without any change unless idle and
    /// the milk amount satisfies the activity's rule.
    pub fn start(
        &mut self,
        activity: ActivityType,
        milk_amount: Option<u32>,
        now: DateTime<Utc>,
    ) -> AppResult<PendingWrite> {
        self.ensure_not_stopping()?;
        if let Some(timer) = self.state.timer() {
            return Err(AppError::TimerActive(timer.activity));
        }
        activity.check_milk_amount(milk_amount)?;

        info!("Starting {} timer", activity);
        let timer = TimerState::new(activity, now, milk_amount);
        Ok(self.apply_local(timer))
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> AppResult<PendingWrite> {
        self.ensure_not_stopping()?;
        let paused = match &self.state {
            ClientState::Running(timer) => timer.paused(now),
            ClientState::Paused(_) => return Err(AppError::NotRunning),
            ClientState::Idle => return Err(AppError::NoActiveTimer),
        };

        info!("Pausing {} timer", paused.activity);
        Ok(self.apply_local(paused))
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> AppResult<PendingWrite> {
        self.ensure_not_stopping()?;
        let resumed = match &self.state {
            ClientState::Paused(timer) => timer.resumed(now),
            ClientState::Running(_) => return Err(AppError::NotPaused),
            ClientState::Idle => return Err(AppError::NoActiveTimer),
        };

        info!(
            "Resuming {} timer ({} ms paused so far)",
            resumed.activity, resumed.paused_ms
        );
        Ok(self.apply_local(resumed))
    }

    /// Freeze the run at `now` and compute its log entry. Other commands are
    /// rejected until [`complete_stop`](Self::complete_stop) or
    /// [`abort_stop`](Self::abort_stop).
    pub fn begin_stop(&mut self, now: DateTime<Utc>) -> AppResult<StopPlan> {
        self.ensure_not_stopping()?;
        let timer = self.state.timer().ok_or(AppError::NoActiveTimer)?;
        let entry = ActivityEntry::Timed(timer.finish(now));
        self.stopping = true;
        Ok(StopPlan { entry })
    }

    /// The slot could not be cleared; keep the timer as it was
    pub fn abort_stop(&mut self) {
        self.stopping = false;
    }

    /// The slot is cleared; the client is idle whatever happens to the log append
    pub fn complete_stop(&mut self) {
        self.stopping = false;
        self.state = ClientState::Idle;
        self.revision += 1;
        self.last_seen = Some(None);
        info!("Timer stopped");
    }

    fn ensure_not_stopping(&self) -> AppResult<()> {
        if self.stopping {
            Err(AppError::StopInProgress)
        } else {
            Ok(())
        }
    }

    /// Install `next` as the local state and tag the write that persists it
    fn apply_local(&mut self, snapshot: TimerState) -> PendingWrite {
        self.state = ClientState::from_slot(Some(snapshot.clone()));
        self.revision += 1;
        self.writes_in_flight += 1;
        PendingWrite {
            revision: self.revision,
            snapshot,
        }
    }

    /// Record the outcome of a [`PendingWrite`]
    pub fn ack_write(&mut self, revision: u64, result: &AppResult<()>) -> WriteAck {
        self.writes_in_flight = self.writes_in_flight.saturating_sub(1);

        if let Err(e) = result {
            warn!("Failed to persist timer revision {}: {}", revision, e);
            self.last_seen = None;
            return WriteAck::Failed;
        }

        if revision == self.revision {
            self.last_seen = Some(self.state.timer().cloned());
            WriteAck::Current
        } else {
            debug!(
                "Ignoring acknowledgement of revision {} (now at {})",
                revision, self.revision
            );
            WriteAck::Stale
        }
    }

    /// A queued write was replaced by a newer one before it was sent
    pub fn supersede_write(&mut self, revision: u64) {
        self.writes_in_flight = self.writes_in_flight.saturating_sub(1);
        debug!("Revision {} superseded before it was sent", revision);
    }

    // ── Reconciliation ───────────────────────────────────────────────

    pub fn begin_poll(&self) -> PollTicket {
        PollTicket {
            revision: self.revision,
        }
    }

    /// Apply a successfully fetched remote slot.
    ///
    /// Only ever reads: reconciliation never produces a write.
    pub fn apply_poll(&mut self, ticket: PollTicket, remote: Option<TimerState>) -> Reconciled {
        if self.stopping || self.writes_in_flight > 0 || ticket.revision != self.revision {
            debug!(
                "Discarding poll from revision {} (now at {}, {} writes in flight)",
                ticket.revision, self.revision, self.writes_in_flight
            );
            return Reconciled::Stale;
        }

        if self.last_seen.as_ref() == Some(&remote) {
            return Reconciled::Unchanged;
        }
        self.last_seen = Some(remote.clone());

        if self.state.timer() == remote.as_ref() {
            return Reconciled::Unchanged;
        }

        let was_idle = self.state == ClientState::Idle;
        let outcome = match &remote {
            None => Reconciled::Cleared,
            Some(_) if was_idle => Reconciled::Restored,
            Some(_) => Reconciled::Replaced,
        };

        match &remote {
            Some(timer) => info!(
                "Remote {} timer started {} picked up ({:?})",
                timer.activity,
                format_timestamp(&timer.started_at),
                outcome
            ),
            None => info!("Remote timer was stopped elsewhere"),
        }

        self.state = ClientState::from_slot(remote);
        self.revision += 1;
        outcome
    }

    // ── Display ──────────────────────────────────────────────────────

    /// Elapsed time for the display tick; `None` unless running
    pub fn tick(&self, now: DateTime<Utc>) -> Option<i64> {
        match &self.state {
            ClientState::Running(timer) => Some(timer.elapsed_ms(now).max(0)),
            _ => None,
        }
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        self.state
            .timer()
            .map(|timer| timer.elapsed_ms(now).max(0))
            .unwrap_or(0)
    }

    pub fn view(&self, now: DateTime<Utc>) -> ClientView {
        let elapsed_ms = self.elapsed_ms(now);
        let timer = self.state.timer();
        ClientView {
            status: self.state.status(),
            activity: timer.map(|t| t.activity),
            started_at: timer.map(|t| format_timestamp(&t.started_at)),
            milk_amount: timer.and_then(|t| t.milk_amount),
            elapsed_ms,
            display: format_clock(elapsed_ms),
        }
    }
}
