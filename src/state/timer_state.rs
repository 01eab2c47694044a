//! The shared active timer record

use chrono::{DateTime, TimeDelta, Utc};

use super::{ActivityType, TimedActivity};
use crate::{
    error::{AppError, AppResult},
    utils::time::millis_between,
};

/// The single in-progress (or paused) activity, if any.
///
/// Two records are the same timer exactly when every field is equal; the
/// reconciliation loop relies on that equality as its change fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerState {
    pub activity: ActivityType,
    pub started_at: DateTime<Utc>,
    /// Set while paused, absent while running
    pub paused_at: Option<DateTime<Utc>>,
    /// Sum of completed pause intervals in milliseconds
    pub paused_ms: u64,
    pub milk_amount: Option<u32>,
}

impl TimerState {
    /// Create a running timer with no pause history
    pub fn new(activity: ActivityType, started_at: DateTime<Utc>, milk_amount: Option<u32>) -> Self {
        Self {
            activity,
            started_at,
            paused_at: None,
            paused_ms: 0,
            milk_amount,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Running time at `now`; frozen at `paused_at` while paused.
    ///
    /// Can be negative only for records that failed validation.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        let until = self.paused_at.unwrap_or(now);
        millis_between(&self.started_at, &until) - self.paused_ms as i64
    }

    /// Boundary validation for records entering the store.
    ///
    /// `skew` is how far the writer's clock may run ahead of ours before a
    /// running timer counts as starting in the future.
    pub fn validate(&self, now: DateTime<Utc>, skew: TimeDelta) -> AppResult<()> {
        self.activity.check_milk_amount(self.milk_amount)?;

        if let Some(paused_at) = self.paused_at {
            if paused_at < self.started_at {
                return Err(AppError::validation("pauseTime must not be before startTime"));
            }
        }

        let reference = if self.is_paused() { now } else { now + skew };
        if self.elapsed_ms(reference) < 0 {
            return Err(AppError::validation(
                "Timer would have a negative elapsed time",
            ));
        }
        Ok(())
    }

    /// Copy of this timer paused at `now`
    pub fn paused(&self, now: DateTime<Utc>) -> Self {
        Self {
            paused_at: Some(now.max(self.started_at)),
            ..self.clone()
        }
    }

    /// Copy of this timer resumed at `now`, folding the open pause into the total
    pub fn resumed(&self, now: DateTime<Utc>) -> Self {
        let open_pause = self
            .paused_at
            .map(|paused_at| millis_between(&paused_at, &now).max(0) as u64)
            .unwrap_or(0);
        Self {
            paused_at: None,
            paused_ms: self.paused_ms + open_pause,
            ..self.clone()
        }
    }

    /// The log entry for this run ending at `now`.
    ///
    /// Duration is `(paused_at or now) - started_at - paused_ms`; the recorded
    /// pause time is whatever remains of the wall-clock span, so a run stopped
    /// while paused counts its trailing pause as paused time.
    pub fn finish(&self, now: DateTime<Utc>) -> TimedActivity {
        let ended_at = now.max(self.started_at);
        let duration_ms = self.elapsed_ms(ended_at).max(0) as u64;
        let span_ms = millis_between(&self.started_at, &ended_at).max(0) as u64;

        TimedActivity {
            activity: self.activity,
            started_at: self.started_at,
            ended_at,
            duration_ms,
            paused_ms: span_ms.saturating_sub(duration_ms),
            milk_amount: self.milk_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    #[test]
    fn elapsed_excludes_pauses() {
        let timer = TimerState::new(ActivityType::Sleeping, t0(), None);
        let paused = timer.paused(t0() + secs(30));
        assert_eq!(paused.elapsed_ms(t0() + secs(500)), 30_000);

        let resumed = paused.resumed(t0() + secs(90));
        assert_eq!(resumed.paused_ms, 60_000);
        assert_eq!(resumed.elapsed_ms(t0() + secs(150)), 90_000);
    }

    #[test]
    fn finish_while_paused_counts_trailing_pause() {
        let timer = TimerState::new(ActivityType::Breastfeeding, t0(), None).paused(t0() + secs(40));
        let done = timer.finish(t0() + secs(100));
        assert_eq!(done.duration_ms, 40_000);
        assert_eq!(done.paused_ms, 60_000);
        assert_eq!(done.ended_at, t0() + secs(100));
    }

    #[test]
    fn rejects_pause_before_start() {
        let mut timer = TimerState::new(ActivityType::Sleeping, t0(), None);
        timer.paused_at = Some(t0() - secs(1));
        assert!(timer.validate(t0() + secs(10), TimeDelta::zero()).unwrap_err().is_validation());
    }

    #[test]
    fn rejects_negative_elapsed() {
        let mut timer = TimerState::new(ActivityType::Sleeping, t0(), None);
        timer.paused_ms = 120_000;
        assert!(timer.validate(t0() + secs(60), TimeDelta::zero()).is_err());

        let future = TimerState::new(ActivityType::Sleeping, t0() + secs(3), None);
        assert!(future.validate(t0(), TimeDelta::zero()).is_err());
        assert!(future.validate(t0(), secs(5)).is_ok());
    }

    #[test]
    fn rejects_out_of_range_milk() {
        let timer = TimerState::new(ActivityType::Bottlefeeding, t0(), Some(600));
        assert!(timer.validate(t0() + secs(1), TimeDelta::zero()).unwrap_err().is_validation());
    }
}
