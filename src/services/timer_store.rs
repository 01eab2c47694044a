//! Server-side authority for the single shared timer slot
//!
//! Last writer wins: `set_active` overwrites row 1 unconditionally and there
//! is no concurrency token. Validation happens here, at the only place the
//! slot accepts outside input.

use chrono::TimeDelta;
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

use crate::{
    db::Database,
    error::{AppError, AppResult},
    state::{ActivityType, TimerState},
    utils::time::{self, format_timestamp},
};

#[derive(Debug, Clone)]
pub struct TimerStore {
    db: Database,
    max_clock_skew: TimeDelta,
}

impl TimerStore {
    pub fn new(db: Database, max_clock_skew: TimeDelta) -> Self {
        Self { db, max_clock_skew }
    }

    /// The most recently committed timer, if any
    pub fn get_active(&self) -> AppResult<Option<TimerState>> {
        self.db.with_conn(|conn| {
            let raw = conn
                .query_row(
                    "SELECT task_type, start_time, pause_time, total_paused_time, milk_amount
                     FROM active_timer WHERE id = 1",
                    [],
                    RawTimerRow::from_row,
                )
                .optional()?;
            raw.map(RawTimerRow::into_state).transpose()
        })
    }

    /// Overwrite the slot with `state`
    pub fn set_active(&self, state: &TimerState) -> AppResult<()> {
        state.validate(time::now(), self.max_clock_skew)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO active_timer
                    (id, task_type, start_time, pause_time, total_paused_time, milk_amount)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5)",
                params![
                    state.activity.as_str(),
                    format_timestamp(&state.started_at),
                    state.paused_at.as_ref().map(format_timestamp),
                    to_i64(state.paused_ms)?,
                    state.milk_amount,
                ],
            )?;
            Ok(())
        })?;

        info!(
            "Active timer set: {} started {} ({})",
            state.activity,
            format_timestamp(&state.started_at),
            if state.is_paused() { "paused" } else { "running" }
        );
        Ok(())
    }

    /// Empty the slot. Clearing an empty slot succeeds.
    pub fn clear_active(&self) -> AppResult<()> {
        let removed = self
            .db
            .with_conn(|conn| Ok(conn.execute("DELETE FROM active_timer WHERE id = 1", [])?))?;

        if removed > 0 {
            info!("Active timer cleared");
        } else {
            debug!("Clear requested on an empty timer slot");
        }
        Ok(())
    }
}

struct RawTimerRow {
    task_type: String,
    start_time: String,
    pause_time: Option<String>,
    total_paused_time: i64,
    milk_amount: Option<i64>,
}

impl RawTimerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            task_type: row.get(0)?,
            start_time: row.get(1)?,
            pause_time: row.get(2)?,
            total_paused_time: row.get(3)?,
            milk_amount: row.get(4)?,
        })
    }

    fn into_state(self) -> AppResult<TimerState> {
        let activity: ActivityType = self.task_type.parse().map_err(corrupt)?;
        let started_at = time::parse_timestamp("start_time", &self.start_time).map_err(corrupt)?;
        let paused_at = self
            .pause_time
            .map(|raw| time::parse_timestamp("pause_time", &raw))
            .transpose()
            .map_err(corrupt)?;
        let paused_ms = u64::try_from(self.total_paused_time).map_err(|_| {
            AppError::storage(format!(
                "Stored total_paused_time {} is negative",
                self.total_paused_time
            ))
        })?;
        let milk_amount = self
            .milk_amount
            .map(|amount| {
                u32::try_from(amount).map_err(|_| {
                    AppError::storage(format!("Stored milk_amount {} is out of range", amount))
                })
            })
            .transpose()?;

        Ok(TimerState {
            activity,
            started_at,
            paused_at,
            paused_ms,
            milk_amount,
        })
    }
}

/// Bad data already on disk is a storage fault, not a caller mistake
fn corrupt(err: AppError) -> AppError {
    AppError::storage(format!("Corrupt active timer row: {}", err))
}

pub(crate) fn to_i64(value: u64) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|_| AppError::validation(format!("Value {} exceeds the integer range", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TimerStore {
        TimerStore::new(Database::open_in_memory().unwrap(), TimeDelta::zero())
    }

    fn running(activity: ActivityType, milk_amount: Option<u32>) -> TimerState {
        TimerState::new(activity, time::now() - TimeDelta::seconds(30), milk_amount)
    }

    #[test]
    fn empty_slot_reads_as_none() {
        assert_eq!(store().get_active().unwrap(), None);
    }

    #[test]
    fn set_then_get_returns_identical_state() {
        let store = store();
        let state = running(ActivityType::Bottlefeeding, Some(120)).paused(time::now());
        store.set_active(&state).unwrap();
        assert_eq!(store.get_active().unwrap(), Some(state));
    }

    #[test]
    fn set_overwrites_unconditionally() {
        let store = store();
        store.set_active(&running(ActivityType::Sleeping, None)).unwrap();
        let newer = running(ActivityType::Breastfeeding, None);
        store.set_active(&newer).unwrap();
        assert_eq!(store.get_active().unwrap(), Some(newer));
    }

    #[test]
    fn clear_is_idempotent() {
        let store = store();
        store.clear_active().unwrap();
        store.set_active(&running(ActivityType::Sleeping, None)).unwrap();
        store.clear_active().unwrap();
        store.clear_active().unwrap();
        assert_eq!(store.get_active().unwrap(), None);
    }

    #[test]
    fn invalid_state_leaves_slot_untouched() {
        let store = store();
        let existing = running(ActivityType::Sleeping, None);
        store.set_active(&existing).unwrap();

        let err = store
            .set_active(&running(ActivityType::Bottlefeeding, Some(600)))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.get_active().unwrap(), Some(existing));
    }

    #[test]
    fn corrupt_row_is_a_storage_error() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO active_timer (id, task_type, start_time) VALUES (1, 'juggling', 'soon')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let err = TimerStore::new(db, TimeDelta::zero()).get_active().unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
