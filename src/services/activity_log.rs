//! Append-only history of completed activities

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{params, Row};
use tracing::info;

use super::timer_store::to_i64;
use crate::{
    db::Database,
    error::{AppError, AppResult},
    state::{ActivityEntry, ActivityRecord, ActivityType, TimedActivity},
    utils::time::{self, format_timestamp},
};

/// How many entries a per-type query returns
pub const RECENT_PER_TYPE: usize = 6;
/// How far back the unfiltered history reaches
pub const HISTORY_WINDOW_DAYS: i64 = 30;

const SELECT_COLUMNS: &str =
    "SELECT id, type, sub_type, start_time, end_time, duration, paused_time, milk_amount, created_at
     FROM activities";

#[derive(Debug, Clone)]
pub struct ActivityLog {
    db: Database,
}

impl ActivityLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Validate and store an entry, returning its id
    pub fn append(&self, entry: &ActivityEntry) -> AppResult<i64> {
        entry.validate()?;
        let created_at = format_timestamp(&time::now());

        let id = self.db.with_conn(|conn| {
            match entry {
                ActivityEntry::Nappy { kind, time } => conn.execute(
                    "INSERT INTO activities (type, sub_type, start_time, created_at)
                     VALUES ('nappy', ?1, ?2, ?3)",
                    params![kind.as_str(), format_timestamp(time), created_at],
                )?,
                ActivityEntry::Timed(timed) => conn.execute(
                    "INSERT INTO activities
                        (type, start_time, end_time, duration, paused_time, milk_amount, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        timed.activity.as_str(),
                        format_timestamp(&timed.started_at),
                        format_timestamp(&timed.ended_at),
                        to_i64(timed.duration_ms)?,
                        to_i64(timed.paused_ms)?,
                        timed.milk_amount,
                        created_at,
                    ],
                )?,
            };
            Ok(conn.last_insert_rowid())
        })?;

        info!("Logged {} activity #{}", entry.type_tag(), id);
        Ok(id)
    }

    /// Everything that started or was logged within the history window, newest first
    pub fn recent(&self, now: DateTime<Utc>) -> AppResult<Vec<ActivityRecord>> {
        let since = format_timestamp(&(now - TimeDelta::days(HISTORY_WINDOW_DAYS)));
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS}
                 WHERE (start_time IS NOT NULL AND start_time >= ?1) OR created_at >= ?1
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map([since], RawActivityRow::from_row)?;
            rows.map(|row| -> AppResult<ActivityRecord> { row?.into_record() })
                .collect()
        })
    }

    /// The latest few entries of one type tag (`nappy` or a timer activity)
    pub fn latest_of_type(&self, type_tag: &str) -> AppResult<Vec<ActivityRecord>> {
        let tag = parse_type_filter(type_tag)?;
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS}
                 WHERE type = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![tag, RECENT_PER_TYPE as i64], RawActivityRow::from_row)?;
            rows.map(|row| -> AppResult<ActivityRecord> { row?.into_record() })
                .collect()
        })
    }
}

fn parse_type_filter(type_tag: &str) -> AppResult<&'static str> {
    match type_tag {
        "" => Err(AppError::validation("Type parameter cannot be empty")),
        "nappy" => Ok("nappy"),
        other => other.parse::<ActivityType>().map(|activity| activity.as_str()),
    }
}

struct RawActivityRow {
    id: i64,
    type_tag: String,
    sub_type: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    duration: Option<i64>,
    paused_time: Option<i64>,
    milk_amount: Option<i64>,
    created_at: String,
}

impl RawActivityRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            type_tag: row.get(1)?,
            sub_type: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            duration: row.get(5)?,
            paused_time: row.get(6)?,
            milk_amount: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_record(self) -> AppResult<ActivityRecord> {
        let id = self.id;
        let corrupt = |what: String| AppError::storage(format!("Corrupt activity #{}: {}", id, what));
        let timestamp = |field: &str, raw: Option<String>| -> AppResult<DateTime<Utc>> {
            let raw = raw.ok_or_else(|| corrupt(format!("missing {}", field)))?;
            time::parse_timestamp(field, &raw).map_err(|e| corrupt(e.to_string()))
        };
        let millis = |field: &str, raw: Option<i64>| -> AppResult<u64> {
            u64::try_from(raw.unwrap_or(0)).map_err(|_| corrupt(format!("negative {}", field)))
        };

        let entry = if self.type_tag == "nappy" {
            let kind = self
                .sub_type
                .as_deref()
                .unwrap_or_default()
                .parse()
                .map_err(|e: AppError| corrupt(e.to_string()))?;
            ActivityEntry::Nappy {
                kind,
                time: timestamp("start_time", self.start_time)?,
            }
        } else {
            let activity = self
                .type_tag
                .parse::<ActivityType>()
                .map_err(|e| corrupt(e.to_string()))?;
            let milk_amount = self
                .milk_amount
                .map(|amount| {
                    u32::try_from(amount).map_err(|_| corrupt(format!("milk_amount {}", amount)))
                })
                .transpose()?;
            ActivityEntry::Timed(TimedActivity {
                activity,
                started_at: timestamp("start_time", self.start_time)?,
                ended_at: timestamp("end_time", self.end_time)?,
                duration_ms: millis("duration", self.duration)?,
                paused_ms: millis("paused_time", self.paused_time)?,
                milk_amount,
            })
        };

        Ok(ActivityRecord {
            id,
            entry,
            created_at: timestamp("created_at", Some(self.created_at))?,
        })
    }
}
