//! JSON wire formats shared by the server handlers and the HTTP client backend

use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    state::{ActivityEntry, ActivityRecord, ActivityType, NappyKind, TimedActivity, TimerState},
    utils::time::{format_timestamp, parse_timestamp},
};

/// Body of `POST ?action=active-timer` and payload of its `GET` counterpart.
///
/// A null `taskType` means "clear the slot".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerPayload {
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub pause_time: Option<String>,
    #[serde(default)]
    pub total_paused_time: Option<i64>,
    #[serde(default)]
    pub milk_amount: Option<i64>,
}

impl TimerPayload {
    /// The payload that empties the slot
    pub fn clear() -> Self {
        Self {
            total_paused_time: Some(0),
            ..Self::default()
        }
    }

    /// Decode into a timer, or `None` for a clear request
    pub fn into_state(self) -> AppResult<Option<TimerState>> {
        let Some(task_type) = self.task_type else {
            return Ok(None);
        };

        let activity: ActivityType = task_type.parse()?;
        let start_time = self
            .start_time
            .ok_or_else(|| AppError::validation("startTime is required"))?;
        let started_at = parse_timestamp("startTime", &start_time)?;
        let paused_at = self
            .pause_time
            .map(|raw| parse_timestamp("pauseTime", &raw))
            .transpose()?;
        let paused_ms = u64::try_from(self.total_paused_time.unwrap_or(0))
            .map_err(|_| AppError::validation("totalPausedTime must not be negative"))?;
        let milk_amount = self.milk_amount.map(to_milk_amount).transpose()?;

        Ok(Some(TimerState {
            activity,
            started_at,
            paused_at,
            paused_ms,
            milk_amount,
        }))
    }
}

impl From<&TimerState> for TimerPayload {
    fn from(state: &TimerState) -> Self {
        Self {
            task_type: Some(state.activity.as_str().to_string()),
            start_time: Some(format_timestamp(&state.started_at)),
            pause_time: state.paused_at.as_ref().map(format_timestamp),
            total_paused_time: Some(state.paused_ms as i64),
            milk_amount: state.milk_amount.map(i64::from),
        }
    }
}

/// An activity as posted to, and listed by, the history endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milk_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ActivityPayload {
    pub fn into_entry(self) -> AppResult<ActivityEntry> {
        if self.type_tag == "nappy" {
            let kind: NappyKind = self
                .sub_type
                .ok_or_else(|| AppError::validation("subType is required for nappy changes"))?
                .parse()?;
            let time = self
                .time
                .or(self.start_time)
                .ok_or_else(|| AppError::validation("time is required for nappy changes"))?;
            return Ok(ActivityEntry::Nappy {
                kind,
                time: parse_timestamp("time", &time)?,
            });
        }

        let activity: ActivityType = self.type_tag.parse()?;
        let started_at = required_timestamp("startTime", self.start_time)?;
        let ended_at = required_timestamp("endTime", self.end_time)?;
        let duration = self
            .duration
            .ok_or_else(|| AppError::validation("duration is required"))?;

        Ok(ActivityEntry::Timed(TimedActivity {
            activity,
            started_at,
            ended_at,
            duration_ms: non_negative("duration", duration)?,
            paused_ms: non_negative("pausedTime", self.paused_time.unwrap_or(0))?,
            milk_amount: self.milk_amount.map(to_milk_amount).transpose()?,
        }))
    }
}

impl From<&ActivityEntry> for ActivityPayload {
    fn from(entry: &ActivityEntry) -> Self {
        match entry {
            ActivityEntry::Nappy { kind, time } => Self {
                type_tag: "nappy".to_string(),
                sub_type: Some(kind.as_str().to_string()),
                time: Some(format_timestamp(time)),
                start_time: Some(format_timestamp(time)),
                ..Self::default()
            },
            ActivityEntry::Timed(timed) => Self {
                type_tag: timed.activity.as_str().to_string(),
                start_time: Some(format_timestamp(&timed.started_at)),
                end_time: Some(format_timestamp(&timed.ended_at)),
                duration: Some(timed.duration_ms as i64),
                paused_time: Some(timed.paused_ms as i64),
                milk_amount: timed.milk_amount.map(i64::from),
                ..Self::default()
            },
        }
    }
}

impl From<&ActivityRecord> for ActivityPayload {
    fn from(record: &ActivityRecord) -> Self {
        Self {
            id: Some(record.id),
            created_at: Some(format_timestamp(&record.created_at)),
            ..Self::from(&record.entry)
        }
    }
}

fn required_timestamp(
    field: &str,
    raw: Option<String>,
) -> AppResult<chrono::DateTime<chrono::Utc>> {
    let raw = raw.ok_or_else(|| AppError::validation(format!("{} is required", field)))?;
    parse_timestamp(field, &raw)
}

fn non_negative(field: &str, value: i64) -> AppResult<u64> {
    u64::try_from(value).map_err(|_| AppError::validation(format!("{} must not be negative", field)))
}

fn to_milk_amount(value: i64) -> AppResult<u32> {
    u32::try_from(value)
        .map_err(|_| AppError::validation(format!("Milk amount {} is out of range", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_task_type_means_clear() {
        let payload: TimerPayload = serde_json::from_value(json!({
            "taskType": null,
            "startTime": null,
            "pauseTime": null,
            "totalPausedTime": 0
        }))
        .unwrap();
        assert_eq!(payload.into_state().unwrap(), None);
    }

    #[test]
    fn null_pause_total_reads_as_zero() {
        let clear: TimerPayload = serde_json::from_value(json!({
            "taskType": null,
            "startTime": null,
            "pauseTime": null,
            "totalPausedTime": null
        }))
        .unwrap();
        assert_eq!(clear.into_state().unwrap(), None);

        let set: TimerPayload = serde_json::from_value(json!({
            "taskType": "sleeping",
            "startTime": "2024-05-01T08:00:00.000Z",
            "pauseTime": null,
            "totalPausedTime": null
        }))
        .unwrap();
        let state = set.into_state().unwrap().unwrap();
        assert_eq!(state.paused_ms, 0);
        assert_eq!(state.paused_at, None);
    }

    #[test]
    fn timer_payload_decodes_and_re_encodes_identically() {
        let body = json!({
            "taskType": "bottlefeeding",
            "startTime": "2024-05-01T08:00:00.123Z",
            "pauseTime": "2024-05-01T08:00:30.000Z",
            "totalPausedTime": 1500,
            "milkAmount": 120
        });
        let payload: TimerPayload = serde_json::from_value(body.clone()).unwrap();
        let state = payload.into_state().unwrap().unwrap();
        assert_eq!(state.paused_ms, 1500);
        assert_eq!(state.milk_amount, Some(120));
        assert_eq!(serde_json::to_value(TimerPayload::from(&state)).unwrap(), body);
    }

    #[test]
    fn timer_payload_requires_start_time() {
        let payload = TimerPayload {
            task_type: Some("sleeping".into()),
            ..TimerPayload::default()
        };
        assert!(payload.into_state().unwrap_err().is_validation());
    }

    #[test]
    fn negative_pause_total_is_rejected() {
        let payload = TimerPayload {
            task_type: Some("sleeping".into()),
            start_time: Some("2024-05-01T08:00:00.000Z".into()),
            total_paused_time: Some(-1),
            ..TimerPayload::default()
        };
        assert!(payload.into_state().unwrap_err().is_validation());
    }

    #[test]
    fn nappy_payload() {
        let payload: ActivityPayload = serde_json::from_value(json!({
            "type": "nappy",
            "subType": "wet",
            "time": "2024-05-01T08:00:00.000Z"
        }))
        .unwrap();
        assert!(matches!(
            payload.into_entry().unwrap(),
            ActivityEntry::Nappy { kind: NappyKind::Wet, .. }
        ));
    }

    #[test]
    fn timed_payload_requires_end_time() {
        let payload: ActivityPayload = serde_json::from_value(json!({
            "type": "sleeping",
            "startTime": "2024-05-01T08:00:00.000Z",
            "duration": 1000
        }))
        .unwrap();
        assert!(payload.into_entry().unwrap_err().is_validation());
    }
}
