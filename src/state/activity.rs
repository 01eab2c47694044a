//! Activity kinds and completed activity records

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Bottle-feeding volume bounds in milliliters, inclusive
pub const MIN_MILK_AMOUNT: u32 = 30;
pub const MAX_MILK_AMOUNT: u32 = 500;

/// Activities that occupy the shared timer slot while in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Breastfeeding,
    Bottlefeeding,
    #[serde(alias = "sleep")]
    Sleeping,
}

impl ActivityType {
    pub const ALL: [ActivityType; 3] = [
        ActivityType::Breastfeeding,
        ActivityType::Bottlefeeding,
        ActivityType::Sleeping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Breastfeeding => "breastfeeding",
            ActivityType::Bottlefeeding => "bottlefeeding",
            ActivityType::Sleeping => "sleeping",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActivityType::Breastfeeding => "Breast Feeding",
            ActivityType::Bottlefeeding => "Bottle Feeding",
            ActivityType::Sleeping => "Sleep",
        }
    }

    /// Enforce the per-type parameter rule: bottle-feeding needs a volume in
    /// range, every other type must not carry one.
    pub fn check_milk_amount(&self, milk_amount: Option<u32>) -> AppResult<()> {
        match (self, milk_amount) {
            (ActivityType::Bottlefeeding, Some(amount))
                if (MIN_MILK_AMOUNT..=MAX_MILK_AMOUNT).contains(&amount) =>
            {
                Ok(())
            }
            (ActivityType::Bottlefeeding, Some(amount)) => Err(AppError::validation(format!(
                "Milk amount must be between {} and {} ml, got {}",
                MIN_MILK_AMOUNT, MAX_MILK_AMOUNT, amount
            ))),
            (ActivityType::Bottlefeeding, None) => {
                Err(AppError::validation("Milk amount is required for bottle feeding"))
            }
            (other, Some(_)) => Err(AppError::validation(format!(
                "Milk amount is not allowed for {}",
                other
            ))),
            (_, None) => Ok(()),
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breastfeeding" => Ok(ActivityType::Breastfeeding),
            "bottlefeeding" => Ok(ActivityType::Bottlefeeding),
            "sleeping" | "sleep" => Ok(ActivityType::Sleeping),
            "nappy" => Err(AppError::validation(
                "Nappy changes are instantaneous and cannot be timed",
            )),
            other => Err(AppError::validation(format!("Unknown activity type '{}'", other))),
        }
    }
}

/// What a nappy change contained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NappyKind {
    Wet,
    Dirty,
    Mixed,
}

impl NappyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NappyKind::Wet => "wet",
            NappyKind::Dirty => "dirty",
            NappyKind::Mixed => "mixed",
        }
    }
}

impl fmt::Display for NappyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NappyKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wet" => Ok(NappyKind::Wet),
            "dirty" => Ok(NappyKind::Dirty),
            "mixed" => Ok(NappyKind::Mixed),
            other => Err(AppError::validation(format!("Unknown nappy type '{}'", other))),
        }
    }
}

/// A timed activity that has finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedActivity {
    pub activity: ActivityType,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub paused_ms: u64,
    pub milk_amount: Option<u32>,
}

impl TimedActivity {
    pub fn validate(&self) -> AppResult<()> {
        if self.ended_at < self.started_at {
            return Err(AppError::validation("endTime must not be before startTime"));
        }
        self.activity.check_milk_amount(self.milk_amount)
    }
}

/// Something that goes into the activity log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEntry {
    Timed(TimedActivity),
    Nappy { kind: NappyKind, time: DateTime<Utc> },
}

impl ActivityEntry {
    pub fn type_tag(&self) -> &'static str {
        match self {
            ActivityEntry::Timed(timed) => timed.activity.as_str(),
            ActivityEntry::Nappy { .. } => "nappy",
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        match self {
            ActivityEntry::Timed(timed) => timed.validate(),
            ActivityEntry::Nappy { .. } => Ok(()),
        }
    }

    /// When the entry happened, for grouping and ordering
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ActivityEntry::Timed(timed) => timed.started_at,
            ActivityEntry::Nappy { time, .. } => *time,
        }
    }
}

/// A stored log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub id: i64,
    pub entry: ActivityEntry,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_tags() {
        assert_eq!("sleep".parse::<ActivityType>().unwrap(), ActivityType::Sleeping);
        assert_eq!("sleeping".parse::<ActivityType>().unwrap(), ActivityType::Sleeping);
        assert!("nappy".parse::<ActivityType>().unwrap_err().is_validation());
        assert!("walk".parse::<ActivityType>().is_err());
    }

    #[test]
    fn milk_amount_rules() {
        let bottle = ActivityType::Bottlefeeding;
        assert!(bottle.check_milk_amount(Some(30)).is_ok());
        assert!(bottle.check_milk_amount(Some(500)).is_ok());
        assert!(bottle.check_milk_amount(Some(29)).is_err());
        assert!(bottle.check_milk_amount(Some(600)).is_err());
        assert!(bottle.check_milk_amount(None).is_err());

        assert!(ActivityType::Sleeping.check_milk_amount(None).is_ok());
        assert!(ActivityType::Breastfeeding
            .check_milk_amount(Some(120))
            .unwrap_err()
            .is_validation());
    }
}
