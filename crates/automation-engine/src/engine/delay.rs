//! Wait step delays.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Unit of a wait step's `duration`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    #[serde(alias = "minute", alias = "min", alias = "mins")]
    Minutes,
    #[default]
    #[serde(alias = "hour")]
    Hours,
    #[serde(alias = "day")]
    Days,
}

impl std::fmt::Display for DelayUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DelayUnit::Minutes => "minutes",
            DelayUnit::Hours => "hours",
            DelayUnit::Days => "days",
        };
        write!(f, "{}", s)
    }
}

/// Convert a duration/unit pair into a chrono duration.
pub fn delay(duration: i64, unit: DelayUnit) -> AppResult<Duration> {
    if duration <= 0 {
        return Err(AppError::InvalidStep(format!(
            "wait duration must be positive, got {}",
            duration
        )));
    }

    let delay = match unit {
        DelayUnit::Minutes => Duration::try_minutes(duration),
        DelayUnit::Hours => Duration::try_hours(duration),
        DelayUnit::Days => Duration::try_days(duration),
    };

    delay.ok_or_else(|| {
        AppError::InvalidStep(format!("wait of {} {} is out of range", duration, unit))
    })
}

/// When a wait that starts at `now` ends.
pub fn resume_at(now: DateTime<Utc>, duration: i64, unit: DelayUnit) -> AppResult<DateTime<Utc>> {
    let delay = delay(duration, unit)?;
    now.checked_add_signed(delay)
        .ok_or_else(|| AppError::InvalidStep("wait ends beyond the supported date range".to_string()))
}
