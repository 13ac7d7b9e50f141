//! Recurrence cadences and the next-due-date arithmetic of recurring templates.

use std::{fmt, str::FromStr};

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Wire value used by records that do not repeat.
pub const FREQUENCY_NONE: &str = "none";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
/// Cadence of a recurring template. A template can never have the `none`
/// cadence; such records are plain transactions.
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Computes the occurrence following `last`.
    ///
    /// Monthly and yearly cadences re-clamp the day of month to
    /// `min(anchor.day(), days in target month)`, so an anchor on the 31st
    /// lands on the 30th in a 30-day month and returns to the 31st afterwards.
    /// Returns `None` when the result falls outside the representable range.
    pub fn next_due_date(self, last: NaiveDate, anchor: NaiveDate) -> Option<NaiveDate> {
        match self {
            Frequency::Daily => last.checked_add_signed(Duration::days(1)),
            Frequency::Weekly => last.checked_add_signed(Duration::weeks(1)),
            Frequency::Monthly => add_months_anchored(last, 1, anchor.day()),
            Frequency::Yearly => add_months_anchored(last, 12, anchor.day()),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(format!("unknown frequency `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
/// Whether a template is currently generating instances.
pub enum RecurringStatus {
    #[default]
    Active,
    Paused,
}

impl fmt::Display for RecurringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecurringStatus::Active => "active",
            RecurringStatus::Paused => "paused",
        };
        f.write_str(label)
    }
}

/// Number of days in the given calendar month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_next| first_next.pred_opt())
        .map(|last_current| last_current.day())
        .unwrap_or(28)
}

fn add_months_anchored(date: NaiveDate, months: u32, anchor_day: u32) -> Option<NaiveDate> {
    let shifted = date.checked_add_months(Months::new(months))?;
    let day = anchor_day.min(days_in_month(shifted.year(), shifted.month()));
    shifted.with_day(day)
}
