//! # Temporal Types: UTC Calendar Days
//!
//! Defines `CalendarDay`, a date-only value derived from a UTC instant, and
//! the lenient parser for date strings found in legacy user records.
//!
//! ## Day Boundaries
//!
//! Every "same day" / "consecutive day" decision in the backend compares two
//! `CalendarDay` values by equality. Days are cut at 00:00 UTC regardless of
//! the server's local timezone, so instances deployed in different regions
//! never disagree on whether a daily counter should reset.
//!
//! ## Wire Format
//!
//! `CalendarDay` serializes as `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A calendar date in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    /// The UTC calendar day containing `instant`.
    pub fn of(instant: &DateTime<Utc>) -> Self {
        Self(instant.date_naive())
    }

    /// Construct from a `NaiveDate` interpreted as a UTC date.
    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse a `YYYY-MM-DD` string.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| ValidationError::InvalidCalendarDay {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }

    /// Parse any date representation accepted by [`parse_legacy_instant`]
    /// and take its UTC calendar day.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        parse_legacy_instant(s).map(|dt| Self::of(&dt))
    }

    /// The day before this one. Saturates at the minimum representable date.
    pub fn previous(&self) -> Self {
        Self(self.0.pred_opt().unwrap_or(self.0))
    }

    /// The day after this one. Saturates at the maximum representable date.
    pub fn next(&self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }

    /// 00:00:00 UTC at the start of this day.
    pub fn start(&self) -> DateTime<Utc> {
        self.0.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Whether `self` is exactly the day before `other`.
    pub fn is_day_before(&self, other: &CalendarDay) -> bool {
        other.0.signed_duration_since(self.0) == TimeDelta::days(1)
    }

    /// Access the inner date.
    pub fn as_naive(&self) -> &NaiveDate {
        &self.0
    }
}

impl std::fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl TryFrom<String> for CalendarDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CalendarDay> for String {
    fn from(day: CalendarDay) -> Self {
        day.to_string()
    }
}

/// Parse a date string from a legacy record into a UTC instant.
///
/// Accepted forms, tried in order:
/// - RFC 3339 with any offset (`2026-01-15T12:00:00Z`, `2026-01-15T17:00:00+05:00`)
/// - naive ISO datetime, read as UTC (`2026-01-15T12:00:00`, `2026-01-15 12:00:00.250`)
/// - ISO date (`2026-01-15`), read as 00:00 UTC
/// - the `Thu Jan 15 2026` form written by older mobile clients
///
/// Returns `None` for empty or unrecognised input.
pub fn parse_legacy_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in ["%Y-%m-%d", "%a %b %d %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(CalendarDay(date).start());
        }
    }

    None
}
