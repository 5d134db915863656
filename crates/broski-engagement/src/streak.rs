//! # Completion Streaks
//!
//! A streak counts consecutive UTC calendar days with a completed challenge.
//! The decision only looks at the day of the previous completion and the day
//! of the current one.

use broski_core::CalendarDay;

/// Streak value after completing a challenge on `today`.
///
/// Continues the streak when the previous completion fell on the day before
/// `today`; every other case (first completion, gap of two or more days,
/// same-day or future-dated previous completion) starts a new streak at 1.
pub fn next_streak(previous: Option<CalendarDay>, previous_streak: u32, today: CalendarDay) -> u32 {
    match previous {
        Some(prev) if prev.is_day_before(&today) => previous_streak.saturating_add(1),
        _ => 1,
    }
}
