//! # broski-core: Foundational Types for the Broski Backend
//!
//! Leaf crate of the workspace. Defines the primitives every other crate
//! shares: the user identifier newtype and the UTC calendar-day type used for
//! all day-boundary comparisons (streaks, daily quota resets).
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `UserId` wraps a UUID; there are no bare
//!    strings for user identifiers past the HTTP boundary.
//!
//! 2. **UTC-only calendar days.** `CalendarDay` is a date without time,
//!    always derived from a UTC instant. Two server instances in different
//!    local timezones agree on what "today" is.
//!
//! 3. **Lenient legacy parsing.** Older user records carry free-form date
//!    strings. [`temporal::parse_legacy_instant`] accepts the formats found
//!    in stored data and returns `None` for anything else. It never errors.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `broski-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod temporal;

pub use error::ValidationError;
pub use identity::UserId;
pub use temporal::{parse_legacy_instant, CalendarDay};
