//! # Error Types
//!
//! Validation errors raised when constructing core primitives from
//! untrusted input (path parameters, stored strings, config files).

use thiserror::Error;

/// A primitive could not be constructed from its textual form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The value is not a well-formed user identifier.
    #[error("invalid user id {value:?}: {reason}")]
    InvalidUserId {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The value is not a `YYYY-MM-DD` calendar date.
    #[error("invalid calendar day {value:?}: {reason}")]
    InvalidCalendarDay {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}
