//! # Engagement Errors
//!
//! Failures of the engagement layer. Business rejections (challenge already
//! completed, trial quota exhausted) are NOT errors; they are carried by
//! [`CompletionOutcome`](crate::CompletionOutcome) and
//! [`TrialDecision`](crate::TrialDecision). Only conditions the caller cannot
//! treat as a normal answer live here.

use broski_core::UserId;
use thiserror::Error;

/// Errors surfaced by [`EngagementService`](crate::EngagementService).
#[derive(Error, Debug)]
pub enum EngagementError {
    /// The referenced user does not exist.
    #[error("user not found: {0}")]
    NotFound(UserId),

    /// A user with this id already exists.
    #[error("user already exists: {0}")]
    AlreadyExists(UserId),

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Errors returned by a [`UserStore`](crate::UserStore) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record for the requested user.
    #[error("user not found: {0}")]
    NotFound(UserId),

    /// Insert collided with an existing record.
    #[error("user already exists: {0}")]
    AlreadyExists(UserId),

    /// Backend-specific failure (connection, serialization, ...).
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for EngagementError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::AlreadyExists(id) => Self::AlreadyExists(id),
            StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}

/// Errors loading a challenge catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },

    /// Catalog text is not valid YAML or is missing fields.
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two entries share an id.
    #[error("duplicate challenge id {0} in catalog")]
    DuplicateId(u32),
}
