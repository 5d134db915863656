//! # API Route Modules
//!
//! - `users`: registration, profile, daily challenge, trial quota,
//!   entitlement sync and per-tier usage limits under `/api/user`.

pub mod users;
