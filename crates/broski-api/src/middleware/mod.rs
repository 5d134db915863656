//! # Middleware Modules
//!
//! Tower middleware layers for the API service.

pub mod metrics;
pub mod trial_gate;
