//! HTTP route handlers for the Potluck API
//!
//! This module contains all REST endpoint handlers including:
//! - Watch-party listing and lookup
//! - Health check and status endpoints

pub mod health;
pub mod parties;

pub use health::{health_router, HealthState};
pub use parties::parties_router;
