//! Business logic services for Potluck
//!
//! This module contains the watch-party registry: party lifecycle, the
//! participant index and event routing.

pub mod party;

pub use party::{Party, PartyRegistry, RegistryStats};
