//! WebSocket layer for watch parties
//!
//! This module handles:
//! - The party message protocol
//! - Per-connection handles and fan-out
//! - Drift reconciliation
//! - The `/parties/ws` upgrade handler

pub mod connection;
pub mod handler;
pub mod messages;
pub mod sync;

pub use connection::{broadcast, send_to_member, ConnectionHandle, ConnectionId, SendError};
pub use handler::ws_handler;
pub use messages::{ClientMessage, ServerMessage, SyncPayload};
pub use sync::{DriftOutcome, DriftPolicy};
