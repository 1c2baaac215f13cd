//! WebSocket message types for watch-party synchronization
//!
//! This module defines the message protocol for client-server communication
//! over WebSocket connections. Messages are JSON objects tagged by `type`,
//! with the type-specific fields inline:
//!
//! ```json
//! { "type": "seek", "time": 42.5 }
//! { "type": "sync", "is_playing": true, "position": 42.5, "rate": 1.0 }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::PartyError;
use crate::models::party::{ChatMessage, PartySummary, PlaybackState};

/// Emoji sent when a reaction omits one
pub const DEFAULT_REACTION_EMOJI: &str = "\u{1F44D}";

/// Longest accepted reaction, in characters
pub const MAX_REACTION_LENGTH: usize = 16;

// =============================================================================
// Client -> Server Messages
// =============================================================================

/// Messages sent from a member's client to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Chat message to the whole party
    Chat { message: String },

    /// Ephemeral emoji reaction (not kept in the log)
    Reaction {
        #[serde(default = "default_reaction")]
        emoji: String,
    },

    /// Set own ready flag
    Ready {
        #[serde(default = "default_ready")]
        ready: bool,
    },

    /// Jump to a position (host only)
    Seek { time: f64 },

    /// Start playback, optionally at a position (host only)
    Play {
        #[serde(default)]
        time: Option<f64>,
    },

    /// Pause playback, optionally at a position (host only)
    Pause {
        #[serde(default)]
        time: Option<f64>,
    },

    /// Periodic report of the member's own playback position
    TimeUpdate { time: f64 },
}

fn default_reaction() -> String {
    DEFAULT_REACTION_EMOJI.to_string()
}

fn default_ready() -> bool {
    true
}

impl ClientMessage {
    /// Wire name of this message type
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::Reaction { .. } => "reaction",
            ClientMessage::Ready { .. } => "ready",
            ClientMessage::Seek { .. } => "seek",
            ClientMessage::Play { .. } => "play",
            ClientMessage::Pause { .. } => "pause",
            ClientMessage::TimeUpdate { .. } => "time_update",
        }
    }

    /// Whether only the host may issue this message
    pub fn requires_host(&self) -> bool {
        matches!(
            self,
            ClientMessage::Seek { .. } | ClientMessage::Play { .. } | ClientMessage::Pause { .. }
        )
    }

    /// Reject payloads that parse but cannot be applied
    pub fn validate(&self) -> Result<(), PartyError> {
        match self {
            ClientMessage::Chat { message } if message.trim().is_empty() => {
                Err(PartyError::MalformedEvent("chat message is empty".to_string()))
            }
            ClientMessage::Reaction { emoji } => {
                let len = emoji.chars().count();
                if len == 0 || len > MAX_REACTION_LENGTH {
                    return Err(PartyError::MalformedEvent(format!(
                        "reaction must be 1-{} characters",
                        MAX_REACTION_LENGTH
                    )));
                }
                Ok(())
            }
            ClientMessage::Seek { time } | ClientMessage::TimeUpdate { time } => {
                validate_time(*time)
            }
            ClientMessage::Play { time: Some(time) } | ClientMessage::Pause { time: Some(time) } => {
                validate_time(*time)
            }
            _ => Ok(()),
        }
    }
}

fn validate_time(time: f64) -> Result<(), PartyError> {
    if time.is_finite() {
        Ok(())
    } else {
        Err(PartyError::MalformedEvent(format!("invalid time: {}", time)))
    }
}

// =============================================================================
// Server -> Client Messages
// =============================================================================

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection bound to a party
    Connected(ConnectedPayload),

    /// Error occurred
    Error(ErrorPayload),

    /// Full party summary (roster changed, ready flags, ...)
    PartyUpdate { party: PartySummary },

    /// Chat or system message
    Chat { message: ChatMessage },

    /// Ephemeral reaction
    Reaction(ReactionPayload),

    /// Playback directive
    Sync(SyncPayload),
}

// =============================================================================
// Payload Types
// =============================================================================

/// Payload for Connected message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    pub participant_id: String,
    pub code: String,
    pub is_host: bool,
}

/// Payload for Error message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn party_not_found(code: &str) -> Self {
        Self::new("PARTY_NOT_FOUND", format!("Watch party {} not found", code))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("INVALID_REQUEST", message)
    }

    pub fn not_host() -> Self {
        Self::new("NOT_HOST", "Only the host can control playback")
    }
}

/// Payload for Reaction message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionPayload {
    pub participant_id: String,
    pub name: String,
    pub emoji: String,
}

/// Playback directive payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub is_playing: bool,
    pub position: f64,
    pub rate: f64,

    /// Set when issued by drift correction
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub resync: bool,
}

impl SyncPayload {
    pub fn from_state(state: PlaybackState) -> Self {
        Self {
            is_playing: state.is_playing,
            position: state.position,
            rate: state.rate,
            resync: false,
        }
    }

    pub fn resync(state: PlaybackState) -> Self {
        Self {
            resync: true,
            ..Self::from_state(state)
        }
    }
}
