//! Domain models for Potluck
//!
//! This module contains the in-memory watch-party state:
//! - Parties, members and their summaries
//! - The playback clock
//! - Chat messages and the bounded chat log

pub mod party;

pub use party::{
    ChatKind, ChatLog, ChatMessage, MediaRef, Member, MemberSummary, PartyState, PartySummary,
    Playback, PlaybackState, PublicPartySummary,
};
