//! Watch-party domain models
//!
//! A party ("potluck") is one synchronized group-viewing session. This module
//! holds the per-party state that the registry serializes behind a lock:
//! the roster, the authoritative playback clock and the bounded chat log.
//! Nothing here performs I/O; delivery lives in [`crate::websocket`].

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::websocket::connection::ConnectionHandle;

/// Length of a party code
pub const PARTY_CODE_LENGTH: usize = 6;

/// Characters used for party codes (no 0/O/1/I)
pub const PARTY_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Participant id used for system notices
pub const SYSTEM_PARTICIPANT_ID: &str = "system";

/// Display name used for system notices
pub const SYSTEM_DISPLAY_NAME: &str = "System";

/// Default playback rate
pub const DEFAULT_PLAYBACK_RATE: f64 = 1.0;

// =============================================================================
// Media
// =============================================================================

/// The media a party is watching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Library identifier of the media item
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Media kind (movie, episode, ...)
    #[serde(rename = "type")]
    pub media_type: String,
}

impl MediaRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            media_type: media_type.into(),
        }
    }
}

// =============================================================================
// Playback
// =============================================================================

/// Snapshot of a party's playback state, as sent to clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Whether playback is running
    pub is_playing: bool,

    /// Position in seconds
    pub position: f64,

    /// Playback rate multiplier
    pub rate: f64,
}

/// Authoritative playback clock for a party
///
/// The position is stored as an anchor (position + instant it was set). While
/// playing, the current position advances from the anchor at `rate`.
#[derive(Debug, Clone)]
pub struct Playback {
    is_playing: bool,
    anchor_position: f64,
    anchored_at: Instant,
    rate: f64,
}

impl Playback {
    /// Paused at 0 with the default rate
    pub fn new(now: Instant) -> Self {
        Self {
            is_playing: false,
            anchor_position: 0.0,
            anchored_at: now,
            rate: DEFAULT_PLAYBACK_RATE,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Position at `now`, in seconds
    pub fn position_at(&self, now: Instant) -> f64 {
        if !self.is_playing {
            return self.anchor_position;
        }

        let elapsed = now.saturating_duration_since(self.anchored_at).as_secs_f64();
        (self.anchor_position + elapsed * self.rate).max(0.0)
    }

    /// Snapshot at `now`
    pub fn state_at(&self, now: Instant) -> PlaybackState {
        PlaybackState {
            is_playing: self.is_playing,
            position: self.position_at(now),
            rate: self.rate,
        }
    }

    /// Start playback, optionally jumping to `position` first
    pub fn play(&mut self, position: Option<f64>, now: Instant) {
        let position = position.unwrap_or_else(|| self.position_at(now));
        self.anchor(position, now);
        self.is_playing = true;
    }

    /// Stop playback, optionally at `position`
    pub fn pause(&mut self, position: Option<f64>, now: Instant) {
        let position = position.unwrap_or_else(|| self.position_at(now));
        self.anchor(position, now);
        self.is_playing = false;
    }

    /// Jump to `position` without changing play/pause
    pub fn seek(&mut self, position: f64, now: Instant) {
        self.anchor(position, now);
    }

    fn anchor(&mut self, position: f64, now: Instant) {
        self.anchor_position = position.max(0.0);
        self.anchored_at = now;
    }
}

// =============================================================================
// Chat
// =============================================================================

/// Kind of a chat log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Chat,
    System,
    Reaction,
}

/// An entry in a party's chat log. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub participant_id: String,
    pub name: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ChatKind,
}

impl ChatMessage {
    /// A member's chat message, body truncated to `max_len` characters
    pub fn chat(participant_id: &str, name: &str, body: &str, max_len: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_id: participant_id.to_string(),
            name: name.to_string(),
            body: truncate_chars(body, max_len),
            timestamp: Utc::now(),
            kind: ChatKind::Chat,
        }
    }

    /// A system notice
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_id: SYSTEM_PARTICIPANT_ID.to_string(),
            name: SYSTEM_DISPLAY_NAME.to_string(),
            body: text.into(),
            timestamp: Utc::now(),
            kind: ChatKind::System,
        }
    }
}

/// Truncate to at most `max` characters (not bytes)
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Bounded chat log, newest last. The oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ChatLog {
    entries: VecDeque<ChatMessage>,
    capacity: usize,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(128)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    /// The last `count` entries, oldest first
    pub fn recent(&self, count: usize) -> Vec<ChatMessage> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter()
    }
}

// =============================================================================
// Members
// =============================================================================

/// A participant in a party
#[derive(Debug, Clone)]
pub struct Member {
    /// Participant identifier, unique within the party
    pub participant_id: String,

    /// Display name
    pub name: String,

    /// Where to deliver messages for this member. Not part of its identity.
    pub connection: ConnectionHandle,

    /// Whether this member controls playback
    pub is_host: bool,

    /// Member's ready flag
    pub is_ready: bool,

    /// Last position this member reported, in seconds
    pub last_position: f64,

    /// When the member joined
    pub joined_at: DateTime<Utc>,

    /// Join order within the party (lower joined earlier)
    pub join_seq: u64,

    /// When this member was last sent a drift resync
    pub last_resync_at: Option<Instant>,
}

impl Member {
    pub fn summary(&self) -> MemberSummary {
        MemberSummary {
            participant_id: self.participant_id.clone(),
            name: self.name.clone(),
            is_host: self.is_host,
            is_ready: self.is_ready,
            joined_at: self.joined_at,
        }
    }
}

/// Public view of a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub participant_id: String,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
}

// =============================================================================
// Party state
// =============================================================================

/// Mutable state of one party. Always accessed under the party's lock.
#[derive(Debug)]
pub struct PartyState {
    pub code: String,
    pub host_id: String,
    pub media: MediaRef,
    pub created_at: DateTime<Utc>,
    pub playback: Playback,
    pub log: ChatLog,
    roster: HashMap<String, Member>,
    next_join_seq: u64,
    closed: bool,
}

impl PartyState {
    /// A new party with `host` as its first member
    pub fn new(
        code: String,
        media: MediaRef,
        host_id: &str,
        host_name: &str,
        connection: ConnectionHandle,
        max_chat_history: usize,
        now: Instant,
    ) -> Self {
        let mut state = Self {
            code,
            host_id: host_id.to_string(),
            media,
            created_at: Utc::now(),
            playback: Playback::new(now),
            log: ChatLog::new(max_chat_history),
            roster: HashMap::new(),
            next_join_seq: 0,
            closed: false,
        };

        let host = state.add_member(host_id, host_name, connection);
        host.is_host = true;
        host.is_ready = true;

        state
    }

    /// Add a non-host member. Replaces any member with the same id.
    pub fn add_member(
        &mut self,
        participant_id: &str,
        name: &str,
        connection: ConnectionHandle,
    ) -> &mut Member {
        let join_seq = self.next_join_seq;
        self.next_join_seq += 1;

        let member = Member {
            participant_id: participant_id.to_string(),
            name: name.to_string(),
            connection,
            is_host: false,
            is_ready: false,
            last_position: 0.0,
            joined_at: Utc::now(),
            join_seq,
            last_resync_at: None,
        };

        match self.roster.entry(participant_id.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(member);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(member),
        }
    }

    pub fn remove_member(&mut self, participant_id: &str) -> Option<Member> {
        self.roster.remove(participant_id)
    }

    pub fn member(&self, participant_id: &str) -> Option<&Member> {
        self.roster.get(participant_id)
    }

    pub fn member_mut(&mut self, participant_id: &str) -> Option<&mut Member> {
        self.roster.get_mut(participant_id)
    }

    pub fn member_count(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Members ordered by join order
    pub fn members(&self) -> Vec<&Member> {
        let mut members: Vec<&Member> = self.roster.values().collect();
        members.sort_by_key(|m| m.join_seq);
        members
    }

    pub fn host(&self) -> Option<&Member> {
        self.roster.get(&self.host_id).filter(|m| m.is_host)
    }

    /// Make the earliest-joined member the host
    pub fn promote_earliest(&mut self) -> Option<&Member> {
        let next_id = self
            .roster
            .values()
            .min_by_key(|m| m.join_seq)
            .map(|m| m.participant_id.clone())?;

        for member in self.roster.values_mut() {
            member.is_host = member.participant_id == next_id;
        }
        self.host_id = next_id;

        self.roster.get(&self.host_id)
    }

    /// Delivery targets, in join order, excluding `exclude`
    pub fn recipients(&self, exclude: Option<&str>) -> Vec<(String, ConnectionHandle)> {
        self.members()
            .into_iter()
            .filter(|m| exclude != Some(m.participant_id.as_str()))
            .map(|m| (m.participant_id.clone(), m.connection.clone()))
            .collect()
    }

    /// Marks the party as destroyed; no member may be added afterwards
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn summary(&self, now: Instant) -> PartySummary {
        PartySummary {
            code: self.code.clone(),
            host_id: self.host_id.clone(),
            media: self.media.clone(),
            created_at: self.created_at,
            playback: self.playback.state_at(now),
            member_count: self.member_count(),
            members: self.members().into_iter().map(Member::summary).collect(),
        }
    }

    pub fn public_summary(&self) -> PublicPartySummary {
        PublicPartySummary {
            code: self.code.clone(),
            media_title: self.media.title.clone(),
            media_type: self.media.media_type.clone(),
            member_count: self.member_count(),
            is_playing: self.playback.is_playing(),
            host_name: self
                .host()
                .map(|m| m.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            created_at: self.created_at,
        }
    }
}

/// Full party summary, sent as `party_update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartySummary {
    pub code: String,
    pub host_id: String,
    pub media: MediaRef,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub playback: PlaybackState,
    pub member_count: usize,
    pub members: Vec<MemberSummary>,
}

/// Entry in the public party listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicPartySummary {
    pub code: String,
    pub media_title: String,
    pub media_type: String,
    pub member_count: usize,
    pub is_playing: bool,
    pub host_name: String,
    pub created_at: DateTime<Utc>,
}
