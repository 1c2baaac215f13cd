//! Watch-party registry
//!
//! Owns every live party and the participant -> party index. Each party is
//! serialized behind its own async mutex, so unrelated parties never contend.
//! The two indices are concurrent maps, independent of the party locks.
//!
//! Lock discipline:
//! - a DashMap guard is never held across an `.await`; the party `Arc` is
//!   cloned out first
//! - a party lock may be held while touching the indices
//! - at most one party lock is held at a time

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use potluck_shared_config::PartyConfig;
use rand::Rng;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::error::PartyError;
use crate::models::party::{
    ChatMessage, MediaRef, PartyState, PartySummary, PublicPartySummary, PARTY_CODE_ALPHABET,
    PARTY_CODE_LENGTH,
};
use crate::websocket::connection::{broadcast, send_to_member, ConnectionHandle, ConnectionId};
use crate::websocket::messages::{
    ClientMessage, ErrorPayload, ReactionPayload, ServerMessage, SyncPayload,
};
use crate::websocket::sync::{handle_time_update, DriftPolicy};

/// Generate a random party code from the unambiguous alphabet
pub fn generate_party_code() -> String {
    let mut rng = rand::thread_rng();
    (0..PARTY_CODE_LENGTH)
        .map(|_| PARTY_CODE_ALPHABET[rng.gen_range(0..PARTY_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form of a user-supplied party code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// One live party
#[derive(Debug)]
pub struct Party {
    code: String,
    created_at: DateTime<Utc>,
    state: Mutex<PartyState>,
}

impl Party {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Lock the party state
    pub async fn lock(&self) -> MutexGuard<'_, PartyState> {
        self.state.lock().await
    }

    /// Full summary as sent in `party_update`
    pub async fn summary(&self) -> PartySummary {
        self.state.lock().await.summary(Instant::now())
    }

    /// Everything currently in the chat log, oldest first
    pub async fn chat_history(&self) -> Vec<ChatMessage> {
        self.state.lock().await.log.iter().cloned().collect()
    }
}

/// Registry-wide counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub party_count: usize,
    pub participant_count: usize,
}

/// Lifecycle and lookup for all watch parties
///
/// Cheap to clone; clones share the same parties.
#[derive(Debug, Clone)]
pub struct PartyRegistry {
    /// code -> party
    parties: Arc<DashMap<String, Arc<Party>>>,

    /// participant_id -> code
    participants: Arc<DashMap<String, String>>,

    config: Arc<PartyConfig>,
}

impl Default for PartyRegistry {
    fn default() -> Self {
        Self::new(PartyConfig::default())
    }
}

impl PartyRegistry {
    pub fn new(config: PartyConfig) -> Self {
        Self {
            parties: Arc::new(DashMap::new()),
            participants: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PartyConfig {
        &self.config
    }

    fn drift_policy(&self) -> DriftPolicy {
        DriftPolicy::from_config(&self.config)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create a party hosted by `host_id`
    ///
    /// A host already in another party leaves it first.
    pub async fn create_session(
        &self,
        host_id: &str,
        host_name: &str,
        media: MediaRef,
        connection: ConnectionHandle,
    ) -> Arc<Party> {
        self.leave_session(host_id).await;

        let now = Instant::now();
        let party = {
            // The vacant entry holds a shard lock; release it before any await
            let (code, slot) = loop {
                let code = generate_party_code();
                match self.parties.entry(code.clone()) {
                    Entry::Vacant(slot) => break (code, slot),
                    Entry::Occupied(_) => {
                        tracing::debug!(code = %code, "Party code collision, regenerating");
                    }
                }
            };

            let mut state = PartyState::new(
                code.clone(),
                media,
                host_id,
                host_name,
                connection,
                self.config.max_chat_history,
                now,
            );
            let notice = ChatMessage::system(format!("{} created the watch party", host_name));
            state.log.push(notice.clone());
            broadcast(&state, &ServerMessage::Chat { message: notice }, None);

            let party = Arc::new(Party {
                code,
                created_at: state.created_at,
                state: Mutex::new(state),
            });
            slot.insert(party.clone());
            party
        };
        let code = party.code().to_string();

        let displaced = self.participants.insert(host_id.to_string(), code.clone());

        tracing::info!(
            code = %code,
            host_id = %host_id,
            host_name = %host_name,
            "Watch party created"
        );

        if let Some(previous) = displaced.filter(|previous| *previous != code) {
            self.evict_stale(&previous, host_id).await;
        }

        party
    }

    /// Join the party with `code` (case-insensitive)
    ///
    /// A participant already in a different party leaves it first. Joining
    /// the party one is already in rebinds the connection and replays the
    /// current state without announcing a second join.
    pub async fn join_session(
        &self,
        code: &str,
        participant_id: &str,
        name: &str,
        connection: ConnectionHandle,
    ) -> Result<Arc<Party>, PartyError> {
        let code = normalize_code(code);

        let party = self
            .get_session(&code)
            .ok_or_else(|| PartyError::SessionNotFound(code.clone()))?;

        let prior = self
            .participants
            .get(participant_id)
            .map(|entry| entry.value().clone());
        if prior.as_deref().is_some_and(|prior| prior != code) {
            self.leave_session(participant_id).await;
        }

        let now = Instant::now();
        let mut state = party.lock().await;
        if state.is_closed() {
            return Err(PartyError::SessionNotFound(code));
        }

        if let Some(member) = state.member_mut(participant_id) {
            member.connection = connection;
            member.name = name.to_string();
            self.participants
                .insert(participant_id.to_string(), code.clone());

            tracing::debug!(
                code = %code,
                participant_id = %participant_id,
                "Member rebound to a new connection"
            );

            let summary = state.summary(now);
            broadcast(&state, &ServerMessage::PartyUpdate { party: summary }, None);
            self.replay_state(&state, participant_id, now);
            return Ok(party.clone());
        }

        state.add_member(participant_id, name, connection);
        let displaced = self
            .participants
            .insert(participant_id.to_string(), code.clone());

        let summary = state.summary(now);
        broadcast(&state, &ServerMessage::PartyUpdate { party: summary }, None);
        self.announce(&mut state, format!("{} joined the party", name));
        self.replay_state(&state, participant_id, now);

        tracing::info!(
            code = %code,
            participant_id = %participant_id,
            member_count = state.member_count(),
            "Member joined watch party"
        );
        drop(state);

        if let Some(previous) = displaced.filter(|previous| *previous != code) {
            self.evict_stale(&previous, participant_id).await;
        }

        Ok(party)
    }

    /// Leave whatever party the participant is in
    ///
    /// Returns `false` if the participant was not in a party.
    pub async fn leave_session(&self, participant_id: &str) -> bool {
        let Some(code) = self.bound_code(participant_id) else {
            return false;
        };

        if self.depart(&code, participant_id, None).await {
            return true;
        }

        // A concurrent join may have moved the participant while we waited
        // for the old party's lock.
        match self.bound_code(participant_id) {
            Some(current) if current != code => self.depart(&current, participant_id, None).await,
            _ => false,
        }
    }

    /// Transport close hook
    ///
    /// Only evicts the participant if `connection_id` is still the
    /// connection their membership is bound to.
    pub async fn disconnect(&self, participant_id: &str, connection_id: ConnectionId) -> bool {
        let Some(code) = self.bound_code(participant_id) else {
            return false;
        };

        self.depart(&code, participant_id, Some(connection_id)).await
    }

    async fn depart(
        &self,
        code: &str,
        participant_id: &str,
        connection_id: Option<ConnectionId>,
    ) -> bool {
        let Some(party) = self.get_session(code) else {
            self.participants.remove_if(participant_id, |_, c| c == code);
            return false;
        };

        let now = Instant::now();
        let mut state = party.lock().await;

        if state.is_closed() {
            self.participants.remove_if(participant_id, |_, c| c == code);
            return false;
        }

        let bound_here = match (state.member(participant_id), connection_id) {
            (None, _) => false,
            (Some(member), Some(id)) => member.connection.id() == id,
            (Some(_), None) => true,
        };
        if !bound_here {
            if connection_id.is_some() {
                tracing::debug!(
                    code = %code,
                    participant_id = %participant_id,
                    "Ignoring close of a superseded connection"
                );
            }
            return false;
        }

        let Some(member) = state.remove_member(participant_id) else {
            return false;
        };
        self.participants.remove_if(participant_id, |_, c| c == code);

        self.announce(&mut state, format!("{} left the party", member.name));

        if member.is_host {
            if let Some(new_host) = state.promote_earliest().map(|m| m.name.clone()) {
                tracing::info!(
                    code = %code,
                    new_host = %new_host,
                    "Host left, promoted next member"
                );
                self.announce(&mut state, format!("{} is now the host", new_host));
            }
        }

        if state.is_empty() {
            state.close();
            drop(state);
            self.parties
                .remove_if(code, |_, existing| Arc::ptr_eq(existing, &party));
            tracing::info!(code = %code, "Watch party closed (empty)");
            return true;
        }

        let summary = state.summary(now);
        broadcast(&state, &ServerMessage::PartyUpdate { party: summary }, None);

        tracing::info!(
            code = %code,
            participant_id = %participant_id,
            member_count = state.member_count(),
            "Member left watch party"
        );

        true
    }

    /// Remove a participant from a party their index entry no longer names
    ///
    /// Only reachable when two joins for one participant race. The index
    /// entry is removed only if it still names `code`, so the newer binding
    /// survives.
    async fn evict_stale(&self, code: &str, participant_id: &str) {
        tracing::warn!(
            code = %code,
            participant_id = %participant_id,
            "Participant bound to two parties, evicting from the older one"
        );
        self.depart(code, participant_id, None).await;
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Apply an inbound event from a participant to their party
    ///
    /// Events from participants without a party are dropped.
    pub async fn route_event(&self, participant_id: &str, event: ClientMessage) {
        self.dispatch(participant_id, None, event).await;
    }

    /// Like [`route_event`](Self::route_event), but drops the event unless it
    /// came over the participant's current connection
    pub async fn route_from_connection(
        &self,
        participant_id: &str,
        connection_id: ConnectionId,
        event: ClientMessage,
    ) {
        self.dispatch(participant_id, Some(connection_id), event)
            .await;
    }

    async fn dispatch(
        &self,
        participant_id: &str,
        connection_id: Option<ConnectionId>,
        event: ClientMessage,
    ) {
        let Some(party) = self.get_session_for_participant(participant_id) else {
            tracing::debug!(
                participant_id = %participant_id,
                kind = event.kind(),
                "Dropping event from participant without a party"
            );
            return;
        };

        if let Err(e) = event.validate() {
            tracing::debug!(
                participant_id = %participant_id,
                kind = event.kind(),
                error = %e,
                "Dropping malformed event"
            );
            return;
        }

        let now = Instant::now();
        let mut state = party.lock().await;

        let Some(member) = state.member(participant_id) else {
            return;
        };
        if connection_id.is_some_and(|id| member.connection.id() != id) {
            tracing::debug!(
                participant_id = %participant_id,
                kind = event.kind(),
                "Dropping event from a superseded connection"
            );
            return;
        }

        if event.requires_host() && !member.is_host {
            let err = PartyError::UnauthorizedCommand(event.kind());
            tracing::debug!(
                code = %state.code,
                participant_id = %participant_id,
                error = %err,
                "Ignoring host-only command"
            );
            if self.config.notify_rejected_commands {
                send_to_member(member, ServerMessage::Error(ErrorPayload::not_host()));
            }
            return;
        }

        let name = member.name.clone();

        match event {
            ClientMessage::Chat { message } => {
                let chat = ChatMessage::chat(
                    participant_id,
                    &name,
                    &message,
                    self.config.max_message_length,
                );
                state.log.push(chat.clone());
                broadcast(&state, &ServerMessage::Chat { message: chat }, None);
            }
            ClientMessage::Reaction { emoji } => {
                let reaction = ReactionPayload {
                    participant_id: participant_id.to_string(),
                    name,
                    emoji,
                };
                broadcast(&state, &ServerMessage::Reaction(reaction), None);
            }
            ClientMessage::Ready { ready } => {
                if let Some(member) = state.member_mut(participant_id) {
                    member.is_ready = ready;
                }
                let summary = state.summary(now);
                broadcast(&state, &ServerMessage::PartyUpdate { party: summary }, None);
            }
            ClientMessage::Seek { time } => {
                state.playback.seek(time, now);
                let sync = SyncPayload::from_state(state.playback.state_at(now));
                broadcast(&state, &ServerMessage::Sync(sync), Some(participant_id));
                tracing::debug!(code = %state.code, position = sync.position, "Host seeked");
            }
            ClientMessage::Play { time } => {
                state.playback.play(time, now);
                let sync = SyncPayload::from_state(state.playback.state_at(now));
                broadcast(&state, &ServerMessage::Sync(sync), None);
                tracing::debug!(code = %state.code, position = sync.position, "Playback started");
            }
            ClientMessage::Pause { time } => {
                state.playback.pause(time, now);
                let sync = SyncPayload::from_state(state.playback.state_at(now));
                broadcast(&state, &ServerMessage::Sync(sync), None);
                tracing::debug!(code = %state.code, position = sync.position, "Playback paused");
            }
            ClientMessage::TimeUpdate { time } => {
                handle_time_update(&self.drift_policy(), &mut state, participant_id, time, now);
            }
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Find a party by code (case-insensitive)
    pub fn get_session(&self, code: &str) -> Option<Arc<Party>> {
        self.parties
            .get(&normalize_code(code))
            .map(|entry| entry.value().clone())
    }

    /// Find the party a participant is in
    pub fn get_session_for_participant(&self, participant_id: &str) -> Option<Arc<Party>> {
        let code = self.bound_code(participant_id)?;
        self.get_session(&code)
    }

    fn bound_code(&self, participant_id: &str) -> Option<String> {
        self.participants
            .get(participant_id)
            .map(|entry| entry.value().clone())
    }

    /// Public listing, largest parties first
    pub async fn list_public_sessions(&self, limit: usize) -> Vec<PublicPartySummary> {
        let parties: Vec<Arc<Party>> = self
            .parties
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut summaries = Vec::with_capacity(parties.len());
        for party in parties {
            let state = party.lock().await;
            if !state.is_closed() {
                summaries.push(state.public_summary());
            }
        }

        summaries.sort_by(|a, b| {
            b.member_count
                .cmp(&a.member_count)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        summaries.truncate(limit);
        summaries
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            party_count: self.parties.len(),
            participant_count: self.participants.len(),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn announce(&self, state: &mut PartyState, text: String) {
        let notice = ChatMessage::system(text);
        state.log.push(notice.clone());
        broadcast(state, &ServerMessage::Chat { message: notice }, None);
    }

    /// Send the current playback state and recent chat to one member
    fn replay_state(&self, state: &PartyState, participant_id: &str, now: Instant) {
        let Some(member) = state.member(participant_id) else {
            return;
        };

        send_to_member(
            member,
            ServerMessage::Sync(SyncPayload::from_state(state.playback.state_at(now))),
        );
        for message in state.log.recent(self.config.chat_replay) {
            send_to_member(member, ServerMessage::Chat { message });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_codes_use_unambiguous_alphabet() {
        for _ in 0..500 {
            let code = generate_party_code();
            assert_eq!(code.len(), PARTY_CODE_LENGTH);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || ('2'..='9').contains(&c)));
            assert!(!code.contains(['0', 'O', '1', 'I']));
        }
    }

    #[test]
    fn test_generated_codes_vary() {
        let codes: HashSet<String> = (0..100).map(|_| generate_party_code()).collect();
        assert!(codes.len() > 90);
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" abc234 "), "ABC234");
        assert_eq!(normalize_code("XYZ789"), "XYZ789");
    }

    #[tokio::test]
    async fn test_new_registry_is_empty() {
        let registry = PartyRegistry::default();
        assert_eq!(
            registry.stats(),
            RegistryStats {
                party_count: 0,
                participant_count: 0
            }
        );
        assert!(registry.list_public_sessions(10).await.is_empty());
        assert!(!registry.leave_session("nobody").await);
    }

    #[tokio::test]
    async fn test_leave_follows_participant_moved_mid_leave() {
        let registry = PartyRegistry::default();
        let (alice, _alice_rx) = ConnectionHandle::channel();
        let (bob, _bob_rx) = ConnectionHandle::channel();
        let (carol, _carol_rx) = ConnectionHandle::channel();

        let first = registry
            .create_session("alice", "Alice", MediaRef::new("m1", "Movie X", "movie"), alice)
            .await;
        registry
            .join_session(first.code(), "bob", "Bob", bob)
            .await
            .unwrap();
        let second = registry
            .create_session("carol", "Carol", MediaRef::new("m2", "Movie Y", "movie"), carol)
            .await;

        // Hold the first party so the leave reads its code and then waits
        let mut first_state = first.lock().await;
        let leaving = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.leave_session("bob").await })
        };
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        // Meanwhile bob ends up in the second party
        let bob_member = first_state.remove_member("bob").unwrap();
        second
            .lock()
            .await
            .add_member("bob", "Bob", bob_member.connection);
        registry
            .participants
            .insert("bob".to_string(), second.code().to_string());
        drop(first_state);

        assert!(leaving.await.unwrap());
        assert!(second.lock().await.member("bob").is_none());
        assert!(registry.get_session_for_participant("bob").is_none());
    }

    #[tokio::test]
    async fn test_create_registers_host() {
        let registry = PartyRegistry::default();
        let (conn, mut rx) = ConnectionHandle::channel();

        let party = registry
            .create_session("alice", "Alice", MediaRef::new("m1", "Movie X", "movie"), conn)
            .await;

        assert_eq!(registry.stats().party_count, 1);
        assert_eq!(registry.stats().participant_count, 1);
        assert!(registry.get_session(&party.code().to_lowercase()).is_some());

        let summary = party.summary().await;
        assert_eq!(summary.host_id, "alice");
        assert!(!summary.playback.is_playing);
        assert_eq!(summary.playback.position, 0.0);

        match rx.try_recv().unwrap() {
            ServerMessage::Chat { message } => {
                assert_eq!(message.body, "Alice created the watch party")
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
