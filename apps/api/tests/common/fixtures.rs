//! Test fixtures for API integration tests
//!
//! Provides reusable parties and media.

#![allow(dead_code)]

use std::sync::Arc;

use potluck_api::models::party::MediaRef;
use potluck_api::{Party, PartyRegistry};

use super::helpers::TestClient;

pub fn movie_x() -> MediaRef {
    MediaRef::new("media-1", "Movie X", "movie")
}

/// A party hosted by alice, with the given guests joined in order
///
/// All mailboxes are drained before returning.
pub async fn party_with_guests(
    registry: &PartyRegistry,
    guests: &[(&str, &str)],
) -> (Arc<Party>, TestClient, Vec<TestClient>) {
    let mut alice = TestClient::new("alice", "Alice");
    let party = registry
        .create_session(&alice.id, &alice.name, movie_x(), alice.handle())
        .await;

    let mut clients = Vec::new();
    for (id, name) in guests {
        let client = TestClient::new(id, name);
        registry
            .join_session(party.code(), &client.id, &client.name, client.handle())
            .await
            .unwrap();
        clients.push(client);
    }

    alice.drain();
    for client in clients.iter_mut() {
        client.drain();
    }

    (party, alice, clients)
}
