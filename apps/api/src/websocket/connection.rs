//! Connection handles and message fan-out
//!
//! A [`ConnectionHandle`] is the only thing the party model knows about a
//! transport: an id plus the sending half of the connection's outbound
//! channel. The socket writer task owns the receiving half.
//!
//! Delivery never fails a caller. A closed connection is logged and skipped
//! so the rest of the party still receives the message.

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::ServerMessage;
use crate::models::party::{Member, PartyState};

/// Identifier of a single transport connection
pub type ConnectionId = Uuid;

/// Handle for sending messages to a specific connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,

    /// Channel for sending messages to this connection
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    fn new(sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// Create a handle together with the receiving half of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Send a message to this connection
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender
            .send(msg)
            .map_err(|_| SendError::ConnectionClosed)
    }
}

/// Error type for send operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("connection closed")]
    ConnectionClosed,
}

/// Deliver `msg` to a single member
///
/// Returns whether the message was handed to the connection.
pub fn send_to_member(member: &Member, msg: ServerMessage) -> bool {
    deliver(&member.participant_id, &member.connection, msg)
}

/// Deliver `msg` to every member of the party except `exclude`
///
/// The recipient list is snapshotted before sending. Returns the number of
/// members the message was delivered to.
pub fn broadcast(party: &PartyState, msg: &ServerMessage, exclude: Option<&str>) -> usize {
    let recipients = party.recipients(exclude);

    recipients
        .iter()
        .filter(|(participant_id, connection)| deliver(participant_id, connection, msg.clone()))
        .count()
}

fn deliver(participant_id: &str, connection: &ConnectionHandle, msg: ServerMessage) -> bool {
    match connection.send(msg) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(
                participant_id = %participant_id,
                connection_id = %connection.id(),
                error = %e,
                "Failed to deliver message to member"
            );
            false
        }
    }
}
