//! WebSocket upgrade handler for watch parties
//!
//! A client connects to `/parties/ws` with its participant id and either a
//! party code (join) or a media reference (create). Each socket gets a writer
//! task draining its outbound channel and a reader task routing inbound
//! frames in arrival order.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;

use crate::models::party::MediaRef;
use crate::services::party::PartyRegistry;

use super::connection::ConnectionHandle;
use super::messages::{ClientMessage, ConnectedPayload, ErrorPayload, ServerMessage};

/// Display name used when none is given
pub const DEFAULT_DISPLAY_NAME: &str = "Guest";

/// Longest accepted display name, in characters
pub const MAX_DISPLAY_NAME_LENGTH: usize = 64;

/// Longest accepted participant id
pub const MAX_PARTICIPANT_ID_LENGTH: usize = 128;

/// Media type assumed when a creator omits one
pub const DEFAULT_MEDIA_TYPE: &str = "movie";

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQueryParams {
    /// Client-chosen participant identity
    participant_id: String,
    /// Display name
    #[serde(default = "default_display_name")]
    name: String,
    /// Party to join
    #[serde(default)]
    code: Option<String>,
    /// Media for a new party
    #[serde(default)]
    media_id: Option<String>,
    #[serde(default)]
    media_title: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
}

fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.to_string()
}

/// What the connecting client wants to do
#[derive(Debug, Clone, PartialEq)]
pub enum PartyIntent {
    Join { code: String },
    Create { media: MediaRef },
}

/// A validated connection request
#[derive(Debug, Clone, PartialEq)]
pub struct PartyRequest {
    pub participant_id: String,
    pub name: String,
    pub intent: PartyIntent,
}

impl WsQueryParams {
    /// Validate the query and decide between join and create
    pub fn into_request(self) -> Result<PartyRequest, &'static str> {
        validate_participant_id(&self.participant_id)?;
        let name = validate_display_name(&self.name)?;

        let code = self
            .code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());

        let intent = match (code, self.media_id, self.media_title) {
            (Some(code), _, _) => PartyIntent::Join {
                code: code.to_string(),
            },
            (None, Some(id), Some(title)) if !id.trim().is_empty() && !title.trim().is_empty() => {
                let media_type = self
                    .media_type
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());
                PartyIntent::Create {
                    media: MediaRef::new(id.trim(), title.trim(), media_type.trim()),
                }
            }
            _ => return Err("either code or media_id and media_title are required"),
        };

        Ok(PartyRequest {
            participant_id: self.participant_id,
            name,
            intent,
        })
    }
}

/// Validate participant ID format
fn validate_participant_id(participant_id: &str) -> Result<(), &'static str> {
    if participant_id.is_empty() {
        return Err("participant_id cannot be empty");
    }
    if participant_id.len() > MAX_PARTICIPANT_ID_LENGTH {
        return Err("participant_id must be at most 128 characters");
    }
    if !participant_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("participant_id contains invalid characters");
    }
    Ok(())
}

/// Trim a display name, falling back to the default when blank
fn validate_display_name(name: &str) -> Result<String, &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(default_display_name());
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err("name must be at most 64 characters");
    }
    Ok(name.to_string())
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQueryParams>,
    Extension(registry): Extension<PartyRegistry>,
) -> Response {
    let participant_id = params.participant_id.clone();

    let request = match params.into_request() {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(participant_id = %participant_id, "Invalid party connection: {}", e);
            return ws.on_upgrade(move |socket| async move {
                let (mut sender, _) = socket.split();
                let error_msg = ServerMessage::Error(ErrorPayload::invalid_request(e));
                send_frame(&mut sender, &error_msg).await;
                let _ = sender.close().await;
            });
        }
    };

    tracing::info!(
        participant_id = %request.participant_id,
        name = %request.name,
        joining = matches!(request.intent, PartyIntent::Join { .. }),
        "Party WebSocket connection accepted"
    );

    ws.on_upgrade(move |socket| handle_socket(socket, request, registry))
}

/// Serialize and send one frame, reporting whether it went out
async fn send_frame(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            false
        }
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, request: PartyRequest, registry: PartyRegistry) {
    let PartyRequest {
        participant_id,
        name,
        intent,
    } = request;

    let (connection, mut rx) = ConnectionHandle::channel();
    let connection_id = connection.id();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let party = match intent {
        PartyIntent::Create { media } => {
            registry
                .create_session(&participant_id, &name, media, connection)
                .await
        }
        PartyIntent::Join { code } => {
            match registry
                .join_session(&code, &participant_id, &name, connection)
                .await
            {
                Ok(party) => party,
                Err(e) => {
                    tracing::info!(
                        participant_id = %participant_id,
                        code = %code,
                        error = %e,
                        "Join failed"
                    );
                    let error_msg = ServerMessage::Error(ErrorPayload::party_not_found(&code));
                    send_frame(&mut ws_sender, &error_msg).await;
                    let _ = ws_sender.close().await;
                    return;
                }
            }
        }
    };

    let code = party.code().to_string();
    let is_host = party
        .lock()
        .await
        .member(&participant_id)
        .is_some_and(|m| m.is_host);

    // Written straight to the socket so it precedes anything already queued
    let connected_msg = ServerMessage::Connected(ConnectedPayload {
        participant_id: participant_id.clone(),
        code: code.clone(),
        is_host,
    });
    if !send_frame(&mut ws_sender, &connected_msg).await {
        tracing::warn!(
            participant_id = %participant_id,
            code = %code,
            "Failed to send connected message"
        );
        registry.disconnect(&participant_id, connection_id).await;
        return;
    }

    // Forward queued party messages to the socket
    let participant_id_send = participant_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if !send_frame(&mut ws_sender, &msg).await {
                tracing::debug!(participant_id = %participant_id_send, "WebSocket send failed");
                break;
            }
        }
    });

    // Route inbound frames in arrival order
    let participant_id_recv = participant_id.clone();
    let registry_recv = registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => {
                        registry_recv
                            .route_from_connection(&participant_id_recv, connection_id, msg)
                            .await;
                    }
                    Err(e) => {
                        tracing::debug!(
                            error = %e,
                            participant_id = %participant_id_recv,
                            "Failed to parse client message"
                        );
                    }
                },
                Ok(Message::Binary(_)) => {
                    tracing::debug!(participant_id = %participant_id_recv, "Received unsupported binary message");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    tracing::trace!(participant_id = %participant_id_recv, "Received ping/pong");
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(participant_id = %participant_id_recv, "WebSocket close received");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, participant_id = %participant_id_recv, "WebSocket error");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete, then abort the other
    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(participant_id = %participant_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(participant_id = %participant_id, "Receive task completed");
            send_task.abort();
        }
    }

    let left = registry.disconnect(&participant_id, connection_id).await;

    tracing::info!(
        participant_id = %participant_id,
        code = %code,
        left = left,
        "Party WebSocket connection closed"
    );
}
