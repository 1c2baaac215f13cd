//! Test helper functions for API integration tests
//!
//! Provides a channel-backed stand-in for a WebSocket client and helpers
//! for reading HTTP responses.

#![allow(dead_code)]

use axum::{body::Body, http::Request, response::Response, Router};
use potluck_api::models::party::ChatMessage;
use potluck_api::websocket::messages::{ErrorPayload, ReactionPayload, SyncPayload};
use potluck_api::websocket::{ConnectionHandle, ServerMessage};
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;

/// A party participant whose outbound messages land in a channel
pub struct TestClient {
    pub id: String,
    pub name: String,
    connection: ConnectionHandle,
    rx: UnboundedReceiver<ServerMessage>,
}

impl TestClient {
    pub fn new(id: &str, name: &str) -> Self {
        let (connection, rx) = ConnectionHandle::channel();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            connection,
            rx,
        }
    }

    /// A handle the registry can store for this client
    pub fn handle(&self) -> ConnectionHandle {
        self.connection.clone()
    }

    pub fn connection_id(&self) -> uuid::Uuid {
        self.connection.id()
    }

    /// Swap in a fresh connection, as a reconnecting client would
    pub fn reconnect(&mut self) -> ConnectionHandle {
        let (connection, rx) = ConnectionHandle::channel();
        self.connection = connection;
        self.rx = rx;
        self.handle()
    }

    /// Everything received so far
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    pub fn syncs(&mut self) -> Vec<SyncPayload> {
        self.drain()
            .into_iter()
            .filter_map(|msg| match msg {
                ServerMessage::Sync(sync) => Some(sync),
                _ => None,
            })
            .collect()
    }

    pub fn chats(&mut self) -> Vec<ChatMessage> {
        self.drain()
            .into_iter()
            .filter_map(|msg| match msg {
                ServerMessage::Chat { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn reactions(&mut self) -> Vec<ReactionPayload> {
        self.drain()
            .into_iter()
            .filter_map(|msg| match msg {
                ServerMessage::Reaction(reaction) => Some(reaction),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&mut self) -> Vec<ErrorPayload> {
        self.drain()
            .into_iter()
            .filter_map(|msg| match msg {
                ServerMessage::Error(error) => Some(error),
                _ => None,
            })
            .collect()
    }
}

/// Send a GET request through the router
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Collect a response body as JSON
pub async fn body_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Collect a response body as text
pub async fn body_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
