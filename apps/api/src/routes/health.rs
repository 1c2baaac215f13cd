//! Health check HTTP route handlers
//!
//! Provides endpoints for checking the health of the API:
//! - `GET /health` - Simple liveness check (returns 200 OK)
//! - `GET /health/ready` - Readiness check with party counters
//! - `GET /health/live` - Kubernetes-style liveness probe

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::services::PartyRegistry;

/// Shared application state for health check handlers
#[derive(Clone)]
pub struct HealthState {
    /// Party registry, for counters
    pub registry: PartyRegistry,
}

impl HealthState {
    pub fn new(registry: PartyRegistry) -> Self {
        Self { registry }
    }
}

/// Readiness response body
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub parties: usize,
    pub participants: usize,
}

/// Create health check router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(simple_health))
        .route("/live", get(liveness_probe))
        .route("/ready", get(readiness_probe))
        .with_state(state)
}

/// Simple health check - always returns OK if the server is running
///
/// # Response
/// - 200 OK with body "OK"
async fn simple_health() -> &'static str {
    "OK"
}

/// Liveness probe for Kubernetes
///
/// Returns 200 if the server process is running and can handle requests.
async fn liveness_probe() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe
///
/// The engine is in-memory with no external dependencies, so it is ready
/// as soon as it serves requests. Reports live party counters.
async fn readiness_probe(State(state): State<HealthState>) -> Json<ReadinessResponse> {
    let stats = state.registry.stats();

    Json(ReadinessResponse {
        status: "ready",
        parties: stats.party_count,
        participants: stats.participant_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_simple_health() {
        let response = simple_health().await;
        assert_eq!(response, "OK");
    }

    #[tokio::test]
    async fn test_liveness_probe() {
        let response = liveness_probe().await;
        let json = response.into_response();
        assert_eq!(json.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_reports_counters() {
        let state = HealthState::new(PartyRegistry::default());
        let Json(body) = readiness_probe(State(state)).await;
        assert_eq!(body.status, "ready");
        assert_eq!(body.parties, 0);
        assert_eq!(body.participants, 0);
    }
}
