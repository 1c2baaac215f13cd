//! Watch-party HTTP route handlers
//!
//! - `GET /parties` - Public listing, largest parties first
//! - `GET /parties/:code` - Full summary of one party
//! - `GET /parties/ws` - WebSocket endpoint (see [`crate::websocket::handler`])

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use potluck_shared_config::MAX_PUBLIC_LIST_LIMIT;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::models::party::{PartySummary, PublicPartySummary};
use crate::services::PartyRegistry;
use crate::websocket::ws_handler;

/// Query parameters for the public listing
#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    /// Maximum number of parties (clamped to 1..=100)
    pub limit: Option<usize>,
}

/// Create the parties router
///
/// The WebSocket route reads the registry from an `Extension` layer, so the
/// registry must also be installed as one.
pub fn parties_router(registry: PartyRegistry) -> Router {
    Router::new()
        .route("/", get(list_parties))
        .route("/ws", get(ws_handler))
        .route("/:code", get(get_party))
        .with_state(registry)
}

async fn list_parties(
    State(registry): State<PartyRegistry>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<PublicPartySummary>>> {
    let Query(query) = query.map_err(|rejection| ApiError::InvalidQueryParam {
        name: "limit",
        reason: rejection.body_text(),
    })?;

    let limit = query
        .limit
        .unwrap_or(registry.config().public_list_limit)
        .clamp(1, MAX_PUBLIC_LIST_LIMIT);

    Ok(Json(registry.list_public_sessions(limit).await))
}

async fn get_party(
    State(registry): State<PartyRegistry>,
    Path(code): Path<String>,
) -> ApiResult<Json<PartySummary>> {
    let party = registry
        .get_session(&code)
        .ok_or_else(|| ApiError::not_found("watch party", code.to_uppercase()))?;

    Ok(Json(party.summary().await))
}
