//! Integration tests for the HTTP routes
//!
//! Exercises the real router through `tower::ServiceExt::oneshot`.

mod common;

use axum::http::StatusCode;
use common::{body_json, body_text, get, movie_x, party_with_guests, TestClient};
use potluck_api::{router, PartyRegistry};

#[tokio::test]
async fn test_root_endpoint() {
    let response = get(router(PartyRegistry::default()), "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Potluck"));
}

#[tokio::test]
async fn test_simple_health_check() {
    let response = get(router(PartyRegistry::default()), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn test_liveness_probe() {
    let response = get(router(PartyRegistry::default()), "/health/live").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "alive");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_reports_party_counts() {
    let registry = PartyRegistry::default();
    let (_party, _alice, _guests) = party_with_guests(&registry, &[("bob", "Bob")]).await;

    let response = get(router(registry), "/health/ready").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ready");
    assert_eq!(json["parties"], 1);
    assert_eq!(json["participants"], 2);
}

#[tokio::test]
async fn test_list_parties() {
    let registry = PartyRegistry::default();
    let (party, _alice, _guests) = party_with_guests(&registry, &[("bob", "Bob")]).await;
    let solo = TestClient::new("solo", "Solo");
    registry
        .create_session("solo", "Solo", movie_x(), solo.handle())
        .await;

    let response = get(router(registry.clone()), "/parties").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let parties = json.as_array().unwrap();
    assert_eq!(parties.len(), 2);
    assert_eq!(parties[0]["code"], party.code());
    assert_eq!(parties[0]["member_count"], 2);
    assert_eq!(parties[0]["host_name"], "Alice");
    assert_eq!(parties[0]["media_title"], "Movie X");
    assert_eq!(parties[0]["media_type"], "movie");
    assert_eq!(parties[0]["is_playing"], false);

    let response = get(router(registry.clone()), "/parties?limit=1").await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    // Out of range limits are clamped rather than rejected
    let response = get(router(registry), "/parties?limit=0").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_parties_rejects_non_numeric_limit() {
    let response = get(router(PartyRegistry::default()), "/parties?limit=lots").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_QUERY_PARAM");
    assert!(json["message"].as_str().unwrap().contains("limit"));
    assert!(json.get("details").is_none());
}

#[tokio::test]
async fn test_get_party_summary() {
    let registry = PartyRegistry::default();
    let (party, _alice, _guests) = party_with_guests(&registry, &[("bob", "Bob")]).await;

    let uri = format!("/parties/{}", party.code().to_lowercase());
    let response = get(router(registry), &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["code"], party.code());
    assert_eq!(json["host_id"], "alice");
    assert_eq!(json["media"]["title"], "Movie X");
    assert_eq!(json["media"]["type"], "movie");
    assert_eq!(json["is_playing"], false);
    assert_eq!(json["position"], 0.0);
    assert_eq!(json["rate"], 1.0);
    assert_eq!(json["member_count"], 2);
    assert_eq!(json["members"][0]["participant_id"], "alice");
    assert_eq!(json["members"][0]["is_host"], true);
    assert_eq!(json["members"][1]["participant_id"], "bob");
    assert_eq!(json["members"][1]["is_ready"], false);
}

#[tokio::test]
async fn test_get_unknown_party() {
    let response = get(router(PartyRegistry::default()), "/parties/ZZZZZZ").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert!(json["message"].as_str().unwrap().contains("ZZZZZZ"));
}

#[tokio::test]
async fn test_websocket_route_requires_upgrade() {
    let response = get(
        router(PartyRegistry::default()),
        "/parties/ws?participant_id=alice&code=ABCDEF",
    )
    .await;

    assert!(response.status().is_client_error());
}
