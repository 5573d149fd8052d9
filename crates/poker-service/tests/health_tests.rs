//! HTTP surface tests: probes, metrics, room queries and drain behaviour.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use poker_service::errors::ErrorResponse;
use poker_service::protocol::ServerEvent;
use poker_service::room::{RoomSnapshot, RoomSummary};
use poker_test_utils::{TestClient, TestPokerServer};

#[tokio::test]
async fn test_liveness_and_readiness() -> Result<()> {
    let server = TestPokerServer::spawn().await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");

    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "READY");
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_serves_text() -> Result<()> {
    let server = TestPokerServer::spawn().await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;
    assert_eq!(response.status(), 200);
    // Detached recorder: the body is valid but may be empty
    response.text().await?;
    Ok(())
}

#[tokio::test]
async fn test_rooms_api_mirrors_lobby() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;
    let room_id = alice.create_room("Alice", Some("Refinement")).await?;
    alice.cast_vote(&room_id, "13").await?;
    alice.wait_for_room(|r| !r.votes.is_empty()).await?;

    let rooms: Vec<RoomSummary> = reqwest::get(format!("{}/api/v1/rooms", server.url()))
        .await?
        .json()
        .await?;
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms.first().map(|r| &r.room_id), Some(&room_id));

    let room: RoomSnapshot =
        reqwest::get(format!("{}/api/v1/rooms/{}", server.url(), room_id))
            .await?
            .json()
            .await?;
    assert_eq!(room.room_name.as_deref(), Some("Refinement"));
    assert_eq!(room.vote_by_name("Alice"), Some("13"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_room_is_404_with_error_body() -> Result<()> {
    let server = TestPokerServer::spawn().await?;

    let response = reqwest::get(format!("{}/api/v1/rooms/QQQQQQ", server.url())).await?;
    assert_eq!(response.status(), 404);
    let body: ErrorResponse = response.json().await?;
    assert_eq!(body.error.code, "RoomNotFound");
    Ok(())
}

#[tokio::test]
async fn test_shutdown_drains_sessions_and_refuses_new_ones() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;
    alice.create_room("Alice", None).await?;

    server.begin_shutdown().await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), 503);

    // Existing session is closed once its outbound queue is dropped
    let closed = alice
        .recv_until(|e| matches!(e, ServerEvent::Welcome { .. }))
        .await;
    assert!(closed.is_err());

    // New sessions are upgraded but never welcomed
    assert!(TestClient::connect(&server.ws_url()).await.is_err());

    let response = reqwest::get(format!("{}/api/v1/rooms", server.url())).await?;
    assert_eq!(response.status(), 503);
    Ok(())
}
