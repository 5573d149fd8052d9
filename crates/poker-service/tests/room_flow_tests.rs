//! Room lifecycle and vote ledger integration tests.
//!
//! Every test runs against a real server on a random port and talks to it
//! over WebSocket, so ordering and broadcast behaviour are exercised through
//! the full transport path.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use poker_test_utils::{TestClient, TestPokerServer};

#[tokio::test]
async fn test_alice_and_bob_play_a_round() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;
    let mut bob = TestClient::connect(&server.ws_url()).await?;

    let room_id = alice.create_room("Alice", None).await?;
    assert_eq!(bob.join_room(room_id.as_str(), "Bob").await?, Ok(()));

    let room = alice.wait_for_room(|r| r.participants.len() == 2).await?;
    assert_eq!(room.participants[0].display_name, "Alice");
    assert_eq!(room.participants[1].display_name, "Bob");

    bob.cast_vote(&room_id, "5").await?;
    alice.wait_for_room(|r| r.vote_by_name("Bob") == Some("5")).await?;
    alice.cast_vote(&room_id, "8").await?;
    alice.wait_for_room(|r| r.votes.len() == 2).await?;

    alice.reveal(&room_id).await?;
    let revealed = bob.wait_for_room(|r| r.revealed).await?;
    assert_eq!(revealed.votes.len(), 2);
    assert_eq!(revealed.vote_by_name("Alice"), Some("8"));
    assert_eq!(revealed.vote_by_name("Bob"), Some("5"));

    alice.reset(&room_id).await?;
    let reset = bob.wait_for_room(|r| !r.revealed).await?;
    assert!(reset.votes.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_revote_overwrites_previous_value() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;
    let room_id = alice.create_room("Alice", None).await?;

    for value in ["1", "3", "13"] {
        alice.cast_vote(&room_id, value).await?;
    }
    let room = alice.wait_for_room(|r| r.vote_by_name("Alice") == Some("13")).await?;
    assert_eq!(room.votes.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_vote_after_reveal_is_ignored() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;
    let room_id = alice.create_room("Alice", None).await?;

    alice.cast_vote(&room_id, "3").await?;
    alice.reveal(&room_id).await?;
    alice.wait_for_room(|r| r.revealed).await?;

    alice.cast_vote(&room_id, "21").await?;
    // Commands from one connection are handled in order, so the claim's
    // snapshot is taken after the late vote was processed.
    alice.claim_scrum_master(&room_id).await?;
    let room = alice.wait_for_room(|r| r.scrum_master_id.is_some()).await?;

    assert!(room.revealed);
    assert_eq!(room.vote_by_name("Alice"), Some("3"));
    Ok(())
}

#[tokio::test]
async fn test_late_joiner_after_reveal_votes_only_after_reset() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;
    let mut carol = TestClient::connect(&server.ws_url()).await?;

    let room_id = alice.create_room("Alice", None).await?;
    alice.cast_vote(&room_id, "5").await?;
    alice.reveal(&room_id).await?;
    alice.wait_for_room(|r| r.revealed).await?;

    assert_eq!(carol.join_room(room_id.as_str(), "Carol").await?, Ok(()));
    let room = carol.next_room_state().await?;
    assert!(room.revealed);
    assert_eq!(room.vote_by_name("Carol"), None);

    carol.cast_vote(&room_id, "8").await?;
    carol.reset(&room_id).await?;
    let room = carol.wait_for_room(|r| !r.revealed).await?;
    assert!(room.votes.is_empty());

    carol.cast_vote(&room_id, "8").await?;
    let room = alice.wait_for_room(|r| r.vote_by_name("Carol").is_some()).await?;
    assert_eq!(room.vote_by_name("Carol"), Some("8"));
    Ok(())
}

#[tokio::test]
async fn test_reset_is_idempotent() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;
    let room_id = alice.create_room("Alice", None).await?;

    alice.reset(&room_id).await?;
    alice.reset(&room_id).await?;
    alice.cast_vote(&room_id, "2").await?;
    let room = alice.wait_for_room(|r| !r.votes.is_empty()).await?;

    assert!(!room.revealed);
    assert_eq!(room.vote_by_name("Alice"), Some("2"));
    Ok(())
}

#[tokio::test]
async fn test_sole_participant_disconnect_deletes_room() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut watcher = TestClient::connect(&server.ws_url()).await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;

    let room_id = alice.create_room("Alice", Some("Grooming")).await?;
    watcher.wait_for_lobby(|rooms| rooms.len() == 1).await?;

    alice.close().await?;
    watcher.wait_for_lobby(<[_]>::is_empty).await?;

    assert!(server.controller().get_room(room_id).await?.is_none());
    assert_eq!(server.status().await?.room_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_departure_removes_vote_and_keeps_room() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;
    let mut bob = TestClient::connect(&server.ws_url()).await?;

    let room_id = alice.create_room("Alice", None).await?;
    bob.join_room(room_id.as_str(), "Bob").await?.unwrap();
    bob.cast_vote(&room_id, "5").await?;
    alice.wait_for_room(|r| r.votes.len() == 1).await?;

    bob.close().await?;
    let room = alice.wait_for_room(|r| r.participants.len() == 1).await?;
    assert!(room.votes.is_empty());
    assert_eq!(room.participants[0].connection_id, alice.id());
    Ok(())
}

#[tokio::test]
async fn test_leave_room_keeps_connection_in_lobby() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;
    let mut bob = TestClient::connect(&server.ws_url()).await?;

    let room_id = alice.create_room("Alice", None).await?;
    bob.join_room(room_id.as_str(), "Bob").await?.unwrap();

    bob.leave_room(&room_id).await?;
    alice.wait_for_room(|r| r.participants.len() == 1).await?;

    // Bob still receives lobby updates after leaving
    alice.reveal(&room_id).await?;
    let rooms = bob.wait_for_lobby(|rooms| rooms.iter().any(|r| r.revealed)).await?;
    assert_eq!(rooms[0].participant_count, 1);
    assert_eq!(server.status().await?.connection_count, 2);
    Ok(())
}

#[tokio::test]
async fn test_creating_second_room_leaves_first() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;

    let first = alice.create_room("Alice", Some("First")).await?;
    let second = alice.create_room("Alice", Some("Second")).await?;
    assert_ne!(first, second);

    let rooms = alice
        .wait_for_lobby(|rooms| rooms.len() == 1 && rooms[0].room_id == second)
        .await?;
    assert_eq!(rooms[0].room_name.as_deref(), Some("Second"));
    assert!(server.controller().get_room(first).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_commands_for_missing_room_are_silent() -> Result<()> {
    let server = TestPokerServer::spawn().await?;
    let mut alice = TestClient::connect(&server.ws_url()).await?;
    alice.next_active_rooms().await?;

    let ghost = common::types::RoomId::new("ZZZZZZ");
    alice.cast_vote(&ghost, "5").await?;
    alice.reveal(&ghost).await?;
    alice.reset(&ghost).await?;
    alice.claim_scrum_master(&ghost).await?;

    alice
        .expect_silence(std::time::Duration::from_millis(200))
        .await?;
    Ok(())
}
