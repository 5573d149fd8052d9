//! # Poker Test Utilities
//!
//! Shared test utilities for the poker service.
//!
//! This crate provides:
//! - Server test harness (`TestPokerServer` for E2E tests)
//! - WebSocket client (`TestClient`) speaking the room protocol
//!
//! ## Usage
//!
//! ```rust,ignore
//! use poker_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestPokerServer::spawn().await?;
//!     let mut alice = TestClient::connect(&server.ws_url()).await?;
//!
//!     let room_id = alice.create_room("Alice", None).await?;
//!     let room = alice.next_room_state().await?;
//!     assert_eq!(room.room_id, room_id);
//!     Ok(())
//! }
//! ```

pub mod server_harness;
pub mod ws_client;

// Re-export commonly used items
pub use server_harness::*;
pub use ws_client::*;
