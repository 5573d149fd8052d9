//! WebSocket client for E2E tests.
//!
//! `TestClient` speaks the room protocol against a running server. Every
//! receive is bounded by a timeout so a missing event fails the test instead
//! of hanging it.

use anyhow::{anyhow, bail, Context};
use common::types::{ConnectionId, RoomId};
use futures_util::{SinkExt, StreamExt};
use poker_service::errors::JoinError;
use poker_service::protocol::{ClientCommand, ServerEvent};
use poker_service::room::{RoomSnapshot, RoomSummary};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Default bound on a single receive.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected protocol client.
pub struct TestClient {
    socket: Socket,
    connection_id: ConnectionId,
    next_request_id: u64,
}

impl TestClient {
    /// Connect and consume the `welcome` frame.
    ///
    /// The initial `activeRooms` frame is left queued.
    pub async fn connect(ws_url: &str) -> Result<Self, anyhow::Error> {
        let (socket, _response) = tokio_tungstenite::connect_async(ws_url)
            .await
            .with_context(|| format!("Failed to connect to {ws_url}"))?;

        let mut client = Self {
            socket,
            connection_id: ConnectionId::default(),
            next_request_id: 1,
        };

        match client.recv().await? {
            ServerEvent::Welcome { connection_id } => client.connection_id = connection_id,
            other => bail!("Expected welcome, got {}", other.name()),
        }
        Ok(client)
    }

    /// Connection id assigned by the server.
    pub fn id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Send one command as a JSON text frame.
    pub async fn send(&mut self, command: &ClientCommand) -> Result<(), anyhow::Error> {
        let text = serde_json::to_string(command)?;
        self.send_raw(&text).await
    }

    /// Send an arbitrary text frame.
    pub async fn send_raw(&mut self, text: &str) -> Result<(), anyhow::Error> {
        self.socket
            .send(Message::Text(text.to_string().into()))
            .await
            .context("Failed to send frame")
    }

    /// Receive the next server event.
    pub async fn recv(&mut self) -> Result<ServerEvent, anyhow::Error> {
        self.recv_within(RECV_TIMEOUT).await
    }

    async fn recv_within(&mut self, limit: Duration) -> Result<ServerEvent, anyhow::Error> {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let frame = tokio::time::timeout_at(deadline, self.socket.next())
                .await
                .map_err(|_| anyhow!("Timed out waiting for a server event"))?;

            match frame {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .with_context(|| format!("Undecodable server event: {text}"));
                }
                Some(Ok(Message::Close(_))) | None => bail!("Connection closed by server"),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("WebSocket read failed"),
            }
        }
    }

    /// Skip events until one matches `predicate`.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> Result<ServerEvent, anyhow::Error>
    where
        F: FnMut(&ServerEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let event = self.recv_within(remaining).await?;
            if predicate(&event) {
                return Ok(event);
            }
        }
    }

    /// Next `roomState` snapshot, skipping anything else.
    pub async fn next_room_state(&mut self) -> Result<RoomSnapshot, anyhow::Error> {
        match self
            .recv_until(|e| matches!(e, ServerEvent::RoomState { .. }))
            .await?
        {
            ServerEvent::RoomState { room } => Ok(room),
            other => bail!("Expected roomState, got {}", other.name()),
        }
    }

    /// First `roomState` whose snapshot satisfies `predicate`.
    pub async fn wait_for_room<F>(&mut self, mut predicate: F) -> Result<RoomSnapshot, anyhow::Error>
    where
        F: FnMut(&RoomSnapshot) -> bool,
    {
        match self
            .recv_until(|e| matches!(e, ServerEvent::RoomState { room } if predicate(room)))
            .await?
        {
            ServerEvent::RoomState { room } => Ok(room),
            other => bail!("Expected roomState, got {}", other.name()),
        }
    }

    /// First `activeRooms` list that satisfies `predicate`.
    pub async fn wait_for_lobby<F>(&mut self, mut predicate: F) -> Result<Vec<RoomSummary>, anyhow::Error>
    where
        F: FnMut(&[RoomSummary]) -> bool,
    {
        match self
            .recv_until(|e| matches!(e, ServerEvent::ActiveRooms { rooms } if predicate(rooms)))
            .await?
        {
            ServerEvent::ActiveRooms { rooms } => Ok(rooms),
            other => bail!("Expected activeRooms, got {}", other.name()),
        }
    }

    /// Next `activeRooms` list, skipping anything else.
    pub async fn next_active_rooms(&mut self) -> Result<Vec<RoomSummary>, anyhow::Error> {
        match self
            .recv_until(|e| matches!(e, ServerEvent::ActiveRooms { .. }))
            .await?
        {
            ServerEvent::ActiveRooms { rooms } => Ok(rooms),
            other => bail!("Expected activeRooms, got {}", other.name()),
        }
    }

    /// Fail if any event arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) -> Result<(), anyhow::Error> {
        match tokio::time::timeout(window, self.socket.next()).await {
            Err(_) => Ok(()),
            Ok(Some(Ok(Message::Text(text)))) => bail!("Unexpected event: {text}"),
            Ok(other) => bail!("Unexpected frame: {other:?}"),
        }
    }

    fn request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Create a room and wait for its `roomCreated` acknowledgement.
    pub async fn create_room(
        &mut self,
        display_name: &str,
        room_name: Option<&str>,
    ) -> Result<RoomId, anyhow::Error> {
        let request_id = self.request_id();
        self.send(&ClientCommand::CreateRoom {
            request_id: Some(request_id),
            display_name: display_name.to_string(),
            room_name: room_name.map(str::to_string),
        })
        .await?;

        let ack = self
            .recv_until(|e| match e {
                ServerEvent::RoomCreated { request_id: rid, .. }
                | ServerEvent::Error { request_id: rid, .. } => *rid == Some(request_id),
                _ => false,
            })
            .await?;
        match ack {
            ServerEvent::RoomCreated { room_id, .. } => Ok(room_id),
            ServerEvent::Error { error, message, .. } => {
                bail!("createRoom failed: {error}: {message}")
            }
            other => bail!("Expected roomCreated, got {}", other.name()),
        }
    }

    /// Join a room and wait for its `joinResult` acknowledgement.
    pub async fn join_room(
        &mut self,
        room_id: &str,
        display_name: &str,
    ) -> Result<Result<(), JoinError>, anyhow::Error> {
        let request_id = self.request_id();
        self.send(&ClientCommand::JoinRoom {
            request_id: Some(request_id),
            room_id: room_id.to_string(),
            display_name: display_name.to_string(),
        })
        .await?;

        let ack = self
            .recv_until(|e| {
                matches!(e, ServerEvent::JoinResult { request_id: rid, .. } if *rid == Some(request_id))
            })
            .await?;
        match ack {
            ServerEvent::JoinResult { success: true, .. } => Ok(Ok(())),
            ServerEvent::JoinResult {
                success: false,
                error: Some(error),
                ..
            } => Ok(Err(error)),
            ServerEvent::JoinResult { .. } => bail!("Rejected joinResult without an error"),
            other => bail!("Expected joinResult, got {}", other.name()),
        }
    }

    pub async fn leave_room(&mut self, room_id: &RoomId) -> Result<(), anyhow::Error> {
        self.send(&ClientCommand::LeaveRoom {
            room_id: room_id.to_string(),
        })
        .await
    }

    pub async fn cast_vote(&mut self, room_id: &RoomId, value: &str) -> Result<(), anyhow::Error> {
        self.send(&ClientCommand::CastVote {
            room_id: room_id.to_string(),
            value: value.to_string(),
        })
        .await
    }

    pub async fn reveal(&mut self, room_id: &RoomId) -> Result<(), anyhow::Error> {
        self.send(&ClientCommand::RevealVotes {
            room_id: room_id.to_string(),
        })
        .await
    }

    pub async fn reset(&mut self, room_id: &RoomId) -> Result<(), anyhow::Error> {
        self.send(&ClientCommand::ResetVotes {
            room_id: room_id.to_string(),
        })
        .await
    }

    pub async fn claim_scrum_master(&mut self, room_id: &RoomId) -> Result<(), anyhow::Error> {
        self.send(&ClientCommand::ClaimScrumMaster {
            room_id: room_id.to_string(),
        })
        .await
    }

    pub async fn revoke_scrum_master(&mut self, room_id: &RoomId) -> Result<(), anyhow::Error> {
        self.send(&ClientCommand::RevokeScrumMaster {
            room_id: room_id.to_string(),
        })
        .await
    }

    /// Send a close frame and wait for the server to finish the handshake.
    pub async fn close(mut self) -> Result<(), anyhow::Error> {
        self.socket.close(None).await.context("Failed to close")?;
        while let Ok(Some(Ok(_))) = tokio::time::timeout(RECV_TIMEOUT, self.socket.next()).await {}
        Ok(())
    }
}
