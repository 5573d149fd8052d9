//! WebSocket wire protocol.
//!
//! Every frame is a JSON text message with a `type` discriminator. Field
//! names are camelCase.

use crate::errors::{JoinError, PokerError};
use crate::room::{RoomSnapshot, RoomSummary};
use common::types::{ConnectionId, RoomId};
use serde::{Deserialize, Serialize};

/// Commands accepted from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    CreateRoom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        display_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_name: Option<String>,
    },
    JoinRoom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        room_id: String,
        display_name: String,
    },
    LeaveRoom {
        room_id: String,
    },
    CastVote {
        room_id: String,
        value: String,
    },
    RevealVotes {
        room_id: String,
    },
    ResetVotes {
        room_id: String,
    },
    ClaimScrumMaster {
        room_id: String,
    },
    RevokeScrumMaster {
        room_id: String,
    },
}

impl ClientCommand {
    /// Wire name, used as a metrics label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::CreateRoom { .. } => "createRoom",
            ClientCommand::JoinRoom { .. } => "joinRoom",
            ClientCommand::LeaveRoom { .. } => "leaveRoom",
            ClientCommand::CastVote { .. } => "castVote",
            ClientCommand::RevealVotes { .. } => "revealVotes",
            ClientCommand::ResetVotes { .. } => "resetVotes",
            ClientCommand::ClaimScrumMaster { .. } => "claimScrumMaster",
            ClientCommand::RevokeScrumMaster { .. } => "revokeScrumMaster",
        }
    }

    /// Parse a text frame.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed or unknown commands.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Events pushed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// First frame on every connection.
    Welcome { connection_id: ConnectionId },
    /// Acknowledges `createRoom`.
    RoomCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        room_id: RoomId,
    },
    /// Acknowledges `joinRoom`.
    JoinResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<JoinError>,
    },
    /// Full room state for members.
    RoomState { room: RoomSnapshot },
    /// Lobby list for everyone.
    ActiveRooms { rooms: Vec<RoomSummary> },
    /// Protocol or create failure.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        error: String,
        message: String,
    },
}

impl ServerEvent {
    /// Wire name, used as a metrics label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Welcome { .. } => "welcome",
            ServerEvent::RoomCreated { .. } => "roomCreated",
            ServerEvent::JoinResult { .. } => "joinResult",
            ServerEvent::RoomState { .. } => "roomState",
            ServerEvent::ActiveRooms { .. } => "activeRooms",
            ServerEvent::Error { .. } => "error",
        }
    }

    #[must_use]
    pub fn join_accepted(request_id: Option<u64>) -> Self {
        ServerEvent::JoinResult {
            request_id,
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn join_rejected(request_id: Option<u64>, error: JoinError) -> Self {
        ServerEvent::JoinResult {
            request_id,
            success: false,
            error: Some(error),
        }
    }

    /// Error reply for a failed command.
    #[must_use]
    pub fn from_error(request_id: Option<u64>, err: &PokerError) -> Self {
        ServerEvent::Error {
            request_id,
            error: err.error_code().to_string(),
            message: err.client_message(),
        }
    }

    /// Error reply for a frame that could not be parsed.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            request_id: None,
            error: "MalformedCommand".to_string(),
            message: message.into(),
        }
    }
}
