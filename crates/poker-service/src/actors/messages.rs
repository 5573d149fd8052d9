//! Controller mailbox message types.

use crate::errors::PokerError;
use crate::protocol::{ClientCommand, ServerEvent};
use crate::room::{RoomSnapshot, RoomSummary};
use common::types::{ConnectionId, RoomId};
use tokio::sync::{mpsc, oneshot};

/// Messages handled by the `RoomControllerActor`.
#[derive(Debug)]
pub enum ControllerMessage {
    /// A transport session opened.
    Connect {
        connection_id: ConnectionId,
        outbound: mpsc::Sender<ServerEvent>,
        respond_to: oneshot::Sender<Result<(), PokerError>>,
    },

    /// A parsed client command.
    Command {
        connection_id: ConnectionId,
        command: ClientCommand,
    },

    /// A transport session closed.
    Disconnect { connection_id: ConnectionId },

    /// Read the current snapshot of one room.
    GetRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Option<RoomSnapshot>>,
    },

    /// Read the lobby list.
    ListRooms {
        respond_to: oneshot::Sender<Vec<RoomSummary>>,
    },

    /// Read controller status.
    GetStatus {
        respond_to: oneshot::Sender<ControllerStatus>,
    },

    /// Stop accepting connections and exit the loop.
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Controller status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStatus {
    pub room_count: usize,
    pub connection_count: usize,
    pub participant_count: usize,
    pub is_draining: bool,
    pub mailbox_depth: usize,
    pub messages_processed: u64,
}

/// How a command was handled, used as the `outcome` metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// State changed.
    Applied,
    /// Precondition failed; nothing changed and nothing was reported.
    Ignored,
    /// Nothing changed; the client received an error acknowledgement.
    Rejected,
}

impl CommandOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CommandOutcome::Applied => "applied",
            CommandOutcome::Ignored => "ignored",
            CommandOutcome::Rejected => "rejected",
        }
    }
}
