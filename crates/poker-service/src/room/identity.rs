//! Join reconciliation.
//!
//! Decides what a `joinRoom` means for a room: a fresh seat, an idempotent
//! re-join by the same connection, or a rejection. Display names are unique
//! per room and compared case-sensitively after trimming. A name held by a
//! different live connection is never handed over.

use super::model::{Participant, Room, MAX_DISPLAY_NAME_CHARS};
use crate::errors::JoinError;
use common::types::ConnectionId;

/// How an accepted join applies to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Connection is not yet in the room; it is appended.
    NewSeat,
    /// Connection already sits in the room; its name may change.
    Rejoin,
}

/// Result of an applied join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Rejoined { renamed: bool },
}

/// Trim a display name and cap it at [`MAX_DISPLAY_NAME_CHARS`] characters.
///
/// # Errors
///
/// `JoinError::InvalidDisplayName` if nothing is left after trimming.
pub fn validate_display_name(raw: &str) -> Result<String, JoinError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(JoinError::InvalidDisplayName);
    }
    Ok(trimmed.chars().take(MAX_DISPLAY_NAME_CHARS).collect())
}

/// Decide whether `connection_id` may take `display_name` in `room`.
/// Does not mutate.
pub(super) fn reconcile(
    room: &Room,
    connection_id: ConnectionId,
    display_name: &str,
) -> Result<JoinKind, JoinError> {
    let name_holder = room
        .participants
        .iter()
        .find(|p| p.display_name == display_name);

    if let Some(holder) = name_holder {
        if holder.connection_id != connection_id {
            return Err(JoinError::NameTaken);
        }
    }

    if room.has_participant(connection_id) {
        Ok(JoinKind::Rejoin)
    } else {
        Ok(JoinKind::NewSeat)
    }
}

/// Apply a join already accepted by [`reconcile`].
pub(super) fn apply(
    room: &mut Room,
    connection_id: ConnectionId,
    display_name: String,
    kind: JoinKind,
) -> JoinOutcome {
    match kind {
        JoinKind::NewSeat => {
            room.participants.push(Participant {
                connection_id,
                display_name,
            });
            JoinOutcome::Joined
        }
        JoinKind::Rejoin => {
            let seat = room
                .participants
                .iter_mut()
                .find(|p| p.connection_id == connection_id);
            match seat {
                Some(seat) if seat.display_name != display_name => {
                    seat.display_name = display_name;
                    JoinOutcome::Rejoined { renamed: true }
                }
                _ => JoinOutcome::Rejoined { renamed: false },
            }
        }
    }
}
