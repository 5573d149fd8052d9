//! Vote ledger: per-round votes and the reveal flag.
//!
//! Votes are accepted only from current participants and only while the
//! round is hidden. Commands that do not apply return [`Change::NONE`] and
//! are never reported to the caller.

use super::model::{Change, Room, VoteValue};
use common::types::ConnectionId;

/// Record or overwrite `connection_id`'s vote.
pub(super) fn cast_vote(room: &mut Room, connection_id: ConnectionId, value: VoteValue) -> Change {
    if room.revealed || !room.has_participant(connection_id) {
        return Change::NONE;
    }
    room.votes.insert(connection_id, value);
    Change::ROOM
}

/// Make votes visible. The lobby only changes when the flag flips.
pub(super) fn reveal(room: &mut Room) -> Change {
    if room.revealed {
        return Change::ROOM;
    }
    room.revealed = true;
    Change::ROOM_AND_LOBBY
}

/// Clear all votes and start a hidden round. Idempotent.
pub(super) fn reset(room: &mut Room) -> Change {
    let was_revealed = room.revealed;
    room.votes.clear();
    room.revealed = false;
    if was_revealed {
        Change::ROOM_AND_LOBBY
    } else {
        Change::ROOM
    }
}

/// Drop a departing participant's vote.
pub(super) fn forget(room: &mut Room, connection_id: ConnectionId) {
    room.votes.remove(&connection_id);
}
