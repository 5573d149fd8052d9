//! Scrum-master authority.
//!
//! At most one participant holds authority. A claim succeeds only while the
//! room is unclaimed and only for a current participant; a revoke succeeds
//! only for the holder. Anything else is a silent no-op. The holder losing
//! their seat releases authority implicitly (see `RoomStore::remove_participant`).

use super::model::{Authority, Change, Room};
use common::types::ConnectionId;

/// Who may reveal or reset a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundControl {
    /// Any connection may reveal or reset.
    #[default]
    Open,
    /// While a holder is assigned only the holder may reveal or reset.
    /// Unclaimed rooms stay open.
    HolderOnly,
}

impl RoundControl {
    #[must_use]
    pub fn from_enforcement(enforce_scrum_master: bool) -> Self {
        if enforce_scrum_master {
            RoundControl::HolderOnly
        } else {
            RoundControl::Open
        }
    }

    /// Whether `caller` may reveal or reset `room`.
    #[must_use]
    pub fn permits(self, room: &Room, caller: ConnectionId) -> bool {
        match (self, room.authority) {
            (RoundControl::Open, _) | (RoundControl::HolderOnly, Authority::Unclaimed) => true,
            (RoundControl::HolderOnly, Authority::Claimed(holder)) => holder == caller,
        }
    }
}

pub(super) fn claim(room: &mut Room, connection_id: ConnectionId) -> Change {
    if room.authority != Authority::Unclaimed || !room.has_participant(connection_id) {
        return Change::NONE;
    }
    room.authority = Authority::Claimed(connection_id);
    Change::ROOM
}

pub(super) fn revoke(room: &mut Room, connection_id: ConnectionId) -> Change {
    if room.authority != Authority::Claimed(connection_id) {
        return Change::NONE;
    }
    room.authority = Authority::Unclaimed;
    Change::ROOM
}

/// Release authority if `connection_id` holds it. Returns whether it did.
pub(super) fn release_if_holder(room: &mut Room, connection_id: ConnectionId) -> bool {
    revoke(room, connection_id) != Change::NONE
}
