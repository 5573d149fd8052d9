//! Room store.
//!
//! Authoritative, in-process registry of live rooms. Every room read and
//! every room mutation goes through here; the identity, ledger and
//! authority rules are applied on the store's behalf so that no caller ever
//! holds a `&mut Room`.
//!
//! The store is plain synchronous state. It is owned by exactly one
//! [`RoomControllerActor`](crate::actors::RoomControllerActor), which gives
//! each operation exclusive access and makes it atomic with respect to every
//! other operation.

use super::authority::{self, RoundControl};
use super::code::{RandomRoomCodes, RoomCodeSource};
use super::identity::{self, JoinKind, JoinOutcome};
use super::ledger;
use super::model::{Change, Participant, Room, RoomSnapshot, RoomSummary, VoteValue, MAX_ROOM_NAME_CHARS};
use crate::errors::{JoinError, PokerError};
use common::types::{ConnectionId, RoomId};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Number of candidate codes tried before `create_room` gives up.
pub const MAX_CODE_COLLISION_RETRIES: usize = 16;

/// Result of removing a connection from a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Room missing or connection not seated there.
    NotSeated,
    /// Connection removed. The room may have been destroyed with it.
    Removed {
        room_deleted: bool,
        authority_released: bool,
    },
}

impl Removal {
    /// Broadcast impact of the removal.
    #[must_use]
    pub fn change(self) -> Change {
        match self {
            Removal::NotSeated => Change::NONE,
            Removal::Removed { .. } => Change::ROOM_AND_LOBBY,
        }
    }
}

/// Registry of live rooms.
pub struct RoomStore {
    rooms: HashMap<RoomId, Room>,
    codes: Box<dyn RoomCodeSource>,
    next_sequence: u64,
}

impl std::fmt::Debug for RoomStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomStore")
            .field("rooms", &self.rooms.len())
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}

impl RoomStore {
    /// Create an empty store drawing codes from `codes`.
    #[must_use]
    pub fn new(codes: Box<dyn RoomCodeSource>) -> Self {
        Self {
            rooms: HashMap::new(),
            codes,
            next_sequence: 0,
        }
    }

    /// Create an empty store with CSPRNG room codes of `code_length`.
    #[must_use]
    pub fn with_random_codes(code_length: usize) -> Self {
        Self::new(Box::new(RandomRoomCodes::new(code_length)))
    }

    /// Number of live rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Total seats across all rooms.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.rooms.values().map(|r| r.participants.len()).sum()
    }

    /// Create a room seating `creator` as its only participant.
    ///
    /// # Errors
    ///
    /// - `PokerError::InvalidDisplayName` if the name is blank
    /// - `PokerError::Internal` if the code source fails or every candidate
    ///   collides with a live room
    pub fn create_room(
        &mut self,
        creator: ConnectionId,
        display_name: &str,
        room_name: Option<&str>,
    ) -> Result<RoomId, PokerError> {
        let display_name = identity::validate_display_name(display_name)?;

        let mut room_id = None;
        for attempt in 0..MAX_CODE_COLLISION_RETRIES {
            let candidate = self.codes.next_code()?;
            if self.rooms.contains_key(&candidate) {
                warn!(
                    target: "poker.room.store",
                    attempt = attempt + 1,
                    "Room code collision, retrying"
                );
                continue;
            }
            room_id = Some(candidate);
            break;
        }
        let room_id = room_id.ok_or_else(|| {
            PokerError::Internal(format!(
                "no free room code after {MAX_CODE_COLLISION_RETRIES} attempts"
            ))
        })?;

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let room = Room::new(
            room_id.clone(),
            normalize_room_name(room_name),
            Participant {
                connection_id: creator,
                display_name,
            },
            sequence,
        );
        self.rooms.insert(room_id.clone(), room);

        info!(
            target: "poker.room.store",
            room_id = %room_id,
            connection_id = %creator,
            "Room created"
        );

        Ok(room_id)
    }

    /// Read-only view of a live room.
    #[must_use]
    pub fn get_room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// `roomState` projection of a live room.
    #[must_use]
    pub fn snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        self.rooms.get(room_id).map(Room::snapshot)
    }

    /// Lobby list in creation order, computed from current state.
    #[must_use]
    pub fn list_summaries(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<&Room> = self.rooms.values().collect();
        rooms.sort_by_key(|r| r.sequence);
        rooms.into_iter().map(Room::summary).collect()
    }

    /// Check whether a join would be accepted, without applying it.
    ///
    /// # Errors
    ///
    /// `JoinError::RoomNotFound` or `JoinError::NameTaken`.
    pub fn reconcile_join(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        display_name: &str,
    ) -> Result<JoinKind, JoinError> {
        let room = self.rooms.get(room_id).ok_or(JoinError::RoomNotFound)?;
        identity::reconcile(room, connection_id, display_name)
    }

    /// Seat `connection_id` in `room_id` under `display_name`.
    ///
    /// Validation happens before any mutation; a rejected join leaves the
    /// room untouched.
    ///
    /// # Errors
    ///
    /// `JoinError::InvalidDisplayName`, `JoinError::RoomNotFound` or
    /// `JoinError::NameTaken`, checked in that order.
    pub fn join_room(
        &mut self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        display_name: &str,
    ) -> Result<JoinOutcome, JoinError> {
        let display_name = identity::validate_display_name(display_name)?;
        let room = self.rooms.get_mut(room_id).ok_or(JoinError::RoomNotFound)?;
        let kind = identity::reconcile(room, connection_id, &display_name)?;
        let outcome = identity::apply(room, connection_id, display_name, kind);

        debug!(
            target: "poker.room.identity",
            room_id = %room_id,
            connection_id = %connection_id,
            outcome = ?outcome,
            "Join applied"
        );

        Ok(outcome)
    }

    /// Remove a connection from a room, dropping its vote and releasing
    /// authority if it held it. A room left empty is destroyed in the same
    /// step.
    pub fn remove_participant(&mut self, room_id: &RoomId, connection_id: ConnectionId) -> Removal {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return Removal::NotSeated;
        };
        let Some(position) = room
            .participants
            .iter()
            .position(|p| p.connection_id == connection_id)
        else {
            return Removal::NotSeated;
        };

        room.participants.remove(position);
        ledger::forget(room, connection_id);
        let authority_released = authority::release_if_holder(room, connection_id);

        let room_deleted = room.participants.is_empty();
        if room_deleted {
            self.rooms.remove(room_id);
            info!(target: "poker.room.store", room_id = %room_id, "Room destroyed (empty)");
        } else if authority_released {
            info!(
                target: "poker.room.authority",
                room_id = %room_id,
                connection_id = %connection_id,
                "Scrum master left, authority released"
            );
        }

        Removal::Removed {
            room_deleted,
            authority_released,
        }
    }

    /// Record a vote. Ignored for unknown rooms, non-members, revealed
    /// rounds and values that fail [`VoteValue::parse`].
    pub fn cast_vote(&mut self, room_id: &RoomId, connection_id: ConnectionId, raw_value: &str) -> Change {
        let Some(value) = VoteValue::parse(raw_value) else {
            return Change::NONE;
        };
        self.rooms
            .get_mut(room_id)
            .map_or(Change::NONE, |room| ledger::cast_vote(room, connection_id, value))
    }

    /// Reveal the round if the room exists and `control` permits `caller`.
    pub fn reveal(&mut self, room_id: &RoomId, caller: ConnectionId, control: RoundControl) -> Change {
        match self.rooms.get_mut(room_id) {
            Some(room) if control.permits(room, caller) => ledger::reveal(room),
            _ => Change::NONE,
        }
    }

    /// Reset the round if the room exists and `control` permits `caller`.
    pub fn reset(&mut self, room_id: &RoomId, caller: ConnectionId, control: RoundControl) -> Change {
        match self.rooms.get_mut(room_id) {
            Some(room) if control.permits(room, caller) => ledger::reset(room),
            _ => Change::NONE,
        }
    }

    /// Claim scrum-master authority.
    pub fn claim_authority(&mut self, room_id: &RoomId, connection_id: ConnectionId) -> Change {
        self.rooms
            .get_mut(room_id)
            .map_or(Change::NONE, |room| authority::claim(room, connection_id))
    }

    /// Give up scrum-master authority.
    pub fn revoke_authority(&mut self, room_id: &RoomId, connection_id: ConnectionId) -> Change {
        self.rooms
            .get_mut(room_id)
            .map_or(Change::NONE, |room| authority::revoke(room, connection_id))
    }
}

/// Trim a room name, mapping blank to `None` and truncating long names.
#[must_use]
pub fn normalize_room_name(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_ROOM_NAME_CHARS).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::room::code::ScriptedRoomCodes;
    use crate::room::model::Authority;

    fn scripted(codes: &[&str]) -> RoomStore {
        RoomStore::new(Box::new(ScriptedRoomCodes::new(codes.iter().copied())))
    }

    #[test]
    fn test_create_room_seats_creator() {
        let mut store = scripted(&["AAAAAA"]);
        let alice = ConnectionId::new();

        let room_id = store.create_room(alice, " Alice ", Some("Sprint 42")).unwrap();
        assert_eq!(room_id.as_str(), "AAAAAA");

        let room = store.get_room(&room_id).unwrap();
        assert_eq!(room.participants().len(), 1);
        assert_eq!(room.participants()[0].display_name, "Alice");
        assert_eq!(room.room_name(), Some("Sprint 42"));
        assert_eq!(room.vote_count(), 0);
        assert!(!room.is_revealed());
        assert_eq!(room.authority(), Authority::Unclaimed);
    }

    #[test]
    fn test_create_room_invalid_name() {
        let mut store = scripted(&["AAAAAA"]);
        let result = store.create_room(ConnectionId::new(), "  ", None);
        assert!(matches!(result, Err(PokerError::InvalidDisplayName)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_room_accepts_long_name() {
        let mut store = scripted(&["AAAAAA"]);
        let alice = ConnectionId::new();

        let room_id = store
            .create_room(alice, "Alexandria Konstantinopoulou-Smith", None)
            .unwrap();

        let room = store.get_room(&room_id).unwrap();
        assert_eq!(room.participants()[0].display_name, "Alexandria Konstantinopoulou-Smi");
    }

    #[test]
    fn test_create_room_retries_on_collision() {
        let mut store = scripted(&["AAAAAA", "AAAAAA", "BBBBBB"]);
        let first = store.create_room(ConnectionId::new(), "Alice", None).unwrap();
        let second = store.create_room(ConnectionId::new(), "Bob", None).unwrap();

        assert_eq!(first.as_str(), "AAAAAA");
        assert_eq!(second.as_str(), "BBBBBB");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_create_room_gives_up_after_max_collisions() {
        let mut codes = vec!["AAAAAA"; MAX_CODE_COLLISION_RETRIES + 1];
        codes.push("BBBBBB");
        let mut store = scripted(&codes);
        store.create_room(ConnectionId::new(), "Alice", None).unwrap();

        let result = store.create_room(ConnectionId::new(), "Bob", None);
        assert!(matches!(result, Err(PokerError::Internal(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_create_room_propagates_source_failure() {
        let mut store = scripted(&[]);
        let result = store.create_room(ConnectionId::new(), "Alice", None);
        assert!(matches!(result, Err(PokerError::Internal(_))));
    }

    #[test]
    fn test_random_codes_store_creates_unique_rooms() {
        let mut store = RoomStore::with_random_codes(4);
        for i in 0..50 {
            store
                .create_room(ConnectionId::new(), &format!("p{i}"), None)
                .unwrap();
        }
        assert_eq!(store.len(), 50);
    }

    #[test]
    fn test_normalize_room_name() {
        assert_eq!(normalize_room_name(None), None);
        assert_eq!(normalize_room_name(Some("   ")), None);
        assert_eq!(normalize_room_name(Some(" Team ")), Some("Team".to_string()));
        let long = "n".repeat(100);
        assert_eq!(
            normalize_room_name(Some(&long)).unwrap().chars().count(),
            MAX_ROOM_NAME_CHARS
        );
    }

    #[test]
    fn test_join_room_errors_in_order() {
        let mut store = scripted(&["AAAAAA"]);
        let alice = ConnectionId::new();
        let room_id = store.create_room(alice, "Alice", None).unwrap();
        let bob = ConnectionId::new();

        assert_eq!(
            store.join_room(&RoomId::new("NOPE00"), bob, ""),
            Err(JoinError::InvalidDisplayName)
        );
        assert_eq!(
            store.join_room(&RoomId::new("NOPE00"), bob, "Bob"),
            Err(JoinError::RoomNotFound)
        );
        assert_eq!(
            store.join_room(&room_id, bob, " Alice "),
            Err(JoinError::NameTaken)
        );
        assert_eq!(store.get_room(&room_id).unwrap().participants().len(), 1);

        assert_eq!(store.join_room(&room_id, bob, "Bob"), Ok(JoinOutcome::Joined));
        assert_eq!(store.get_room(&room_id).unwrap().participants().len(), 2);
    }

    #[test]
    fn test_reconcile_join_does_not_mutate() {
        let mut store = scripted(&["AAAAAA"]);
        let room_id = store.create_room(ConnectionId::new(), "Alice", None).unwrap();
        let bob = ConnectionId::new();

        assert_eq!(store.reconcile_join(&room_id, bob, "Bob"), Ok(JoinKind::NewSeat));
        assert_eq!(store.get_room(&room_id).unwrap().participants().len(), 1);
        assert_eq!(
            store.reconcile_join(&RoomId::new("ZZZZZZ"), bob, "Bob"),
            Err(JoinError::RoomNotFound)
        );
    }

    #[test]
    fn test_remove_participant_atomic_cleanup() {
        let mut store = scripted(&["AAAAAA"]);
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        let room_id = store.create_room(alice, "Alice", None).unwrap();
        store.join_room(&room_id, bob, "Bob").unwrap();
        store.cast_vote(&room_id, alice, "8");
        store.cast_vote(&room_id, bob, "5");
        store.claim_authority(&room_id, alice);

        let removal = store.remove_participant(&room_id, alice);
        assert_eq!(
            removal,
            Removal::Removed {
                room_deleted: false,
                authority_released: true
            }
        );
        assert_eq!(removal.change(), Change::ROOM_AND_LOBBY);

        let room = store.get_room(&room_id).unwrap();
        assert!(!room.has_participant(alice));
        assert!(room.vote_of(alice).is_none());
        assert_eq!(room.vote_of(bob).unwrap().as_str(), "5");
        assert_eq!(room.scrum_master_id(), None);
    }

    #[test]
    fn test_last_participant_leaving_destroys_room() {
        let mut store = scripted(&["AAAAAA"]);
        let alice = ConnectionId::new();
        let room_id = store.create_room(alice, "Alice", None).unwrap();

        let removal = store.remove_participant(&room_id, alice);
        assert!(matches!(removal, Removal::Removed { room_deleted: true, .. }));
        assert!(store.get_room(&room_id).is_none());
        assert!(store.list_summaries().is_empty());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut store = scripted(&["AAAAAA"]);
        let room_id = store.create_room(ConnectionId::new(), "Alice", None).unwrap();

        assert_eq!(
            store.remove_participant(&room_id, ConnectionId::new()),
            Removal::NotSeated
        );
        assert_eq!(
            store.remove_participant(&RoomId::new("ZZZZZZ"), ConnectionId::new()),
            Removal::NotSeated
        );
        assert_eq!(Removal::NotSeated.change(), Change::NONE);
    }

    #[test]
    fn test_list_summaries_in_creation_order() {
        let mut store = scripted(&["CCCCCC", "AAAAAA", "BBBBBB"]);
        let c = store.create_room(ConnectionId::new(), "p1", None).unwrap();
        let a = store.create_room(ConnectionId::new(), "p2", None).unwrap();
        let b = store.create_room(ConnectionId::new(), "p3", None).unwrap();

        let ids: Vec<RoomId> = store.list_summaries().into_iter().map(|s| s.room_id).collect();
        assert_eq!(ids, vec![c, a, b]);
    }

    #[test]
    fn test_summaries_track_live_state() {
        let mut store = scripted(&["AAAAAA"]);
        let alice = ConnectionId::new();
        let room_id = store.create_room(alice, "Alice", None).unwrap();
        store.join_room(&room_id, ConnectionId::new(), "Bob").unwrap();
        store.reveal(&room_id, alice, RoundControl::Open);

        let summaries = store.list_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].participant_count, 2);
        assert!(summaries[0].revealed);
        assert_eq!(store.participant_count(), 2);
    }

    #[test]
    fn test_vote_ledger_matches_last_cast_per_participant() {
        let mut store = scripted(&["AAAAAA"]);
        let ids: Vec<ConnectionId> = (0..4).map(|_| ConnectionId::new()).collect();
        let room_id = store.create_room(ids[0], "p0", None).unwrap();
        for (i, id) in ids.iter().enumerate().skip(1) {
            store.join_room(&room_id, *id, &format!("p{i}")).unwrap();
        }

        let casts = [(0, "1"), (1, "2"), (0, "3"), (2, "5"), (3, "8"), (1, "13")];
        for (who, value) in casts {
            store.cast_vote(&room_id, ids[who], value);
        }

        let room = store.get_room(&room_id).unwrap();
        assert_eq!(room.vote_count(), 4);
        assert_eq!(room.vote_of(ids[0]).unwrap().as_str(), "3");
        assert_eq!(room.vote_of(ids[1]).unwrap().as_str(), "13");
        assert_eq!(room.vote_of(ids[2]).unwrap().as_str(), "5");
        assert_eq!(room.vote_of(ids[3]).unwrap().as_str(), "8");
    }

    #[test]
    fn test_invalid_vote_values_are_ignored() {
        let mut store = scripted(&["AAAAAA"]);
        let alice = ConnectionId::new();
        let room_id = store.create_room(alice, "Alice", None).unwrap();

        assert_eq!(store.cast_vote(&room_id, alice, "   "), Change::NONE);
        assert_eq!(store.cast_vote(&room_id, alice, "way-too-long"), Change::NONE);
        assert_eq!(store.cast_vote(&RoomId::new("ZZZZZZ"), alice, "5"), Change::NONE);
        assert_eq!(store.get_room(&room_id).unwrap().vote_count(), 0);
    }

    #[test]
    fn test_reveal_and_reset_on_missing_room() {
        let mut store = scripted(&[]);
        let caller = ConnectionId::new();
        let missing = RoomId::new("ZZZZZZ");
        assert_eq!(store.reveal(&missing, caller, RoundControl::Open), Change::NONE);
        assert_eq!(store.reset(&missing, caller, RoundControl::Open), Change::NONE);
        assert_eq!(store.claim_authority(&missing, caller), Change::NONE);
        assert_eq!(store.revoke_authority(&missing, caller), Change::NONE);
    }

    #[test]
    fn test_holder_only_round_control() {
        let mut store = scripted(&["AAAAAA"]);
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();
        let room_id = store.create_room(alice, "Alice", None).unwrap();
        store.join_room(&room_id, bob, "Bob").unwrap();
        store.claim_authority(&room_id, alice);

        assert_eq!(store.reveal(&room_id, bob, RoundControl::HolderOnly), Change::NONE);
        assert!(!store.get_room(&room_id).unwrap().is_revealed());

        assert_eq!(
            store.reveal(&room_id, alice, RoundControl::HolderOnly),
            Change::ROOM_AND_LOBBY
        );
        assert_eq!(store.reset(&room_id, bob, RoundControl::HolderOnly), Change::NONE);
        assert!(store.get_room(&room_id).unwrap().is_revealed());

        // open control ignores the holder
        assert_eq!(store.reset(&room_id, bob, RoundControl::Open), Change::ROOM_AND_LOBBY);
    }

    #[test]
    fn test_alice_bob_round() {
        let mut store = scripted(&["R1R1R1"]);
        let alice = ConnectionId::new();
        let bob = ConnectionId::new();

        let room_id = store.create_room(alice, "Alice", None).unwrap();
        store.join_room(&room_id, bob, "Bob").unwrap();
        store.cast_vote(&room_id, bob, "5");
        store.cast_vote(&room_id, alice, "8");
        store.reveal(&room_id, alice, RoundControl::Open);

        let snapshot = store.snapshot(&room_id).unwrap();
        assert!(snapshot.revealed);
        assert_eq!(snapshot.vote_by_name("Alice"), Some("8"));
        assert_eq!(snapshot.vote_by_name("Bob"), Some("5"));

        store.reset(&room_id, alice, RoundControl::Open);
        let snapshot = store.snapshot(&room_id).unwrap();
        assert!(!snapshot.revealed);
        assert!(snapshot.votes.is_empty());
    }
}
