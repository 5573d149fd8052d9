//! Room data model and its externally visible projections.
//!
//! `Room` is the only mutable representation of a room and is owned by the
//! [`RoomStore`](super::RoomStore). Collaborators only ever see the
//! [`RoomSnapshot`] and [`RoomSummary`] projections.

use chrono::{DateTime, Utc};
use common::types::{ConnectionId, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Display names longer than this, after trimming, are truncated.
pub const MAX_DISPLAY_NAME_CHARS: usize = 32;

/// Room names longer than this are truncated.
pub const MAX_ROOM_NAME_CHARS: usize = 64;

/// Maximum vote value length, in characters, after trimming.
pub const MAX_VOTE_CHARS: usize = 8;

/// Card deck offered by the reference client. The server treats votes as
/// opaque strings and does not reject values outside this deck.
pub const DEFAULT_DECK: [&str; 10] = ["0", "1", "2", "3", "5", "8", "13", "21", "?", "⏸"];

/// One connected actor inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Transport session that owns this seat.
    pub connection_id: ConnectionId,
    /// Name shown to the other participants, unique among them.
    pub display_name: String,
}

/// A submitted card. Opaque to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteValue(String);

impl VoteValue {
    /// Accept a raw card value, trimming whitespace. Returns `None` for empty
    /// or oversized values.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if len == 0 || len > MAX_VOTE_CHARS {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Scrum-master assignment for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Authority {
    /// Nobody holds authority.
    #[default]
    Unclaimed,
    /// Held by this connection, which is always a current participant.
    Claimed(ConnectionId),
}

impl Authority {
    /// Current holder, if any.
    #[must_use]
    pub fn holder(&self) -> Option<ConnectionId> {
        match self {
            Authority::Unclaimed => None,
            Authority::Claimed(id) => Some(*id),
        }
    }
}

/// Live room state.
///
/// Invariants maintained by the `room` module:
/// - `authority` holder is a current participant
/// - every `votes` key is a current participant
/// - no vote is recorded while `revealed` is set
/// - `participants` is never empty while the room is in the store
#[derive(Debug, Clone)]
pub struct Room {
    pub(super) room_id: RoomId,
    pub(super) room_name: Option<String>,
    pub(super) participants: Vec<Participant>,
    pub(super) votes: HashMap<ConnectionId, VoteValue>,
    pub(super) revealed: bool,
    pub(super) authority: Authority,
    pub(super) created_at: DateTime<Utc>,
    /// Store insertion order, used to order the lobby.
    pub(super) sequence: u64,
}

impl Room {
    pub(super) fn new(
        room_id: RoomId,
        room_name: Option<String>,
        creator: Participant,
        sequence: u64,
    ) -> Self {
        Self {
            room_id,
            room_name,
            participants: vec![creator],
            votes: HashMap::new(),
            revealed: false,
            authority: Authority::Unclaimed,
            created_at: Utc::now(),
            sequence,
        }
    }

    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    #[must_use]
    pub fn room_name(&self) -> Option<&str> {
        self.room_name.as_deref()
    }

    /// Participants in join order.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    #[must_use]
    pub fn participant(&self, connection_id: ConnectionId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.connection_id == connection_id)
    }

    #[must_use]
    pub fn has_participant(&self, connection_id: ConnectionId) -> bool {
        self.participant(connection_id).is_some()
    }

    #[must_use]
    pub fn vote_of(&self, connection_id: ConnectionId) -> Option<&VoteValue> {
        self.votes.get(&connection_id)
    }

    #[must_use]
    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    #[must_use]
    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    #[must_use]
    pub fn authority(&self) -> Authority {
        self.authority
    }

    #[must_use]
    pub fn scrum_master_id(&self) -> Option<ConnectionId> {
        self.authority.holder()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Full `roomState` projection.
    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            room_name: self.room_name.clone(),
            participants: self.participants.clone(),
            votes: self
                .votes
                .iter()
                .map(|(id, value)| (*id, value.clone()))
                .collect(),
            revealed: self.revealed,
            scrum_master_id: self.authority.holder(),
            created_at: self.created_at,
        }
    }

    /// Lobby `activeRooms` element.
    #[must_use]
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.room_id.clone(),
            room_name: self.room_name.clone(),
            participant_count: self.participants.len(),
            revealed: self.revealed,
            created_at: self.created_at,
        }
    }
}

/// Complete room projection sent as `roomState`. Never a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub room_name: Option<String>,
    pub participants: Vec<Participant>,
    pub votes: BTreeMap<ConnectionId, VoteValue>,
    pub revealed: bool,
    pub scrum_master_id: Option<ConnectionId>,
    pub created_at: DateTime<Utc>,
}

impl RoomSnapshot {
    /// Look up a participant's vote by display name.
    #[must_use]
    pub fn vote_by_name(&self, display_name: &str) -> Option<&str> {
        let participant = self
            .participants
            .iter()
            .find(|p| p.display_name == display_name)?;
        self.votes
            .get(&participant.connection_id)
            .map(VoteValue::as_str)
    }
}

/// One row of the lobby list sent as `activeRooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub room_name: Option<String>,
    pub participant_count: usize,
    pub revealed: bool,
    pub created_at: DateTime<Utc>,
}

/// What a mutation changed, as far as broadcasting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Change {
    /// Room snapshot must be re-sent to its members.
    pub room: bool,
    /// Lobby list must be re-sent to every connection.
    pub lobby: bool,
}

impl Change {
    /// Rejected or no-op command.
    pub const NONE: Change = Change {
        room: false,
        lobby: false,
    };
    /// Room-only mutation (votes, authority, names).
    pub const ROOM: Change = Change {
        room: true,
        lobby: false,
    };
    /// Mutation visible in the lobby (existence, head count, reveal state).
    pub const ROOM_AND_LOBBY: Change = Change {
        room: true,
        lobby: true,
    };

    #[must_use]
    pub fn is_none(&self) -> bool {
        !self.room && !self.lobby
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn participant(name: &str) -> Participant {
        Participant {
            connection_id: ConnectionId::new(),
            display_name: name.to_string(),
        }
    }

    #[test]
    fn test_vote_value_parse() {
        assert_eq!(VoteValue::parse(" 5 ").unwrap().as_str(), "5");
        assert_eq!(VoteValue::parse("⏸").unwrap().as_str(), "⏸");
        assert!(VoteValue::parse("").is_none());
        assert!(VoteValue::parse("   ").is_none());
        assert!(VoteValue::parse("123456789").is_none());
    }

    #[test]
    fn test_default_deck_values_are_accepted() {
        for card in DEFAULT_DECK {
            assert!(VoteValue::parse(card).is_some(), "card {card} rejected");
        }
    }

    #[test]
    fn test_authority_holder() {
        let id = ConnectionId::new();
        assert_eq!(Authority::Unclaimed.holder(), None);
        assert_eq!(Authority::Claimed(id).holder(), Some(id));
        assert_eq!(Authority::default(), Authority::Unclaimed);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let alice = participant("Alice");
        let mut room = Room::new(RoomId::new("AB12CD"), Some("Sprint".into()), alice.clone(), 0);
        room.votes
            .insert(alice.connection_id, VoteValue::parse("8").unwrap());
        room.authority = Authority::Claimed(alice.connection_id);

        let json = serde_json::to_value(room.snapshot()).unwrap();
        assert_eq!(json["roomId"], "AB12CD");
        assert_eq!(json["roomName"], "Sprint");
        assert_eq!(json["revealed"], false);
        assert_eq!(json["scrumMasterId"], alice.connection_id.to_string());
        assert_eq!(json["participants"][0]["displayName"], "Alice");
        assert_eq!(json["votes"][alice.connection_id.to_string()], "8");
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn test_snapshot_null_scrum_master() {
        let room = Room::new(RoomId::new("AB12CD"), None, participant("Alice"), 0);
        let json = serde_json::to_value(room.snapshot()).unwrap();
        assert!(json["scrumMasterId"].is_null());
        assert!(json["roomName"].is_null());
    }

    #[test]
    fn test_summary_projection() {
        let mut room = Room::new(RoomId::new("AB12CD"), None, participant("Alice"), 3);
        room.participants.push(participant("Bob"));
        room.revealed = true;

        let summary = room.summary();
        assert_eq!(summary.room_id.as_str(), "AB12CD");
        assert_eq!(summary.participant_count, 2);
        assert!(summary.revealed);
        assert_eq!(summary.created_at, room.created_at());
    }

    #[test]
    fn test_vote_by_name() {
        let alice = participant("Alice");
        let mut room = Room::new(RoomId::new("AB12CD"), None, alice.clone(), 0);
        room.participants.push(participant("Bob"));
        room.votes
            .insert(alice.connection_id, VoteValue::parse("3").unwrap());

        let snapshot = room.snapshot();
        assert_eq!(snapshot.vote_by_name("Alice"), Some("3"));
        assert_eq!(snapshot.vote_by_name("Bob"), None);
        assert_eq!(snapshot.vote_by_name("Carol"), None);
    }

    #[test]
    fn test_change_constants() {
        assert!(Change::NONE.is_none());
        assert!(!Change::ROOM.is_none());
        assert!(Change::ROOM_AND_LOBBY.lobby);
        assert!(!Change::ROOM.lobby);
    }
}
