//! Room domain: store, identity reconciliation, vote ledger and authority.
//!
//! Everything in here is synchronous and owned by the room controller actor.

pub mod authority;
pub mod code;
pub mod identity;
pub mod ledger;
pub mod model;
pub mod store;

pub use authority::RoundControl;
pub use code::{RandomRoomCodes, RoomCodeSource};
pub use identity::{validate_display_name, JoinKind, JoinOutcome};
pub use model::{
    Authority, Change, Participant, Room, RoomSnapshot, RoomSummary, VoteValue, DEFAULT_DECK,
};
pub use store::{Removal, RoomStore};
