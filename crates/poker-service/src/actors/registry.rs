//! Connection registry.
//!
//! Maps every live transport session to its outbound queue and to the one
//! room it currently sits in, if any. Owned by the room controller.

use crate::protocol::ServerEvent;
use common::types::{ConnectionId, RoomId};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Result of queueing one event for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Outbound queue at capacity; event dropped.
    Full,
    /// Writer side has gone away; event dropped.
    Closed,
    /// No such connection.
    Unknown,
}

#[derive(Debug)]
struct ConnectionEntry {
    outbound: mpsc::Sender<ServerEvent>,
    room: Option<RoomId>,
}

/// A connection removed from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departed {
    /// Room the connection was seated in when it left.
    pub room: Option<RoomId>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: HashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Returns `false` if the id is already registered.
    pub fn register(&mut self, connection_id: ConnectionId, outbound: mpsc::Sender<ServerEvent>) -> bool {
        if self.entries.contains_key(&connection_id) {
            return false;
        }
        self.entries
            .insert(connection_id, ConnectionEntry { outbound, room: None });
        true
    }

    /// Remove a connection, dropping the registry's sender.
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<Departed> {
        self.entries
            .remove(&connection_id)
            .map(|entry| Departed { room: entry.room })
    }

    #[must_use]
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.entries.contains_key(&connection_id)
    }

    #[must_use]
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&RoomId> {
        self.entries
            .get(&connection_id)
            .and_then(|entry| entry.room.as_ref())
    }

    /// Record the room a connection now sits in.
    pub fn set_room(&mut self, connection_id: ConnectionId, room: Option<RoomId>) {
        if let Some(entry) = self.entries.get_mut(&connection_id) {
            entry.room = room;
        }
    }

    /// Queue an event without waiting.
    pub fn deliver(&self, connection_id: ConnectionId, event: ServerEvent) -> Delivery {
        let Some(entry) = self.entries.get(&connection_id) else {
            return Delivery::Unknown;
        };
        match entry.outbound.try_send(event) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Every registered connection.
    pub fn connection_ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.entries.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every connection. Closes all outbound queues.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
