//! Broadcast dispatcher.
//!
//! Mutations accumulate a [`Publication`]; once the mutation is complete the
//! controller hands it to the [`Dispatcher`], which projects the current
//! store state and queues:
//!
//! - `roomState` to every participant of each changed room
//! - `activeRooms` to every registered connection when the lobby changed
//!
//! Projection happens after the mutation, never before, so a broadcast
//! always reflects the state the mutation produced.
//!
//! Queueing never waits. A connection whose queue is full is reported back
//! as stalled; the controller evicts it, because a snapshot it missed would
//! otherwise only be repaired by some later, unrelated mutation.

use super::metrics::ActorMetrics;
use super::registry::{ConnectionRegistry, Delivery};
use crate::observability::metrics as prom;
use crate::protocol::ServerEvent;
use crate::room::{Change, RoomStore};
use common::types::{ConnectionId, RoomId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Broadcast work produced by one mutation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Publication {
    rooms: Vec<RoomId>,
    lobby: bool,
}

impl Publication {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one room change into the publication.
    pub fn record(&mut self, room_id: &RoomId, change: Change) {
        if change.room && !self.rooms.contains(room_id) {
            self.rooms.push(room_id.clone());
        }
        self.lobby |= change.lobby;
    }

    #[must_use]
    pub fn rooms(&self) -> &[RoomId] {
        &self.rooms
    }

    #[must_use]
    pub fn lobby_changed(&self) -> bool {
        self.lobby
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty() && !self.lobby
    }
}

/// Counts from one dispatch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    pub queued: usize,
    pub dropped: usize,
    /// Connections whose outbound queue was full, each listed once.
    pub stalled: Vec<ConnectionId>,
}

pub struct Dispatcher {
    metrics: Arc<ActorMetrics>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(metrics: Arc<ActorMetrics>) -> Self {
        Self { metrics }
    }

    /// Push the broadcasts described by `publication`.
    pub fn publish(
        &self,
        store: &RoomStore,
        registry: &ConnectionRegistry,
        publication: &Publication,
    ) -> DispatchStats {
        let mut stats = DispatchStats::default();

        for room_id in publication.rooms() {
            // Destroyed rooms have no members left to notify
            let Some(snapshot) = store.snapshot(room_id) else {
                continue;
            };
            let members: Vec<ConnectionId> = snapshot
                .participants
                .iter()
                .map(|p| p.connection_id)
                .collect();
            let event = ServerEvent::RoomState { room: snapshot };
            for member in members {
                self.send(registry, member, event.clone(), &mut stats);
            }
        }

        if publication.lobby_changed() {
            let event = ServerEvent::ActiveRooms {
                rooms: store.list_summaries(),
            };
            for connection_id in registry.connection_ids() {
                self.send(registry, connection_id, event.clone(), &mut stats);
            }
        }

        stats
    }

    /// Queue a single event for one connection (acks, welcome).
    pub fn send_to(&self, registry: &ConnectionRegistry, connection_id: ConnectionId, event: ServerEvent) -> Delivery {
        let mut stats = DispatchStats::default();
        self.send(registry, connection_id, event, &mut stats)
    }

    fn send(
        &self,
        registry: &ConnectionRegistry,
        connection_id: ConnectionId,
        event: ServerEvent,
        stats: &mut DispatchStats,
    ) -> Delivery {
        let name = event.name();
        let delivery = registry.deliver(connection_id, event);
        match delivery {
            Delivery::Queued => {
                stats.queued += 1;
                prom::record_event_published(name);
            }
            Delivery::Full => {
                stats.dropped += 1;
                if !stats.stalled.contains(&connection_id) {
                    stats.stalled.push(connection_id);
                }
                self.metrics.record_event_dropped(name);
                warn!(
                    target: "poker.actor.dispatch",
                    connection_id = %connection_id,
                    event = name,
                    "Outbound queue full, event dropped"
                );
            }
            Delivery::Closed => {
                stats.dropped += 1;
                self.metrics.record_event_dropped(name);
                debug!(
                    target: "poker.actor.dispatch",
                    connection_id = %connection_id,
                    event = name,
                    "Outbound queue closed, event dropped"
                );
            }
            Delivery::Unknown => {
                debug!(
                    target: "poker.actor.dispatch",
                    connection_id = %connection_id,
                    event = name,
                    "Event for unregistered connection discarded"
                );
            }
        }
        delivery
    }
}
