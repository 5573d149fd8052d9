//! Controller mailbox monitoring and shared actor counters.
//!
//! | Level    | Mailbox depth |
//! |----------|---------------|
//! | Normal   | <= 100        |
//! | Warning  | 101-500       |
//! | Critical | > 500         |

use crate::observability::metrics as prom;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mailbox depth thresholds for the room controller.
pub const CONTROLLER_MAILBOX_NORMAL: usize = 100;
pub const CONTROLLER_MAILBOX_WARNING: usize = 500;

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks how many messages sit in the controller mailbox.
///
/// Handles record the enqueue after a successful send; the actor records
/// the dequeue once the message has been handled.
#[derive(Debug, Default)]
pub struct MailboxMonitor {
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a message being added to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;

        let mut current_peak = self.peak_depth.load(Ordering::Relaxed);
        while new_depth > current_peak {
            match self.peak_depth.compare_exchange_weak(
                current_peak,
                new_depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_peak = actual,
            }
        }

        match level_for_depth(new_depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "poker.actor.mailbox",
                    depth = new_depth,
                    threshold = CONTROLLER_MAILBOX_WARNING,
                    "Controller mailbox depth critical"
                );
            }
            MailboxLevel::Warning if new_depth == CONTROLLER_MAILBOX_NORMAL + 1 => {
                debug!(
                    target: "poker.actor.mailbox",
                    depth = new_depth,
                    "Controller mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message being removed from the mailbox.
    pub fn record_dequeue(&self) {
        // Saturate: a message sent before the monitor was attached is
        // dequeued without a matching enqueue.
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            });
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        level_for_depth(self.current_depth())
    }
}

fn level_for_depth(depth: usize) -> MailboxLevel {
    if depth > CONTROLLER_MAILBOX_WARNING {
        MailboxLevel::Critical
    } else if depth > CONTROLLER_MAILBOX_NORMAL {
        MailboxLevel::Warning
    } else {
        MailboxLevel::Normal
    }
}

/// Counters shared between the controller and the HTTP layer.
///
/// The controller is the only writer. Every update is mirrored to the
/// Prometheus recorder.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    active_rooms: AtomicUsize,
    active_connections: AtomicUsize,
    events_dropped: AtomicU64,
    connections_evicted: AtomicU64,
}

impl ActorMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_rooms(&self, count: usize) {
        self.active_rooms.store(count, Ordering::Relaxed);
        prom::set_rooms_active(count);
    }

    pub fn set_connections(&self, count: usize) {
        self.active_connections.store(count, Ordering::Relaxed);
        prom::set_connections_active(count);
    }

    /// Record an outbound event dropped on a full or closed queue.
    pub fn record_event_dropped(&self, event: &'static str) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
        prom::record_event_dropped(event);
    }

    /// Record a connection closed because its outbound queue overflowed.
    pub fn record_eviction(&self) {
        self.connections_evicted.fetch_add(1, Ordering::Relaxed);
        prom::record_connection_evicted();
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.active_rooms.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn connections_evicted(&self) -> u64 {
        self.connections_evicted.load(Ordering::Relaxed)
    }
}
