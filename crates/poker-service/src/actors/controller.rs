//! `RoomControllerActor` - single writer for all room state.
//!
//! The controller owns the [`RoomStore`] and the [`ConnectionRegistry`].
//! Every connect, command, disconnect and query arrives as a
//! [`ControllerMessage`] on one mailbox and is handled to completion before
//! the next one is read:
//!
//! 1. look up the room and connection
//! 2. apply the mutation through the store
//! 3. queue acknowledgements to the requester
//! 4. project and publish the resulting snapshots
//! 5. evict any connection whose outbound queue overflowed
//!
//! Message handling is synchronous, so no other event can observe or
//! interleave with a half-applied mutation.
//!
//! # Slow Consumers
//!
//! Outbound queues are bounded and never awaited. A connection that cannot
//! take an event is removed exactly as if it had disconnected: its seat,
//! vote and authority go, the room is told, and dropping its queue closes
//! the socket. The client reconnects and receives current state.
//!
//! # Graceful Shutdown
//!
//! On shutdown the controller stops accepting connections, exits its loop
//! and drops every outbound queue, which closes the sockets' writer tasks.

use super::dispatch::{DispatchStats, Dispatcher, Publication};
use super::messages::{CommandOutcome, ControllerMessage, ControllerStatus};
use super::metrics::{ActorMetrics, MailboxMonitor};
use super::registry::{ConnectionRegistry, Delivery};
use crate::config::Config;
use crate::errors::PokerError;
use crate::observability::metrics as prom;
use crate::protocol::{ClientCommand, ServerEvent};
use crate::room::{validate_display_name, Change, RoomSnapshot, RoomStore, RoomSummary, RoundControl};
use common::types::{ConnectionId, RoomId};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Controller mailbox capacity.
const CONTROLLER_CHANNEL_BUFFER: usize = 1000;

/// Behavioural switches for the controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerSettings {
    pub round_control: RoundControl,
}

impl ControllerSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            round_control: RoundControl::from_enforcement(config.enforce_scrum_master),
        }
    }
}

/// Handle to the `RoomControllerActor`.
///
/// `connect` waits for registration; `command` and `disconnect` only wait
/// for mailbox capacity. Queries reply over a oneshot channel.
#[derive(Clone)]
pub struct RoomControllerHandle {
    sender: mpsc::Sender<ControllerMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl RoomControllerHandle {
    /// Spawn a controller configured from `config`.
    #[must_use]
    pub fn new(config: &Config, metrics: Arc<ActorMetrics>) -> Self {
        Self::with_store(
            RoomStore::with_random_codes(config.room_code_length),
            ControllerSettings::from_config(config),
            metrics,
        )
    }

    /// Spawn a controller around an existing store.
    #[must_use]
    pub fn with_store(store: RoomStore, settings: ControllerSettings, metrics: Arc<ActorMetrics>) -> Self {
        let (sender, receiver) = mpsc::channel(CONTROLLER_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();
        let mailbox = MailboxMonitor::new();

        let actor = RoomControllerActor::new(
            receiver,
            cancel_token.clone(),
            store,
            settings,
            metrics,
            Arc::clone(&mailbox),
        );
        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
            mailbox,
        }
    }

    async fn send(&self, message: ControllerMessage) -> Result<(), PokerError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| PokerError::Internal(format!("channel send failed: {e}")))?;
        self.mailbox.record_enqueue();
        Ok(())
    }

    /// Register a new transport session. On success `welcome` and the
    /// current lobby are already queued on `outbound`.
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Result<(), PokerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerMessage::Connect {
            connection_id,
            outbound,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| PokerError::Internal(format!("response receive failed: {e}")))?
    }

    /// Submit a client command.
    pub async fn command(&self, connection_id: ConnectionId, command: ClientCommand) -> Result<(), PokerError> {
        self.send(ControllerMessage::Command {
            connection_id,
            command,
        })
        .await
    }

    /// Report a closed transport session.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), PokerError> {
        self.send(ControllerMessage::Disconnect { connection_id }).await
    }

    /// Current snapshot of one room.
    pub async fn get_room(&self, room_id: RoomId) -> Result<Option<RoomSnapshot>, PokerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerMessage::GetRoom {
            room_id,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| PokerError::Internal(format!("response receive failed: {e}")))
    }

    /// Current lobby list.
    pub async fn list_rooms(&self) -> Result<Vec<RoomSummary>, PokerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerMessage::ListRooms { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| PokerError::Internal(format!("response receive failed: {e}")))
    }

    pub async fn get_status(&self) -> Result<ControllerStatus, PokerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerMessage::GetStatus { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| PokerError::Internal(format!("response receive failed: {e}")))
    }

    /// Stop accepting connections and stop the actor.
    pub async fn shutdown(&self) -> Result<(), PokerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerMessage::Shutdown { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| PokerError::Internal(format!("response receive failed: {e}")))
    }

    /// Resolves once the actor has exited and dropped its mailbox. By then
    /// every outbound queue it held is closed.
    pub async fn stopped(&self) {
        self.sender.closed().await;
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Child token for tasks that must stop with the controller.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// The `RoomControllerActor` implementation.
pub struct RoomControllerActor {
    receiver: mpsc::Receiver<ControllerMessage>,
    cancel_token: CancellationToken,
    store: RoomStore,
    connections: ConnectionRegistry,
    dispatcher: Dispatcher,
    /// Connections that overflowed while handling the current message.
    stalled: Vec<ConnectionId>,
    settings: ControllerSettings,
    accepting_new: bool,
    metrics: Arc<ActorMetrics>,
    mailbox: Arc<MailboxMonitor>,
}

impl RoomControllerActor {
    fn new(
        receiver: mpsc::Receiver<ControllerMessage>,
        cancel_token: CancellationToken,
        store: RoomStore,
        settings: ControllerSettings,
        metrics: Arc<ActorMetrics>,
        mailbox: Arc<MailboxMonitor>,
    ) -> Self {
        Self {
            receiver,
            cancel_token,
            store,
            connections: ConnectionRegistry::new(),
            dispatcher: Dispatcher::new(Arc::clone(&metrics)),
            stalled: Vec::new(),
            settings,
            accepting_new: true,
            metrics,
            mailbox,
        }
    }

    #[instrument(skip_all, name = "poker.actor.controller")]
    async fn run(mut self) {
        info!(
            target: "poker.actor.controller",
            round_control = ?self.settings.round_control,
            "RoomControllerActor started"
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "poker.actor.controller",
                        "RoomControllerActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message);
                            self.mailbox.record_dequeue();
                            prom::set_controller_mailbox_depth(self.mailbox.current_depth());
                        }
                        None => {
                            info!(
                                target: "poker.actor.controller",
                                "RoomControllerActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        let connections = self.connections.len();
        self.connections.clear();
        self.metrics.set_connections(0);

        info!(
            target: "poker.actor.controller",
            rooms_remaining = self.store.len(),
            connections_closed = connections,
            messages_processed = self.mailbox.messages_processed(),
            "RoomControllerActor stopped"
        );
    }

    fn handle_message(&mut self, message: ControllerMessage) {
        match message {
            ControllerMessage::Connect {
                connection_id,
                outbound,
                respond_to,
            } => {
                let result = self.connect(connection_id, outbound);
                let _ = respond_to.send(result);
            }

            ControllerMessage::Command {
                connection_id,
                command,
            } => self.handle_command(connection_id, command),

            ControllerMessage::Disconnect { connection_id } => self.disconnect(connection_id),

            ControllerMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.store.snapshot(&room_id));
            }

            ControllerMessage::ListRooms { respond_to } => {
                let _ = respond_to.send(self.store.list_summaries());
            }

            ControllerMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.status());
            }

            ControllerMessage::Shutdown { respond_to } => {
                self.accepting_new = false;
                info!(
                    target: "poker.actor.controller",
                    rooms = self.store.len(),
                    connections = self.connections.len(),
                    "Shutdown requested, no longer accepting connections"
                );
                self.cancel_token.cancel();
                let _ = respond_to.send(());
            }
        }

        self.evict_stalled();
    }

    fn status(&self) -> ControllerStatus {
        ControllerStatus {
            room_count: self.store.len(),
            connection_count: self.connections.len(),
            participant_count: self.store.participant_count(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
            messages_processed: self.mailbox.messages_processed(),
        }
    }

    fn connect(&mut self, connection_id: ConnectionId, outbound: mpsc::Sender<ServerEvent>) -> Result<(), PokerError> {
        if !self.accepting_new {
            return Err(PokerError::Draining);
        }
        if !self.connections.register(connection_id, outbound) {
            return Err(PokerError::Internal(
                "connection id already registered".to_string(),
            ));
        }
        self.metrics.set_connections(self.connections.len());

        info!(
            target: "poker.actor.controller",
            connection_id = %connection_id,
            connections = self.connections.len(),
            "Connection registered"
        );

        self.reply(connection_id, ServerEvent::Welcome { connection_id });
        self.reply(
            connection_id,
            ServerEvent::ActiveRooms {
                rooms: self.store.list_summaries(),
            },
        );
        Ok(())
    }

    fn disconnect(&mut self, connection_id: ConnectionId) {
        if !self.drop_connection(connection_id) {
            debug!(
                target: "poker.actor.controller",
                connection_id = %connection_id,
                "Disconnect for unknown connection ignored"
            );
            return;
        }

        info!(
            target: "poker.actor.controller",
            connection_id = %connection_id,
            connections = self.connections.len(),
            "Connection closed"
        );
    }

    /// Unregister a connection, free its seat and publish the result.
    /// Returns `false` if the connection was not registered.
    fn drop_connection(&mut self, connection_id: ConnectionId) -> bool {
        let Some(departed) = self.connections.unregister(connection_id) else {
            return false;
        };

        let mut publication = Publication::new();
        if let Some(room_id) = departed.room {
            let removal = self.store.remove_participant(&room_id, connection_id);
            publication.record(&room_id, removal.change());
        }
        self.publish(&publication);

        self.metrics.set_connections(self.connections.len());
        self.metrics.set_rooms(self.store.len());
        true
    }

    /// Evict every connection whose outbound queue overflowed. Each eviction
    /// publishes again and may stall further connections; those are evicted
    /// in the same pass.
    fn evict_stalled(&mut self) {
        while let Some(connection_id) = self.stalled.pop() {
            if !self.drop_connection(connection_id) {
                continue;
            }
            self.metrics.record_eviction();
            warn!(
                target: "poker.actor.controller",
                connection_id = %connection_id,
                connections = self.connections.len(),
                "Outbound queue full, connection evicted"
            );
        }
    }

    fn handle_command(&mut self, connection_id: ConnectionId, command: ClientCommand) {
        let started = Instant::now();
        let name = command.name();

        if !self.connections.contains(connection_id) {
            debug!(
                target: "poker.actor.controller",
                connection_id = %connection_id,
                command = name,
                "Command from unregistered connection ignored"
            );
            prom::record_command(name, CommandOutcome::Ignored.as_str(), started.elapsed());
            return;
        }

        let mut publication = Publication::new();
        let outcome = match command {
            ClientCommand::CreateRoom {
                request_id,
                display_name,
                room_name,
            } => self.create_room(
                connection_id,
                request_id,
                &display_name,
                room_name.as_deref(),
                &mut publication,
            ),
            ClientCommand::JoinRoom {
                request_id,
                room_id,
                display_name,
            } => self.join_room(
                connection_id,
                request_id,
                &RoomId::normalize(&room_id),
                &display_name,
                &mut publication,
            ),
            ClientCommand::LeaveRoom { room_id } => {
                self.leave_room(connection_id, &RoomId::normalize(&room_id), &mut publication)
            }
            ClientCommand::CastVote { room_id, value } => {
                let room_id = RoomId::normalize(&room_id);
                let change = self.store.cast_vote(&room_id, connection_id, &value);
                record(&mut publication, &room_id, change)
            }
            ClientCommand::RevealVotes { room_id } => {
                let room_id = RoomId::normalize(&room_id);
                let change = self
                    .store
                    .reveal(&room_id, connection_id, self.settings.round_control);
                record(&mut publication, &room_id, change)
            }
            ClientCommand::ResetVotes { room_id } => {
                let room_id = RoomId::normalize(&room_id);
                let change = self
                    .store
                    .reset(&room_id, connection_id, self.settings.round_control);
                record(&mut publication, &room_id, change)
            }
            ClientCommand::ClaimScrumMaster { room_id } => {
                let room_id = RoomId::normalize(&room_id);
                let change = self.store.claim_authority(&room_id, connection_id);
                if !change.is_none() {
                    info!(
                        target: "poker.room.authority",
                        room_id = %room_id,
                        connection_id = %connection_id,
                        "Scrum master claimed"
                    );
                }
                record(&mut publication, &room_id, change)
            }
            ClientCommand::RevokeScrumMaster { room_id } => {
                let room_id = RoomId::normalize(&room_id);
                let change = self.store.revoke_authority(&room_id, connection_id);
                if !change.is_none() {
                    info!(
                        target: "poker.room.authority",
                        room_id = %room_id,
                        connection_id = %connection_id,
                        "Scrum master revoked"
                    );
                }
                record(&mut publication, &room_id, change)
            }
        };

        let stats = self.publish(&publication);
        self.metrics.set_rooms(self.store.len());

        debug!(
            target: "poker.actor.controller",
            connection_id = %connection_id,
            command = name,
            outcome = outcome.as_str(),
            queued = stats.queued,
            dropped = stats.dropped,
            "Command handled"
        );
        prom::record_command(name, outcome.as_str(), started.elapsed());
    }

    fn create_room(
        &mut self,
        connection_id: ConnectionId,
        request_id: Option<u64>,
        display_name: &str,
        room_name: Option<&str>,
        publication: &mut Publication,
    ) -> CommandOutcome {
        // The old seat is only given up once the new room exists.
        let room_id = match self.store.create_room(connection_id, display_name, room_name) {
            Ok(room_id) => room_id,
            Err(PokerError::InvalidDisplayName) => {
                debug!(
                    target: "poker.room.identity",
                    connection_id = %connection_id,
                    "Room creation rejected, blank display name"
                );
                self.reply(
                    connection_id,
                    ServerEvent::from_error(request_id, &PokerError::InvalidDisplayName),
                );
                return CommandOutcome::Rejected;
            }
            Err(err) => {
                error!(
                    target: "poker.actor.controller",
                    connection_id = %connection_id,
                    error = %err,
                    "Room creation failed"
                );
                self.reply(connection_id, ServerEvent::from_error(request_id, &err));
                return CommandOutcome::Rejected;
            }
        };

        self.leave_current_room(connection_id, publication);
        self.connections
            .set_room(connection_id, Some(room_id.clone()));
        self.reply(
            connection_id,
            ServerEvent::RoomCreated {
                request_id,
                room_id: room_id.clone(),
            },
        );
        publication.record(&room_id, Change::ROOM_AND_LOBBY);
        debug!(
            target: "poker.room.identity",
            room_id = %room_id,
            connection_id = %connection_id,
            display_name = %display_name.trim(),
            "Creator seated"
        );
        CommandOutcome::Applied
    }

    fn join_room(
        &mut self,
        connection_id: ConnectionId,
        request_id: Option<u64>,
        room_id: &RoomId,
        display_name: &str,
        publication: &mut Publication,
    ) -> CommandOutcome {
        // Check everything before leaving the current room so a rejected
        // join leaves the connection where it was.
        let checked = validate_display_name(display_name)
            .and_then(|name| self.store.reconcile_join(room_id, connection_id, &name));
        if let Err(err) = checked {
            debug!(
                target: "poker.room.identity",
                room_id = %room_id,
                connection_id = %connection_id,
                error = ?err,
                "Join rejected"
            );
            self.reply(connection_id, ServerEvent::join_rejected(request_id, err));
            return CommandOutcome::Rejected;
        }

        if self.connections.room_of(connection_id) != Some(room_id) {
            self.leave_current_room(connection_id, publication);
        }

        match self.store.join_room(room_id, connection_id, display_name) {
            Ok(outcome) => {
                self.connections
                    .set_room(connection_id, Some(room_id.clone()));
                self.reply(connection_id, ServerEvent::join_accepted(request_id));
                publication.record(room_id, Change::ROOM_AND_LOBBY);
                info!(
                    target: "poker.actor.controller",
                    room_id = %room_id,
                    connection_id = %connection_id,
                    outcome = ?outcome,
                    "Participant joined"
                );
                debug!(
                    target: "poker.room.identity",
                    room_id = %room_id,
                    connection_id = %connection_id,
                    display_name = %display_name.trim(),
                    "Participant seated"
                );
                CommandOutcome::Applied
            }
            Err(err) => {
                self.reply(connection_id, ServerEvent::join_rejected(request_id, err));
                CommandOutcome::Rejected
            }
        }
    }

    fn leave_room(&mut self, connection_id: ConnectionId, room_id: &RoomId, publication: &mut Publication) -> CommandOutcome {
        if self.connections.room_of(connection_id) != Some(room_id) {
            return CommandOutcome::Ignored;
        }
        if self.leave_current_room(connection_id, publication) {
            CommandOutcome::Applied
        } else {
            CommandOutcome::Ignored
        }
    }

    /// Remove the connection from whatever room it sits in. Returns whether
    /// it was seated anywhere.
    fn leave_current_room(&mut self, connection_id: ConnectionId, publication: &mut Publication) -> bool {
        let Some(room_id) = self.connections.room_of(connection_id).cloned() else {
            return false;
        };
        self.connections.set_room(connection_id, None);

        let removal = self.store.remove_participant(&room_id, connection_id);
        publication.record(&room_id, removal.change());

        info!(
            target: "poker.actor.controller",
            room_id = %room_id,
            connection_id = %connection_id,
            removal = ?removal,
            "Participant left room"
        );
        !removal.change().is_none()
    }

    /// Queue an acknowledgement for one connection.
    fn reply(&mut self, connection_id: ConnectionId, event: ServerEvent) {
        let delivery = self
            .dispatcher
            .send_to(&self.connections, connection_id, event);
        if delivery == Delivery::Full && !self.stalled.contains(&connection_id) {
            self.stalled.push(connection_id);
        }
    }

    fn publish(&mut self, publication: &Publication) -> DispatchStats {
        let stats = self
            .dispatcher
            .publish(&self.store, &self.connections, publication);
        for connection_id in &stats.stalled {
            if !self.stalled.contains(connection_id) {
                self.stalled.push(*connection_id);
            }
        }
        stats
    }
}

/// Fold a change into the publication and classify it.
fn record(publication: &mut Publication, room_id: &RoomId, change: Change) -> CommandOutcome {
    if change.is_none() {
        return CommandOutcome::Ignored;
    }
    publication.record(room_id, change);
    CommandOutcome::Applied
}
