//! One WebSocket session.
//!
//! The reader half parses text frames into [`ClientCommand`]s and forwards
//! them to the controller. The writer half drains the connection's bounded
//! outbound queue into the socket. The controller holds the only strong
//! sender for that queue, so the writer ends when the controller lets go of
//! the connection: after a reported disconnect, on eviction of a slow
//! consumer, or on shutdown. Whichever half stops first ends the session.

use crate::actors::RoomControllerHandle;
use crate::observability::metrics as prom;
use crate::protocol::{ClientCommand, ServerEvent};
use axum::extract::ws::{Message, WebSocket};
use common::types::ConnectionId;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long the writer may keep flushing after the reader has stopped.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Close frame or end of stream.
    ClientClosed,
    /// Transport error on the socket.
    TransportError,
    /// Controller mailbox closed.
    ControllerGone,
    /// Outbound queue closed by the controller, or the socket stopped
    /// accepting writes.
    WriterClosed,
    /// Server shutdown.
    ServerShutdown,
}

/// Drive a session on an upgraded socket until either side goes away.
pub async fn run_session(
    socket: WebSocket,
    controller: RoomControllerHandle,
    outbound_buffer: usize,
    shutdown: CancellationToken,
) {
    let connection_id = ConnectionId::new();
    let (outbound, events) = mpsc::channel(outbound_buffer);
    let replies = outbound.downgrade();

    if let Err(e) = controller.connect(connection_id, outbound).await {
        warn!(
            target: "poker.ws",
            connection_id = %connection_id,
            error = %e,
            "Connection refused by controller"
        );
        return;
    }

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_events(sink, events, connection_id));

    let end = tokio::select! {
        end = process_frames(stream, connection_id, &controller, &replies) => end,
        _ = &mut writer => SessionEnd::WriterClosed,
        () = shutdown.cancelled() => SessionEnd::ServerShutdown,
    };

    if let Err(e) = controller.disconnect(connection_id).await {
        debug!(
            target: "poker.ws",
            connection_id = %connection_id,
            error = %e,
            "Disconnect not delivered, controller already stopped"
        );
    }

    info!(
        target: "poker.ws",
        connection_id = %connection_id,
        end = ?end,
        "WebSocket session ended"
    );

    if end != SessionEnd::WriterClosed
        && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
            .await
            .is_err()
    {
        warn!(
            target: "poker.ws",
            connection_id = %connection_id,
            "Writer did not finish in time, aborting"
        );
        writer.abort();
    }
}

/// Read frames from `stream` and forward parsed commands to the controller.
///
/// Malformed text frames are answered with an `error` event on `replies`
/// and otherwise ignored. Binary, ping and pong frames are ignored.
pub async fn process_frames<St>(
    mut stream: St,
    connection_id: ConnectionId,
    controller: &RoomControllerHandle,
    replies: &mpsc::WeakSender<ServerEvent>,
) -> SessionEnd
where
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientCommand::from_json(&text) {
                Ok(command) => {
                    if controller.command(connection_id, command).await.is_err() {
                        return SessionEnd::ControllerGone;
                    }
                }
                Err(e) => {
                    prom::record_malformed_frame();
                    debug!(
                        target: "poker.ws",
                        connection_id = %connection_id,
                        error = %e,
                        "Malformed frame"
                    );
                    if let Some(outbound) = replies.upgrade() {
                        let _ = outbound.try_send(ServerEvent::malformed(e.to_string()));
                    }
                }
            },
            Ok(Message::Close(_)) => {
                debug!(target: "poker.ws", connection_id = %connection_id, "Client sent close frame");
                return SessionEnd::ClientClosed;
            }
            Err(e) => {
                debug!(
                    target: "poker.ws",
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket read error"
                );
                return SessionEnd::TransportError;
            }
            Ok(_) => {
                // Binary, Ping, Pong
            }
        }
    }
    SessionEnd::ClientClosed
}

/// Serialize queued events into text frames until the queue closes.
async fn write_events<S>(mut sink: S, mut events: mpsc::Receiver<ServerEvent>, connection_id: ConnectionId)
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    while let Some(event) = events.recv().await {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                error!(
                    target: "poker.ws",
                    connection_id = %connection_id,
                    event = event.name(),
                    error = %e,
                    "Failed to serialize event"
                );
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            debug!(
                target: "poker.ws",
                connection_id = %connection_id,
                error = %e,
                "WebSocket write failed"
            );
            break;
        }
    }
    let _ = sink.close().await;
}
