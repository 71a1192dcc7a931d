//! Receive loop.
//!
//! Owns the read half of the socket. Each binary message is decoded into a
//! frame, expanded into leaf frames and handed to the dispatcher in wire
//! order. Only transport failures end the loop; bad frames are logged and
//! skipped.
//!
//! # States
//!
//! ```text
//! Running ──(read error / end of stream / close frame)─► Stopped  (marks connection dead)
//!    │
//!    └─────(dead / shutdown / reload)──────────────────► Stopped
//! ```

// ============================================================================
// Imports
// ============================================================================

use futures_util::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, trace, warn};

use crate::dispatcher::Dispatcher;
use crate::identifiers::RoomId;
use crate::protocol::{Decompressor, Event, EventKind, Frame};

use super::state::{CloseReason, ConnectionState};

// ============================================================================
// Constants
// ============================================================================

/// Raw bodies this short are popularity noise and only logged at trace.
const RAW_LOG_MIN_LEN: usize = 5;

// ============================================================================
// Receiver
// ============================================================================

/// Read side of one connection.
pub(crate) struct Receiver {
    pub room_id: RoomId,
    pub state: ConnectionState,
    pub decompressor: Decompressor,
    pub dispatcher: Dispatcher,
}

impl Receiver {
    /// Runs the receive loop until the connection stops.
    pub(crate) async fn run<S>(self, mut stream: S)
    where
        S: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        let mut messages: u64 = 0;

        while !self.state.should_stop() {
            let message = tokio::select! {
                () = self.state.cancelled() => break,
                message = stream.next() => message,
            };

            match message {
                Some(Ok(Message::Binary(data))) => {
                    messages += 1;
                    self.handle_binary(&data).await;
                }

                Some(Ok(Message::Close(frame))) => {
                    info!(room_id = %self.room_id, ?frame, "Socket closed by server");
                    self.state.mark_dead(CloseReason::ClosedByPeer);
                    break;
                }

                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    trace!("Control frame received");
                }

                Some(Ok(other)) => {
                    warn!(
                        room_id = %self.room_id,
                        len = other.len(),
                        "Ignoring non-binary message"
                    );
                }

                Some(Err(e)) => {
                    error!(room_id = %self.room_id, error = %e, "Socket read failed");
                    self.state.mark_dead(CloseReason::ReadFailed);
                    break;
                }

                None => {
                    error!(room_id = %self.room_id, "Socket stream ended");
                    self.state.mark_dead(CloseReason::StreamEnded);
                    break;
                }
            }
        }

        self.state.mark_dead(CloseReason::Shutdown);
        debug!(room_id = %self.room_id, messages, "Receive loop stopped");
    }

    /// Decodes, expands and dispatches one binary message.
    async fn handle_binary(&self, data: &[u8]) {
        let frame = match Frame::decode(data) {
            Ok(frame) => frame,
            Err(e) => {
                error!(room_id = %self.room_id, error = %e, "Dropping undecodable message");
                return;
            }
        };

        for leaf in self.decompressor.expand(frame) {
            let event = Event::new(self.room_id, leaf);
            log_event(&event);
            self.dispatcher.dispatch(event).await;
        }
    }
}

/// Advisory logging of a leaf frame's classification.
fn log_event(event: &Event) {
    let body = String::from_utf8_lossy(&event.frame.body);
    trace!(room_id = %event.room_id, %body, "Frame received");

    match event.kind() {
        EventKind::Control { code } => debug!(code, "Control message"),
        EventKind::Notification { cmd } => debug!(%cmd, "Notification"),
        EventKind::Popularity { count } => debug!(count, "Popularity"),
        EventKind::Raw if event.frame.body.len() >= RAW_LOG_MIN_LEN => {
            debug!(%body, "Unclassified frame");
        }
        EventKind::Raw => {}
    }
}

// ============================================================================
// Tests
// ============================================================================
