//! Heartbeat loop.
//!
//! Owns the write half of the socket. Every interval it writes a
//! zero-body heartbeat frame; the server never has to answer for the
//! connection to count as alive, only the write itself is checked.
//!
//! # States
//!
//! ```text
//! Running ──(write error)────────────► Stopped  (marks connection dead)
//!    │
//!    └─────(dead / shutdown / reload)─► Stopped
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{Sink, SinkExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, trace};

use crate::protocol::Frame;

use super::state::{CloseReason, ConnectionState};

// ============================================================================
// Constants
// ============================================================================

/// Default time between two heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// Loop
// ============================================================================

/// Runs the heartbeat loop until the connection stops.
pub(crate) async fn run<S>(mut sink: S, state: ConnectionState, interval: Duration)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let heartbeat = Frame::heartbeat().to_bytes();
    let mut sent: u64 = 0;

    while !state.should_stop() {
        tokio::select! {
            () = state.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }

        if let Err(e) = sink.send(Message::Binary(heartbeat.clone().into())).await {
            error!(error = %e, sent, "Heartbeat write failed");
            state.mark_dead(CloseReason::HeartbeatFailed);
            break;
        }

        sent += 1;
        trace!(sent, "Heartbeat sent");
    }

    state.mark_dead(CloseReason::Shutdown);
    let _ = sink.close().await;
    debug!(sent, "Heartbeat loop stopped");
}

// ============================================================================
// Tests
// ============================================================================
