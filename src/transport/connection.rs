//! Connection establishment and the session handle.
//!
//! [`connect`] runs the four establishment steps in order:
//!
//! 1. Fetch room metadata (ingest hosts + auth token)
//! 2. Dial `wss://{host}/sub`
//! 3. Write the room-enter handshake
//! 4. Mark the connection alive and spawn the heartbeat and receive loops
//!
//! A failure in steps 1-3 is returned to the caller and nothing is
//! spawned. After step 4 failures are only visible through the
//! [`Session`]'s liveness state and the logs; reconnecting is the
//! caller's job.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::{BoxFuture, Shared};
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info};
use uuid::Uuid;

use crate::client::ClientInner;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::identifiers::{RoomId, UserId};
use crate::protocol::handshake;

use super::heartbeat;
use super::receiver::Receiver;
use super::state::{CloseReason, ConnectionState};

// ============================================================================
// Connect
// ============================================================================

/// Establishes a connection to a room's event stream.
///
/// # Errors
///
/// - [`Error::MetadataUnavailable`] / [`Error::TokenMissing`] from the
///   metadata lookup
/// - [`Error::DialFailed`] if the ingest host is not a valid socket address
///   or the socket cannot be opened
/// - [`Error::HandshakeFailed`] if the handshake cannot be written
pub(crate) async fn connect(client: &ClientInner, uid: UserId, room_id: RoomId) -> Result<Session> {
    let options = &client.options;

    let info = client.provider.room_info(room_id).await.inspect_err(|e| {
        error!(%room_id, error = %e, "Room metadata unavailable");
    })?;

    let url = options.socket_url(&info.primary_host).map_err(|e| {
        error!(%room_id, host = %info.primary_host, error = %e, "Invalid ingest host");
        Error::dial_failed(info.primary_host.as_str(), e.to_string())
    })?;
    let (ws_stream, _) = connect_async(url.as_str()).await.map_err(|e| {
        error!(%room_id, %url, error = %e, "Failed to establish WebSocket connection");
        Error::dial_failed(url.as_str(), e.to_string())
    })?;

    let (mut ws_write, ws_read) = ws_stream.split();

    let enter = handshake::room_enter(uid, room_id, &info.token, &options.client_version)?;
    ws_write
        .send(Message::Binary(enter.into()))
        .await
        .map_err(|e| {
            error!(%room_id, error = %e, "Cannot enter room");
            Error::handshake_failed(e.to_string())
        })?;

    let state = ConnectionState::new(&client.reload_token());
    state.mark_alive();

    let (dispatcher, consumer) = Dispatcher::spawn(
        Arc::clone(&client.handler),
        options.queue_capacity,
        options.overflow_policy,
    );

    let heartbeat = tokio::spawn(heartbeat::run(
        ws_write,
        state.clone(),
        options.heartbeat_interval,
    ));

    let dropped = dispatcher.drop_counter();
    let receiver = Receiver {
        room_id,
        state: state.clone(),
        decompressor: client.decompressor.clone(),
        dispatcher,
    };
    let receive = tokio::spawn(receiver.run(ws_read));

    let session = Session {
        inner: Arc::new(SessionInner {
            id: Uuid::new_v4(),
            uid,
            room_id,
            host: info.primary_host,
            state,
            dropped,
            finished: join_all_tasks(vec![heartbeat, receive, consumer]),
        }),
    };

    info!(
        session_id = %session.id(),
        %uid,
        %room_id,
        host = %session.host(),
        "Entered room"
    );

    Ok(session)
}

// ============================================================================
// Session
// ============================================================================

struct SessionInner {
    id: Uuid,
    uid: UserId,
    room_id: RoomId,
    host: String,
    state: ConnectionState,
    dropped: Arc<AtomicU64>,
    finished: Shared<BoxFuture<'static, ()>>,
}

/// Completes once every task has finished, for any number of waiters.
fn join_all_tasks(tasks: Vec<JoinHandle<()>>) -> Shared<BoxFuture<'static, ()>> {
    async move {
        for task in tasks {
            let _ = task.await;
        }
    }
    .boxed()
    .shared()
}

/// Handle to one established room connection.
///
/// Cloning is cheap. Dropping every clone does not stop the connection;
/// call [`shutdown`](Self::shutdown) or [`Client::reload`](crate::Client::reload).
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("room_id", &self.inner.room_id)
            .field("host", &self.inner.host)
            .field("state", &self.inner.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Returns the unique id of this connection, used in logs.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Returns the subscriber id used in the handshake.
    #[inline]
    #[must_use]
    pub fn uid(&self) -> UserId {
        self.inner.uid
    }

    /// Returns the room this session is connected to.
    #[inline]
    #[must_use]
    pub fn room_id(&self) -> RoomId {
        self.inner.room_id
    }

    /// Returns the ingest host that was dialed.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Returns `true` while the connection is usable.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.state.is_alive()
    }

    /// Returns why the connection stopped, once it has.
    #[inline]
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.inner.state.close_reason()
    }

    /// Returns the shared liveness state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.inner.state
    }

    /// Returns the number of events dropped because the queue was full.
    #[inline]
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Asks both loops to stop.
    ///
    /// Returns immediately; await [`closed`](Self::closed) to wait for the
    /// loops to finish.
    pub fn shutdown(&self) {
        self.inner.state.shutdown();
    }

    /// Waits until the connection is dead and its tasks have finished.
    ///
    /// Queued events are delivered to the handler before this returns,
    /// for every caller.
    pub async fn closed(&self) {
        self.inner.state.cancelled().await;
        self.inner.finished.clone().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
