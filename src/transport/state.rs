//! Per-connection liveness.
//!
//! Both connection loops share one [`ConnectionState`]. It combines the
//! liveness flag with a cancellation token: the first loop to fail flips
//! the flag and cancels the token, which wakes the other loop out of its
//! timer or socket read. The token is a child of the client's reload
//! token, so a configuration reload stops every live connection the same
//! way.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::info;

// ============================================================================
// CloseReason
// ============================================================================

/// Why a connection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Writing a heartbeat failed.
    HeartbeatFailed,
    /// Reading from the socket failed.
    ReadFailed,
    /// The socket stream ended without a close frame.
    StreamEnded,
    /// The server sent a close frame.
    ClosedByPeer,
    /// Shutdown or configuration reload was requested.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::HeartbeatFailed => "heartbeat write failed",
            Self::ReadFailed => "socket read failed",
            Self::StreamEnded => "socket stream ended",
            Self::ClosedByPeer => "closed by server",
            Self::Shutdown => "shutdown requested",
        };
        f.write_str(text)
    }
}

// ============================================================================
// ConnectionState
// ============================================================================

struct StateInner {
    alive: AtomicBool,
    reason: OnceLock<CloseReason>,
    token: CancellationToken,
}

/// Liveness shared by the heartbeat and receive loops of one connection.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Clone)]
pub struct ConnectionState {
    inner: Arc<StateInner>,
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionState")
            .field("alive", &self.is_alive())
            .field("reason", &self.close_reason())
            .finish()
    }
}

impl ConnectionState {
    /// Creates a disconnected state whose cancellation follows `parent`.
    #[must_use]
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            inner: Arc::new(StateInner {
                alive: AtomicBool::new(false),
                reason: OnceLock::new(),
                token: parent.child_token(),
            }),
        }
    }

    /// Marks the connection usable. Called once the handshake is written.
    #[inline]
    pub fn mark_alive(&self) {
        self.inner.alive.store(true, Ordering::Release);
    }

    /// Marks the connection dead and wakes every loop.
    ///
    /// Returns `true` only for the call that performed the transition; its
    /// reason is the one [`close_reason`](Self::close_reason) reports.
    pub fn mark_dead(&self, reason: CloseReason) -> bool {
        let was_alive = self.inner.alive.swap(false, Ordering::AcqRel);
        if was_alive {
            let _ = self.inner.reason.set(reason);
            info!(%reason, "Connection marked dead");
        }
        self.inner.token.cancel();
        was_alive
    }

    /// Requests a cooperative shutdown of both loops.
    #[inline]
    pub fn shutdown(&self) {
        self.inner.token.cancel();
    }

    /// Returns `true` while the connection is usable.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    /// Returns `true` if the loops should stop at their next check.
    #[inline]
    #[must_use]
    pub fn should_stop(&self) -> bool {
        !self.is_alive() || self.inner.token.is_cancelled()
    }

    /// Returns the reason recorded by the alive-to-dead transition.
    #[inline]
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.inner.reason.get().copied()
    }

    /// Completes once the connection is dead or shutdown was requested.
    #[inline]
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.token.cancelled()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disconnected() {
        let state = ConnectionState::new(&CancellationToken::new());
        assert!(!state.is_alive());
        assert!(state.should_stop());
        assert_eq!(state.close_reason(), None);
    }

    #[test]
    fn test_mark_dead_transitions_once() {
        let state = ConnectionState::new(&CancellationToken::new());
        state.mark_alive();
        assert!(!state.should_stop());

        assert!(state.mark_dead(CloseReason::HeartbeatFailed));
        assert!(!state.mark_dead(CloseReason::ReadFailed));

        assert!(!state.is_alive());
        assert_eq!(state.close_reason(), Some(CloseReason::HeartbeatFailed));
    }

    #[test]
    fn test_clones_share_state() {
        let state = ConnectionState::new(&CancellationToken::new());
        let other = state.clone();
        state.mark_alive();
        assert!(other.is_alive());

        other.mark_dead(CloseReason::StreamEnded);
        assert!(!state.is_alive());
    }

    #[test]
    fn test_parent_cancellation_stops_loops() {
        let parent = CancellationToken::new();
        let state = ConnectionState::new(&parent);
        state.mark_alive();

        parent.cancel();
        assert!(state.is_alive());
        assert!(state.should_stop());
    }

    #[test]
    fn test_shutdown_does_not_cancel_parent() {
        let parent = CancellationToken::new();
        let state = ConnectionState::new(&parent);
        state.shutdown();
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_mark_dead() {
        let state = ConnectionState::new(&CancellationToken::new());
        state.mark_alive();

        let waiter = state.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        state.mark_dead(CloseReason::ClosedByPeer);
        handle.await.unwrap();
    }
}
