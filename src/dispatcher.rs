//! Event hand-off to the consumer.
//!
//! The receive loop must never wait on the consumer, so events go through
//! a bounded queue drained by a dedicated consumer task. The queue bound
//! and what happens when it is full are explicit:
//!
//! | Policy | Full queue |
//! |--------|------------|
//! | [`OverflowPolicy::DropNewest`] | the incoming event is dropped immediately |
//! | [`OverflowPolicy::Wait`] | the receive loop waits up to the timeout, then drops |
//!
//! Dropped events are counted and logged.
//!
//! The consumer task calls the [`EventHandler`] once per event, in receive
//! order. Handlers should return quickly; slow work belongs on the
//! handler's own task.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::protocol::Event;

// ============================================================================
// Constants
// ============================================================================

/// Default number of events buffered between the loops and the consumer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Drops between two overflow warnings.
const DROP_WARN_EVERY: u64 = 100;

// ============================================================================
// Types
// ============================================================================

/// Event consumer callback.
///
/// Called on the consumer task for each decoded leaf frame.
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

/// What to do with an event when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the incoming event without waiting.
    #[default]
    DropNewest,
    /// Wait up to the given duration for space, then drop.
    Wait(Duration),
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Sending half of the event queue.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Event>,
    policy: OverflowPolicy,
    dropped: Arc<AtomicU64>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("policy", &self.policy)
            .field("capacity", &self.tx.max_capacity())
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl Dispatcher {
    /// Creates the queue and spawns its consumer task.
    ///
    /// The consumer task ends once every [`Dispatcher`] clone is dropped
    /// and the queue is drained.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. [`ClientBuilder`](crate::ClientBuilder)
    /// rejects that configuration before it gets here.
    pub fn spawn(
        handler: EventHandler,
        capacity: usize,
        policy: OverflowPolicy,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Event>(capacity);

        let consumer = tokio::spawn(async move {
            let mut delivered: u64 = 0;
            while let Some(event) = rx.recv().await {
                handler(event);
                delivered += 1;
            }
            debug!(delivered, "Event consumer finished");
        });

        let dispatcher = Self {
            tx,
            policy,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (dispatcher, consumer)
    }

    /// Queues an event for the consumer.
    ///
    /// Returns `false` if the event was dropped.
    pub async fn dispatch(&self, event: Event) -> bool {
        match self.policy {
            OverflowPolicy::DropNewest => match self.tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.record_drop();
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Event consumer gone, discarding event");
                    false
                }
            },
            OverflowPolicy::Wait(limit) => match timeout(limit, self.tx.send(event)).await {
                Ok(Ok(())) => true,
                Ok(Err(_)) => {
                    debug!("Event consumer gone, discarding event");
                    false
                }
                Err(_) => {
                    self.record_drop();
                    false
                }
            },
        }
    }

    /// Returns the number of events dropped on overflow.
    #[inline]
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the shared drop counter, so the count outlives the sender.
    pub(crate) fn drop_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    fn record_drop(&self) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if total == 1 || total % DROP_WARN_EVERY == 0 {
            warn!(
                dropped = total,
                capacity = self.tx.max_capacity(),
                "Event queue full, dropping events"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
