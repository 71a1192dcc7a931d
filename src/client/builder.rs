//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use danmaku_client::Client;
//!
//! # fn example() -> danmaku_client::Result<()> {
//! let client = Client::builder()
//!     .on_event(|event| println!("{:?}", event.cmd()))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::dispatcher::{EventHandler, OverflowPolicy};
use crate::error::{Error, Result};
use crate::protocol::Event;
use crate::room::{HttpRoomInfoProvider, RoomInfoProvider};

use super::core::Client;
use super::options::ClientOptions;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ClientBuilder {
    /// Connection options.
    options: ClientOptions,
    /// Metadata source; the HTTP API when unset.
    provider: Option<Arc<dyn RoomInfoProvider>>,
    /// Event consumer.
    handler: Option<EventHandler>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("options", &self.options)
            .field("custom_provider", &self.provider.is_some())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the time between two heartbeats.
    #[inline]
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.options.heartbeat_interval = interval;
        self
    }

    /// Sets the `clientver` string sent in the handshake.
    #[inline]
    #[must_use]
    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.options.client_version = version.into();
        self
    }

    /// Sets the metadata API base URL.
    ///
    /// Ignored when a custom provider is set.
    #[inline]
    #[must_use]
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.options.api_base = base.into();
        self
    }

    /// Sets the socket scheme (`wss` or `ws`).
    #[inline]
    #[must_use]
    pub fn socket_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.options.socket_scheme = scheme.into();
        self
    }

    /// Sets the socket path on the ingest host.
    #[inline]
    #[must_use]
    pub fn socket_path(mut self, path: impl Into<String>) -> Self {
        self.options.socket_path = path.into();
        self
    }

    /// Sets the event queue capacity.
    #[inline]
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.options.queue_capacity = capacity;
        self
    }

    /// Sets what happens to events when the queue is full.
    #[inline]
    #[must_use]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.options.overflow_policy = policy;
        self
    }

    /// Sets a custom room metadata source.
    #[inline]
    #[must_use]
    pub fn room_info_provider(mut self, provider: impl RoomInfoProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Sets the event handler.
    ///
    /// Called once per leaf frame, in receive order, on the consumer task.
    #[inline]
    #[must_use]
    pub fn on_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no handler is set or the options are invalid
    /// - [`Error::Url`] if the API base URL is invalid
    pub fn build(self) -> Result<Client> {
        let handler = self.handler.ok_or_else(|| {
            Error::config(
                "Event handler is required. Use .on_event() to set it.\n\
                 Example: Client::builder().on_event(|event| println!(\"{event:?}\"))",
            )
        })?;

        self.options.validate().map_err(Error::config)?;

        let provider = match self.provider {
            Some(provider) => provider,
            None => Arc::new(HttpRoomInfoProvider::new(&self.options.api_base)?),
        };

        Ok(Client::new(self.options, provider, handler))
    }
}

// ============================================================================
// Tests
// ============================================================================
