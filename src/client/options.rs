//! Client connection options.
//!
//! Plain data describing how connections are made: heartbeat cadence,
//! handshake client version, metadata API base, socket address layout and
//! the event queue. [`ClientBuilder`](super::ClientBuilder) forwards its
//! settings here.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use danmaku_client::ClientOptions;
//!
//! let options = ClientOptions::new()
//!     .with_heartbeat_interval(Duration::from_secs(20))
//!     .with_queue_capacity(4096);
//!
//! assert!(options.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::dispatcher::{DEFAULT_QUEUE_CAPACITY, OverflowPolicy};
use crate::error::{Error, Result};
use crate::protocol::handshake::DEFAULT_CLIENT_VERSION;
use crate::room::DEFAULT_API_BASE;
use crate::transport::DEFAULT_HEARTBEAT_INTERVAL;

// ============================================================================
// Constants
// ============================================================================

/// Default socket scheme.
pub const DEFAULT_SOCKET_SCHEME: &str = "wss";

/// Default socket path on the ingest host.
pub const DEFAULT_SOCKET_PATH: &str = "/sub";

// ============================================================================
// ClientOptions
// ============================================================================

/// Connection configuration shared by every session of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Time between two heartbeats.
    pub heartbeat_interval: Duration,

    /// Version string sent as `clientver` in the handshake.
    pub client_version: String,

    /// Base URL of the room metadata API.
    pub api_base: String,

    /// Socket scheme, `wss` in production.
    pub socket_scheme: String,

    /// Socket path on the ingest host.
    pub socket_path: String,

    /// Events buffered between the receive loop and the handler.
    pub queue_capacity: usize,

    /// Behavior when the event queue is full.
    pub overflow_policy: OverflowPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options with production defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            socket_scheme: DEFAULT_SOCKET_SCHEME.to_string(),
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the heartbeat interval.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the handshake client version.
    #[inline]
    #[must_use]
    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    /// Sets the metadata API base URL.
    #[inline]
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Sets the socket scheme.
    #[inline]
    #[must_use]
    pub fn with_socket_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.socket_scheme = scheme.into();
        self
    }

    /// Sets the socket path.
    #[inline]
    #[must_use]
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Sets the event queue capacity.
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the overflow policy.
    #[inline]
    #[must_use]
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl ClientOptions {
    /// Builds the socket URL for an ingest host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the result is not a valid URL.
    pub fn socket_url(&self, host: &str) -> Result<Url> {
        let url = format!("{}://{}{}", self.socket_scheme, host, self.socket_path);
        Url::parse(&url).map_err(Error::from)
    }

    /// Validates the options configuration.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.heartbeat_interval.is_zero() {
            return Err("Heartbeat interval must be greater than zero".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("Event queue capacity must be greater than zero".to_string());
        }
        if let OverflowPolicy::Wait(limit) = self.overflow_policy
            && limit.is_zero()
        {
            return Err("Overflow wait must be greater than zero".to_string());
        }
        if !self.socket_path.starts_with('/') {
            return Err(format!(
                "Socket path must start with '/': {}",
                self.socket_path
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
