//! Client entry point.
//!
//! A [`Client`] holds everything sessions share: options, the metadata
//! provider, the event handler, the codec registry and the reload token.
//! Each [`connect`](Client::connect) produces an independent [`Session`].
//!
//! # Example
//!
//! ```no_run
//! use danmaku_client::{Client, RoomId, UserId};
//!
//! # async fn example() -> danmaku_client::Result<()> {
//! let client = Client::builder()
//!     .on_event(|event| {
//!         if let Some(cmd) = event.cmd() {
//!             println!("{cmd}");
//!         }
//!     })
//!     .build()?;
//!
//! let session = client.connect(UserId::new(0), RoomId::new(21452505)).await?;
//! session.closed().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::dispatcher::EventHandler;
use crate::error::Result;
use crate::identifiers::{RoomId, UserId};
use crate::protocol::Decompressor;
use crate::room::RoomInfoProvider;
use crate::transport::{Session, connection};

use super::builder::ClientBuilder;
use super::options::ClientOptions;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
pub(crate) struct ClientInner {
    /// Connection options.
    pub options: ClientOptions,

    /// Room metadata source.
    pub provider: Arc<dyn RoomInfoProvider>,

    /// Event consumer shared by all sessions.
    pub handler: EventHandler,

    /// Codec registry.
    pub decompressor: Decompressor,

    /// Parent of every session's cancellation token.
    reload: Mutex<CancellationToken>,
}

impl ClientInner {
    /// Returns the current reload token.
    pub(crate) fn reload_token(&self) -> CancellationToken {
        self.reload.lock().clone()
    }
}

// ============================================================================
// Client
// ============================================================================

/// Live-room event client.
///
/// Cloning is cheap; clones share options, handler and reload token.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

// ============================================================================
// Client - Display
// ============================================================================

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.inner.options)
            .field("decompressor", &self.inner.decompressor)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Public API
// ============================================================================

impl Client {
    pub(crate) fn new(
        options: ClientOptions,
        provider: Arc<dyn RoomInfoProvider>,
        handler: EventHandler,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                options,
                provider,
                handler,
                decompressor: Decompressor::new(),
                reload: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the client's options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Connects to a room and starts delivering its events.
    ///
    /// `uid` is the subscriber id sent in the handshake; `0` connects
    /// anonymously.
    ///
    /// # Errors
    ///
    /// - [`Error::MetadataUnavailable`](crate::Error::MetadataUnavailable) if
    ///   the metadata lookup fails
    /// - [`Error::TokenMissing`](crate::Error::TokenMissing) if no auth token
    ///   was returned
    /// - [`Error::DialFailed`](crate::Error::DialFailed) if the socket cannot
    ///   be opened
    /// - [`Error::HandshakeFailed`](crate::Error::HandshakeFailed) if the
    ///   handshake cannot be written
    pub async fn connect(&self, uid: UserId, room_id: RoomId) -> Result<Session> {
        connection::connect(&self.inner, uid, room_id).await
    }

    /// Stops every session opened so far.
    ///
    /// Sessions opened after this call are unaffected.
    pub fn reload(&self) {
        let previous = mem::replace(&mut *self.inner.reload.lock(), CancellationToken::new());
        previous.cancel();
        info!("Reload requested, stopping live sessions");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::{Codec, ProtocolVersion};

    fn client() -> Client {
        Client::builder().on_event(|_event| {}).build().unwrap()
    }

    #[test]
    fn test_builder_returns_builder() {
        let _builder: ClientBuilder = Client::builder();
    }

    #[test]
    fn test_registers_default_codecs() {
        let client = client();
        assert_eq!(
            client.inner.decompressor.codec_for(ProtocolVersion::Brotli),
            Some(Codec::Brotli)
        );
    }

    #[test]
    fn test_reload_cancels_previous_token() {
        let client = client();
        let before = client.inner.reload_token();

        client.reload();

        assert!(before.is_cancelled());
        assert!(!client.inner.reload_token().is_cancelled());
    }

    #[test]
    fn test_clones_share_reload() {
        let client = client();
        let clone = client.clone();
        let before = clone.inner.reload_token();

        client.reload();
        assert!(before.is_cancelled());
    }

    #[test]
    fn test_debug_omits_handler() {
        let output = format!("{:?}", client());
        assert!(output.contains("Client"));
        assert!(output.contains("options"));
    }
}
