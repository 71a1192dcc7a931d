//! Error types for the danmaku client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use danmaku_client::{Client, Result, RoomId, UserId};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     let session = client.connect(UserId::new(0), RoomId::new(21452505)).await?;
//!     session.closed().await;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Establishment | [`Error::MetadataUnavailable`], [`Error::TokenMissing`], [`Error::DialFailed`], [`Error::HandshakeFailed`] |
//! | Protocol | [`Error::Framing`], [`Error::Decompression`] |
//! | External | [`Error::Json`], [`Error::Url`] |
//!
//! Only establishment errors ever reach a caller of
//! [`Client::connect`](crate::Client::connect). Protocol errors are logged
//! and the offending frame is dropped inside the receive loop.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::RoomId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Establishment Errors
    // ========================================================================
    /// Room metadata could not be fetched or parsed.
    ///
    /// Terminal for the current connection attempt.
    #[error("Room metadata unavailable: {message}")]
    MetadataUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// Room metadata carried no auth token.
    #[error("Auth token missing for room {room_id}")]
    TokenMissing {
        /// Room the metadata was fetched for.
        room_id: RoomId,
    },

    /// WebSocket dial failed.
    #[error("Failed to dial {url}: {message}")]
    DialFailed {
        /// URL that was dialed.
        url: String,
        /// Transport error description.
        message: String,
    },

    /// Writing the room-enter handshake failed.
    #[error("Handshake failed: {message}")]
    HandshakeFailed {
        /// Transport error description.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Frame could not be sliced from the buffer.
    #[error("Framing error: {message}")]
    Framing {
        /// Description of the framing violation.
        message: String,
    },

    /// Compressed envelope could not be inflated.
    #[error("{codec} decompression failed: {message}")]
    Decompression {
        /// Codec name.
        codec: &'static str,
        /// Decoder error description.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a metadata unavailable error.
    #[inline]
    pub fn metadata_unavailable(message: impl Into<String>) -> Self {
        Self::MetadataUnavailable {
            message: message.into(),
        }
    }

    /// Creates a token missing error.
    #[inline]
    pub fn token_missing(room_id: RoomId) -> Self {
        Self::TokenMissing { room_id }
    }

    /// Creates a dial failed error.
    #[inline]
    pub fn dial_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DialFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a handshake failed error.
    #[inline]
    pub fn handshake_failed(message: impl Into<String>) -> Self {
        Self::HandshakeFailed {
            message: message.into(),
        }
    }

    /// Creates a framing error.
    #[inline]
    pub fn framing(message: impl Into<String>) -> Self {
        Self::Framing {
            message: message.into(),
        }
    }

    /// Creates a decompression error.
    #[inline]
    pub fn decompression(codec: &'static str, message: impl Into<String>) -> Self {
        Self::Decompression {
            codec,
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error aborted connection establishment.
    ///
    /// These are the only errors [`Client::connect`](crate::Client::connect)
    /// returns; the caller decides whether to try again.
    #[inline]
    #[must_use]
    pub fn is_establishment_error(&self) -> bool {
        matches!(
            self,
            Self::MetadataUnavailable { .. }
                | Self::TokenMissing { .. }
                | Self::DialFailed { .. }
                | Self::HandshakeFailed { .. }
        )
    }

    /// Returns `true` if this is a wire protocol error.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Framing { .. } | Self::Decompression { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::dial_failed("wss://example.com/sub", "refused");
        assert_eq!(
            err.to_string(),
            "Failed to dial wss://example.com/sub: refused"
        );
    }

    #[test]
    fn test_token_missing_display() {
        let err = Error::token_missing(RoomId::new(456));
        assert_eq!(err.to_string(), "Auth token missing for room 456");
    }

    #[test]
    fn test_decompression_display() {
        let err = Error::decompression("zlib", "corrupt deflate stream");
        assert_eq!(
            err.to_string(),
            "zlib decompression failed: corrupt deflate stream"
        );
    }

    #[test]
    fn test_is_establishment_error() {
        assert!(Error::metadata_unavailable("x").is_establishment_error());
        assert!(Error::token_missing(RoomId::new(1)).is_establishment_error());
        assert!(Error::dial_failed("u", "x").is_establishment_error());
        assert!(Error::handshake_failed("x").is_establishment_error());
        assert!(!Error::framing("x").is_establishment_error());
        assert!(!Error::config("x").is_establishment_error());
    }

    #[test]
    fn test_is_protocol_error() {
        assert!(Error::framing("short").is_protocol_error());
        assert!(Error::decompression("brotli", "bad").is_protocol_error());
        assert!(!Error::handshake_failed("x").is_protocol_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::Url(_)));
        assert!(!err.is_establishment_error());
    }
}
