//! Room-enter handshake.
//!
//! The first message on a fresh socket is a plain `RoomEnter` frame whose
//! body is a JSON document identifying the subscriber, the room and the
//! auth token from the room metadata.
//!
//! # Format
//!
//! ```json
//! {
//!   "uid": 0,
//!   "roomid": 21452505,
//!   "protover": 2,
//!   "platform": "web",
//!   "clientver": "1.14.3",
//!   "type": 2,
//!   "key": "token"
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifiers::{RoomId, UserId};

use super::frame::{Frame, Operation};

// ============================================================================
// Constants
// ============================================================================

/// Envelope version requested from the server.
pub const HANDSHAKE_PROTOCOL_VERSION: u16 = 2;

/// Platform string the server expects.
pub const HANDSHAKE_PLATFORM: &str = "web";

/// Handshake type the server expects.
pub const HANDSHAKE_TYPE: u8 = 2;

/// Client version reported when none is configured.
pub const DEFAULT_CLIENT_VERSION: &str = "1.14.3";

// ============================================================================
// HandshakePayload
// ============================================================================

/// Body of the `RoomEnter` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakePayload {
    /// Subscriber id.
    pub uid: UserId,
    /// Room to join.
    #[serde(rename = "roomid")]
    pub room_id: RoomId,
    /// Requested envelope version (always 2).
    #[serde(rename = "protover")]
    pub protocol_version: u16,
    /// Client platform (always "web").
    pub platform: String,
    /// Reported client version.
    #[serde(rename = "clientver")]
    pub client_version: String,
    /// Handshake type (always 2).
    #[serde(rename = "type")]
    pub handshake_type: u8,
    /// Auth token from the room metadata.
    pub key: String,
}

impl HandshakePayload {
    /// Creates a payload with the protocol's fixed fields filled in.
    #[must_use]
    pub fn new(
        uid: UserId,
        room_id: RoomId,
        token: impl Into<String>,
        client_version: impl Into<String>,
    ) -> Self {
        Self {
            uid,
            room_id,
            protocol_version: HANDSHAKE_PROTOCOL_VERSION,
            platform: HANDSHAKE_PLATFORM.to_string(),
            client_version: client_version.into(),
            handshake_type: HANDSHAKE_TYPE,
            key: token.into(),
        }
    }

    /// Wraps the payload in a plain `RoomEnter` frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_frame(&self) -> Result<Frame> {
        let body = serde_json::to_vec(self)?;
        Ok(Frame::plain(Operation::RoomEnter, body))
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Encodes the room-enter frame for a subscriber, room and token.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
pub fn room_enter(
    uid: UserId,
    room_id: RoomId,
    token: &str,
    client_version: &str,
) -> Result<Vec<u8>> {
    let frame = HandshakePayload::new(uid, room_id, token, client_version).to_frame()?;
    Ok(frame.to_bytes())
}

// ============================================================================
// Tests
// ============================================================================
