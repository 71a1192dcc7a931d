//! Wire protocol types.
//!
//! This module defines the binary frame format spoken over the room
//! socket and the transformations applied to inbound frames.
//!
//! # Protocol Overview
//!
//! | Operation | Code | Direction | Body |
//! |-----------|------|-----------|------|
//! | `HeartBeat` | 2 | Client → Server | empty |
//! | `HeartBeatResponse` | 3 | Server → Client | popularity count |
//! | `Notification` | 5 | Server → Client | JSON event or envelope |
//! | `RoomEnter` | 7 | Client → Server | JSON handshake |
//! | `RoomEnterResponse` | 8 | Server → Client | JSON status |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Frame header encoding and decoding |
//! | `codec` | Envelope decompression and slicing |
//! | `handshake` | Room-enter payload |
//! | `event` | Leaf frame classification |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope decompression.
pub mod codec;

/// Decoded events.
pub mod event;

/// Binary frame format.
pub mod frame;

/// Room-enter handshake.
pub mod handshake;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{Codec, Decompressor, slice_envelope};
pub use event::{Event, EventKind};
pub use frame::{Frame, Operation, ProtocolVersion, encode};
pub use handshake::{HandshakePayload, room_enter};
