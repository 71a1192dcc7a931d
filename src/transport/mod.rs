//! WebSocket transport layer.
//!
//! This module owns one socket per room connection and the two loops that
//! drive it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session (Rust) │         WebSocket            │  Ingest host    │
//! │                 │      wss://{host}/sub        │                 │
//! │  heartbeat ─────┼─────────────────────────────►│                 │
//! │  receiver  ◄────┼──────────────────────────────│  event stream   │
//! │     │           │                              │                 │
//! │     ▼           │                              └─────────────────┘
//! │  Dispatcher ──► handler
//! └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `RoomInfoProvider::room_info` - Resolve ingest host and token
//! 2. `connect_async` - Dial the socket
//! 3. Write the room-enter frame
//! 4. Spawn the heartbeat and receive loops
//! 5. First failure marks the [`ConnectionState`] dead and stops both loops
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Establishment and the [`Session`] handle |
//! | `heartbeat` | Periodic heartbeat writer |
//! | `receiver` | Frame reader and dispatch |
//! | `state` | Shared liveness and cancellation |

// ============================================================================
// Submodules
// ============================================================================

/// Connection establishment and session handle.
pub mod connection;

/// Heartbeat loop.
pub mod heartbeat;

/// Receive loop.
pub(crate) mod receiver;

/// Per-connection liveness.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::Session;
pub use heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
pub use state::{CloseReason, ConnectionState};
