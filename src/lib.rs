//! Danmaku client - live-room event stream over WebSocket.
//!
//! This library connects to a live-streaming platform's real-time event
//! service, keeps the connection alive and delivers every decoded
//! notification to a user callback.
//!
//! # Architecture
//!
//! Each connection runs two loops over one socket:
//!
//! - **Heartbeat**: writes a heartbeat frame on a fixed interval
//! - **Receiver**: decodes binary frames, unwraps compressed envelopes and
//!   hands leaf frames to the event queue
//!
//! Key design principles:
//!
//! - The first loop to fail marks the connection dead and wakes the other
//! - Bad frames are logged and skipped; only transport failures are fatal
//! - Events reach the handler through a bounded queue, never blocking reads
//! - Reconnecting is the caller's decision, not the library's
//!
//! # Quick Start
//!
//! ```no_run
//! use danmaku_client::{Client, EventKind, Result, RoomId, UserId};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .on_event(|event| match event.kind() {
//!             EventKind::Notification { cmd } => println!("{cmd}"),
//!             EventKind::Popularity { count } => println!("popularity {count}"),
//!             _ => {}
//!         })
//!         .build()?;
//!
//!     let session = client.connect(UserId::new(0), RoomId::new(21452505)).await?;
//!     session.closed().await;
//!     println!("closed: {:?}", session.close_reason());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client factory and configuration |
//! | [`dispatcher`] | Bounded event queue and consumer task |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Frame codec, compression and event classification |
//! | [`room`] | Room metadata lookup |
//! | [`transport`] | Socket loops and session handle |

// ============================================================================
// Modules
// ============================================================================

/// Client factory and configuration.
///
/// Use [`Client::builder()`] to create a configured client instance.
pub mod client;

/// Event queue between the receive loop and the handler.
pub mod dispatcher;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for users and rooms.
pub mod identifiers;

/// Wire protocol: frames, envelopes, handshake and events.
pub mod protocol;

/// Room metadata lookup.
pub mod room;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder, ClientOptions};

// Dispatch types
pub use dispatcher::{EventHandler, OverflowPolicy};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RoomId, UserId};

// Protocol types
pub use protocol::{Event, EventKind, Frame, Operation, ProtocolVersion};

// Room metadata types
pub use room::{HttpRoomInfoProvider, RoomInfo, RoomInfoProvider};

// Transport types
pub use transport::{CloseReason, ConnectionState, Session};
