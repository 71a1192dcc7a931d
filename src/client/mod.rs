//! Client configuration and entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Opens sessions, owns shared state |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ClientOptions`] | Connection options |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

/// Connection options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use core::Client;
pub use options::ClientOptions;

pub(crate) use core::ClientInner;
