//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing a subscriber id with a room id at
//! compile time. Both serialize as plain JSON numbers, which is what the
//! room-enter handshake and the metadata endpoint expect.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Macro
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier.
            #[inline]
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw numeric value.
            #[inline]
            #[must_use]
            pub const fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            #[inline]
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

// ============================================================================
// Identifiers
// ============================================================================

numeric_id! {
    /// Subscriber (viewer) id sent in the handshake. `0` enters anonymously.
    UserId
}

numeric_id! {
    /// Live room id.
    RoomId
}

// ============================================================================
// Tests
// ============================================================================
