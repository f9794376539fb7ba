//! Identifier types for the matching engine.
//!
//! This module is intentionally **type-heavy** and **logic-light**: strongly-typed
//! ID newtypes keep lost-item, found-item, owner, and match identifiers from being
//! mixed up at compile time, which matters in a codebase whose central table is a
//! `(lost_item_id, found_item_id)` pair.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: enables `UUIDv7` generation via `uuid/v7` for insert locality.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate an ID intended to have good DB insert locality.
///
/// With feature `uuid_v7` enabled, this uses `Uuid::now_v7()`.
/// Otherwise it falls back to `Uuid::new_v4()`.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

/// Generate a random UUID (v4).
#[inline]
#[must_use]
fn uuid_random() -> Uuid {
    Uuid::new_v4()
}

/// Declare a UUID newtype with a consistent API.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident,
        generator = $gen:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            /// Create a new identifier.
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self($gen())
            }

            /// Wrap an existing UUID.
            #[inline]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the underlying UUID.
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Extract the underlying UUID.
            #[inline]
            #[must_use]
            pub const fn into_uuid(self) -> Uuid {
                self.0
            }

            /// Convert to 16 bytes for compact DB storage (e.g., `SQLite` `BLOB(16)`).
            #[inline]
            #[must_use]
            pub const fn to_bytes(self) -> [u8; 16] {
                self.0.into_bytes()
            }

            /// Build from 16 bytes (e.g., `SQLite` `BLOB(16)`).
            #[inline]
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<Uuid> for $name {
            #[inline]
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_uuid_id!(
    /// Identifier for an item report (lost or found).
    ItemId,
    generator = uuid_time_ordered
);

define_uuid_id!(
    /// Identifier for the account that filed a report.
    ///
    /// Default strategy: `UUIDv4` (random) to reduce timestamp leakage when exposed.
    OwnerId,
    generator = uuid_random
);

define_uuid_id!(
    /// Identifier for a persisted match record.
    MatchId,
    generator = uuid_time_ordered
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse_roundtrip() {
        let id = ItemId::new();
        let parsed = ItemId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let id = MatchId::new();
        assert_eq!(MatchId::from_bytes(id.to_bytes()), id);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(OwnerId::new(), OwnerId::new());
    }
}
