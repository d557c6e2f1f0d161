//! Identifier and version newtypes.
//!
//! Stream IDs and idempotency keys are UUIDs persisted as hyphenated text.
//! [`Version`] is the unsigned stream version counter; the backend stores it
//! in a signed 64-bit column, so conversions in both directions are checked.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EventStoreError;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a fresh, time-ordered (v7) identifier.
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            /// Parse a stored or user-supplied identifier.
            pub(crate) fn parse(raw: &str) -> Result<Self, EventStoreError> {
                Uuid::parse_str(raw)
                    .map(Self)
                    .map_err(|_| EventStoreError::InvalidStreamIdentifier {
                        value: raw.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl FromStr for $name {
            type Err = EventStoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

uuid_newtype!(
    /// Globally unique identity of a stream.
    StreamId
);

uuid_newtype!(
    /// Caller-supplied key used to deduplicate a repeated request.
    IdempotencyKey
);

/// Stream version: 0 for a fresh stream, +1 per committed event.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Wrap a raw version number.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Version of a freshly created stream.
    pub const fn initial() -> Self {
        Self(0)
    }

    /// The raw number.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Convert a stored (signed) value, rejecting negatives.
    pub(crate) fn try_from_stored(value: i64) -> Result<Self, EventStoreError> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| EventStoreError::InvalidStreamVersion { value })
    }

    /// The stored (signed) representation, or `None` if it does not fit.
    pub(crate) fn to_stored(self) -> Option<i64> {
        i64::try_from(self.0).ok()
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
