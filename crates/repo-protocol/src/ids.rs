//! Opaque identifiers used on the wire.
//!
//! Peers, documents, sessions and storage locations are all identified by
//! strings. Nothing here assumes structure beyond equality and hashing; the
//! only validation is that an identifier is never empty, and every way of
//! building one (`parse`, `TryFrom`, serde) enforces it.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() {
                    return Err(IdError::Empty($label));
                }
                Ok(Self(s.to_string()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                if s.is_empty() {
                    return Err(IdError::Empty($label));
                }
                Ok(Self(s))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let s = String::deserialize(d)?;
                Self::try_from(s).map_err(serde::de::Error::custom)
            }
        }
    };
}

opaque_id!(
    /// Identifies a participant in the sync network.
    PeerId,
    "peer ID"
);

opaque_id!(
    /// Identifies a CRDT document.
    DocumentId,
    "document ID"
);

opaque_id!(
    /// Scopes ephemeral sequence numbers to one sender process lifetime.
    SessionId,
    "session ID"
);

opaque_id!(
    /// Identifies a storage location that may hold a copy of a document.
    StorageId,
    "storage ID"
);

impl PeerId {
    /// Generate a random peer ID as 16 hex characters.
    pub fn generate() -> Self {
        use rand::Rng;
        let id: u64 = rand::rng().random();
        Self(format!("{:016x}", id))
    }
}

impl SessionId {
    /// Generate a fresh session ID.
    ///
    /// Call once per process start. A receiver treats a session it has never
    /// seen as trusted, which is how sender restarts are recognized.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
