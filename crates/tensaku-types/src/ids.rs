//! Typed identifiers for sessions, requests, cells, and documents.
//!
//! `SessionId` and `RequestId` wrap UUIDv7 (time-ordered, globally unique) and
//! display as standard UUID text for logging. The `short()` form (first 8 hex
//! chars) is for human-facing output only, never used as a lookup key.
//!
//! `CellId` is the cell's *internal id*: a UUIDv5 derived from the cell's
//! content the first time the cell is observed. It is not recomputed when the
//! content later changes, and it is unrelated to the cell's position.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cell::CellKind;

/// A review session identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

/// An agent request identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(uuid::Uuid);

/// A cell's internal id (UUIDv5, content-derived on first observation).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// First 8 hex characters, for human display only, not lookup.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Full 32-character hex string (no hyphens).
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// The raw 16 bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Reconstruct from 16 bytes.
            pub fn from_bytes(b: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(b))
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// A nil / zero ID, for sentinel values only.
            pub fn nil() -> Self {
                Self(uuid::Uuid::nil())
            }

            /// Check if this is the nil ID.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(SessionId, "SessionId");
impl_typed_id!(RequestId, "RequestId");
impl_typed_id!(CellId, "CellId");

macro_rules! impl_time_ordered {
    ($T:ident) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

impl_time_ordered!(SessionId);
impl_time_ordered!(RequestId);

// ── CellId derivation ───────────────────────────────────────────────────────

/// Fixed namespace for deriving content-based cell ids via UUIDv5.
const TENSAKU_CELL_NS: uuid::Uuid = uuid::uuid!("3f6a1c2e-94d7-4b1a-8e35-c70b2d9f6a41");

impl CellId {
    /// Derive an internal id from a cell's kind and source.
    ///
    /// `salt` disambiguates cells with identical content: callers pass the
    /// number of earlier cells in the same document that hashed to the same
    /// content. Same inputs always produce the same id.
    pub fn derive(kind: CellKind, source: &str, salt: u64) -> Self {
        let mut bytes = Vec::with_capacity(source.len() + 16);
        bytes.extend_from_slice(kind.as_str().as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(source.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&salt.to_le_bytes());
        Self(uuid::Uuid::new_v5(&TENSAKU_CELL_NS, &bytes))
    }
}

// ── DocumentUri ─────────────────────────────────────────────────────────────

/// Location of a document, used as the key in a document store.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentUri(String);

impl DocumentUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentUri({})", self.0)
    }
}

impl From<&str> for DocumentUri {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let a = CellId::derive(CellKind::Code, "print(1)", 0);
        let b = CellId::derive(CellKind::Code, "print(1)", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_salt_disambiguates() {
        let a = CellId::derive(CellKind::Code, "x = 1", 0);
        let b = CellId::derive(CellKind::Code, "x = 1", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_kind_matters() {
        let code = CellId::derive(CellKind::Code, "# Title", 0);
        let markup = CellId::derive(CellKind::Markup, "# Title", 0);
        assert_ne!(code, markup);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_parse_roundtrips_hex() {
        let id = RequestId::new();
        let parsed = RequestId::parse(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_debug_is_terse() {
        let id = CellId::derive(CellKind::Raw, "", 0);
        let dbg = format!("{:?}", id);
        assert!(dbg.starts_with("CellId("));
        assert_eq!(dbg.len(), "CellId(".len() + 8 + 1);
    }
}
