//! Typed identifiers for blocks, parties, documents, and principals.
//!
//! IDs are opaque strings on the wire. Freshly minted IDs are UUIDv7
//! (time-ordered) rendered as 32 hex characters, but any string read back
//! from persisted content is accepted verbatim: documents authored elsewhere
//! carry ids like `"sig-1"` or `"block-1700000000000"`. The `short()` form is
//! for human-facing output only, never used as a lookup key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A block identifier, unique across the whole forest.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

/// A party (signer) identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(String);

/// A document identifier (the storage record key).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

/// An authenticated identity (document owner, API caller).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Mint a new time-ordered ID (UUIDv7, simple hex).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7().as_simple().to_string())
            }

            /// First 8 characters, for human display only, not lookup.
            pub fn short(&self) -> &str {
                match self.0.char_indices().nth(8) {
                    Some((idx, _)) => &self.0[..idx],
                    None => &self.0,
                }
            }

            /// The underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Check if a query string matches this ID by prefix.
            pub fn matches_prefix(&self, prefix: &str) -> bool {
                self.0.starts_with(prefix)
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl std::str::FromStr for $T {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.0)
            }
        }
    };
}

impl_typed_id!(BlockId, "BlockId");
impl_typed_id!(PartyId, "PartyId");
impl_typed_id!(DocumentId, "DocumentId");
impl_typed_id!(PrincipalId, "PrincipalId");

impl PrincipalId {
    /// The well-known "System" actor used for engine-generated audit entries.
    pub fn system() -> Self {
        Self("system".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
