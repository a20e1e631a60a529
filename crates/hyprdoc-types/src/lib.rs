//! Shared identity, block, and document types for HyprDoc.
//!
//! This crate is the leaf of the workspace: typed IDs, the closed block kind
//! enumeration, the block sum type in its nested wire form, and the sibling
//! records (parties, variables, terms, settings, audit entries) that travel
//! with a document. It has **no internal hyprdoc dependencies**.
//!
//! # Entity Overview
//!
//! ```text
//! Document (DocumentId)
//!     └── blocks: ordered forest of Block (BlockId, unique across the forest)
//!     │     └── columns → column → leaf blocks
//!     │     └── conditional → children / elseChildren
//!     │     └── repeater → children
//!     └── parties: Party (PartyId) ← blocks may be assigned to one
//!     └── variables, terms, settings
//!     └── auditLog: AuditEntry, newest first
//! ```
//!
//! # Key Types
//!
//! |----------------------|----------------------------------------------|
//! | Type                 | Purpose                                      |
//! |----------------------|----------------------------------------------|
//! | [`BlockId`]          | Opaque block address                         |
//! | [`BlockKind`]        | Closed enumeration of block types            |
//! | [`Block`]            | Nested block (wire form)                     |
//! | [`BlockBody`]        | Per-kind payload, generic over children      |
//! | [`Party`]            | A signer                                     |
//! | [`DocumentStatus`]   | draft / sent / completed / archived / template |
//! | [`AuditEntry`]       | One audit log line                           |
//! |----------------------|----------------------------------------------|

pub mod block;
pub mod document;
pub mod ids;

// Re-export primary types at crate root for convenience.
pub use block::{
    Block, BlockBody, BlockFields, BlockKind, Condition, CurrencySettings, PaymentSettings, Slot,
    flatten_forest,
};
pub use document::{
    AuditAction, AuditEntry, DocumentSettings, DocumentStatus, Party, Term, Variable,
};
pub use ids::{BlockId, DocumentId, PartyId, PrincipalId};

/// Current time as Unix milliseconds. Used by constructors throughout the crate.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
