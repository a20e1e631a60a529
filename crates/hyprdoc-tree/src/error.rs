//! Error types for tree and document operations.

use thiserror::Error;

use hyprdoc_types::{BlockId, DocumentStatus};

/// Errors that can occur during tree and document operations.
///
/// Structural lookups that the editor treats as soft failures (insert or
/// move onto a missing target) never surface here; they fall back to a
/// root append instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    /// Block not found in the forest.
    #[error("block not found: {0:?}")]
    BlockNotFound(BlockId),

    /// A block with this id is already in the forest.
    #[error("block already exists: {0:?}")]
    DuplicateBlock(BlockId),

    /// Operation not supported on this block's kind.
    ///
    /// For example, `apply_signature` is only supported on signature blocks.
    #[error("{operation} not supported on block {id:?}")]
    UnsupportedOperation { id: BlockId, operation: &'static str },

    /// A patch field does not exist on this block's kind.
    #[error("field `{field}` does not apply to block {id:?}")]
    UnsupportedField { id: BlockId, field: &'static str },

    /// The block cannot live at the requested position.
    #[error("cannot place block {id:?}: {reason}")]
    InvalidPlacement { id: BlockId, reason: &'static str },

    /// Split source and target are incompatible.
    #[error("invalid split: {0}")]
    InvalidSplit(String),

    /// Column width is NaN or infinite.
    #[error("invalid column width: {0}")]
    InvalidWidth(f64),

    /// Nesting would exceed the configured depth limit.
    #[error("nesting depth {depth} exceeds limit {max}")]
    TooDeep { depth: usize, max: usize },

    /// Signature submitted to a completed document.
    #[error("document is already completed")]
    AlreadyCompleted,

    /// Status change not allowed from the current state.
    #[error("cannot move document from {from} to {to}")]
    InvalidTransition { from: DocumentStatus, to: DocumentStatus },

    /// Forest violates a structural invariant.
    #[error("corrupt tree: {0}")]
    Corrupt(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TreeError {
    fn from(e: serde_json::Error) -> Self {
        TreeError::Serialization(e.to_string())
    }
}
