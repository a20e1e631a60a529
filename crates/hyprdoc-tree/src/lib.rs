//! Block tree engine for HyprDoc documents.
//!
//! Owns the document forest and every structural mutation on it, the
//! snapshot diff, and the signing status machine.
//!
//! # Design Philosophy
//!
//! The forest lives in an arena keyed by block id. Containers hold their
//! children as id lists and every node records the edge up to its parent,
//! so insert, delete, and move are index operations on those lists rather
//! than rebuilds of nested copies. The nested [`Block`](hyprdoc_types::Block)
//! form only appears at the edges: loading, saving, and diffing.
//!
//! # Column Rows
//!
//! - a `columns` row holds only `column` blocks, and a `column` only lives in a row
//! - a non-empty row's widths always sum to 100 (insert, delete, move,
//!   duplicate, and resize all rebalance)
//!
//! # Child Slots
//!
//! Conditionals have two child lists (`children` and `elseChildren`).
//! Every traversal, delete, diff, and the completion check walk both.

mod arena;
mod config;
mod diff;
mod document;
mod error;
pub mod factory;
mod layout;
mod ops;
mod walk;

pub use arena::{BlockArena, Node, ParentRef};
pub use config::TreeConfig;
pub use diff::{DiffStatus, diff_blocks, summarize};
pub use document::{Document, DocumentContent, DocumentRecord};
pub use error::TreeError;
pub use layout::{SplitDirection, SplitSource};
pub use ops::{BlockPatch, Position, SignatureData};
pub use walk::MAX_TREE_DEPTH;

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
