//! Transactional document store for HyprDoc.
//!
//! Holds live documents in memory and serializes writers per document. The
//! signing mutation ([`DocumentStore::sign_block`]) runs entirely under one
//! document's write lock, so two parties signing at the same moment are
//! applied one after the other and each sees the other's result.
//!
//! # Concurrency Model
//!
//! - DashMap for per-document concurrent access
//! - parking_lot `RwLock` around each document (single writer)
//! - Event broadcasting for real-time updates

mod error;
mod signing;
mod store;

pub use error::StoreError;
pub use signing::{SignBlockRequest, SignBlockResponse, SignatureRecord};
pub use store::{DocumentEntry, DocumentEvent, DocumentStore, SharedDocumentStore, shared_document_store};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
