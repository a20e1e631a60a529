//! Error types for the document store.

use thiserror::Error;

use hyprdoc_tree::TreeError;
use hyprdoc_types::{BlockId, DocumentId, PartyId, PrincipalId};

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No document with this id.
    #[error("document not found: {0:?}")]
    DocumentNotFound(DocumentId),

    /// A document with this id is already stored.
    #[error("document already exists: {0:?}")]
    AlreadyExists(DocumentId),

    /// The principal does not own the document.
    #[error("{principal:?} may not access document {document:?}")]
    Unauthorized {
        document: DocumentId,
        principal: PrincipalId,
    },

    /// The signing party is not listed on the document.
    #[error("unknown party {0:?}")]
    UnknownParty(PartyId),

    /// The block is assigned to a different party.
    #[error("block {block:?} is not assigned to party {party:?}")]
    NotAssigned { block: BlockId, party: PartyId },

    /// The tree engine rejected the mutation.
    #[error(transparent)]
    Tree(#[from] TreeError),
}
