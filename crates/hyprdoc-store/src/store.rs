//! Document storage with per-document single-writer locking.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use hyprdoc_tree::{Document, DocumentRecord, TreeConfig};
use hyprdoc_types::{BlockId, DocumentId, DocumentStatus, PartyId, PrincipalId};

use crate::signing::SignatureRecord;
use crate::{Result, StoreError};

/// Events broadcast when documents change.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentEvent {
    /// A document was created or imported.
    Created {
        document_id: DocumentId,
        owner: PrincipalId,
    },
    /// The owner committed an edit.
    Updated {
        document_id: DocumentId,
        version: u64,
    },
    /// A party signed a block.
    Signed {
        document_id: DocumentId,
        block_id: BlockId,
        party_id: PartyId,
        status: DocumentStatus,
    },
    /// The last required signature landed.
    Completed { document_id: DocumentId },
    /// A document was deleted.
    Deleted { document_id: DocumentId },
}

/// Entry for a document in the store.
pub struct DocumentEntry {
    /// The live document. Writers hold this lock for the whole mutation.
    pub(crate) doc: RwLock<Document>,
    /// Signature audit trail, oldest first.
    pub(crate) signatures: RwLock<Vec<SignatureRecord>>,
}

impl DocumentEntry {
    fn new(doc: Document) -> Self {
        Self {
            doc: RwLock::new(doc),
            signatures: RwLock::new(Vec::new()),
        }
    }

    pub fn version(&self) -> u64 {
        self.doc.read().version()
    }

    pub fn status(&self) -> DocumentStatus {
        self.doc.read().status()
    }

    pub fn owner(&self) -> PrincipalId {
        self.doc.read().owner.clone()
    }
}

/// Store for live documents.
pub struct DocumentStore {
    /// Concurrent document storage.
    pub(crate) docs: DashMap<DocumentId, Arc<DocumentEntry>>,
    /// Limits applied to every document's forest.
    config: TreeConfig,
    /// Event broadcaster.
    pub(crate) event_tx: broadcast::Sender<DocumentEvent>,
}

impl DocumentStore {
    /// Create an empty store with default tree limits.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            docs: DashMap::new(),
            config,
            event_tx,
        }
    }

    /// Get the event receiver for subscribing to changes.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub(crate) fn emit(&self, event: DocumentEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// Create an empty draft owned by `owner`.
    pub fn create(&self, owner: PrincipalId, title: impl Into<String>) -> DocumentId {
        let doc = Document::with_config(title, owner.clone(), self.config.clone());
        let id = doc.id.clone();
        self.docs.insert(id.clone(), Arc::new(DocumentEntry::new(doc)));
        tracing::debug!(document = %id, owner = %owner, "created document");
        self.emit(DocumentEvent::Created {
            document_id: id.clone(),
            owner,
        });
        id
    }

    /// Import a stored document.
    pub fn insert(&self, record: DocumentRecord) -> Result<DocumentId> {
        if self.docs.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        let doc = Document::from_record(record, self.config.clone())?;
        let id = doc.id.clone();
        let owner = doc.owner.clone();
        self.docs.insert(id.clone(), Arc::new(DocumentEntry::new(doc)));
        self.emit(DocumentEvent::Created {
            document_id: id.clone(),
            owner,
        });
        Ok(id)
    }

    /// Look up an entry without an ownership check.
    pub(crate) fn entry(&self, id: &DocumentId) -> Result<Arc<DocumentEntry>> {
        self.docs
            .get(id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| StoreError::DocumentNotFound(id.clone()))
    }

    fn authorize(doc: &Document, principal: &PrincipalId) -> Result<()> {
        if &doc.owner != principal {
            return Err(StoreError::Unauthorized {
                document: doc.id.clone(),
                principal: principal.clone(),
            });
        }
        Ok(())
    }

    /// A copy of the document, for its owner.
    pub fn get(&self, id: &DocumentId, principal: &PrincipalId) -> Result<Document> {
        let entry = self.entry(id)?;
        let doc = entry.doc.read();
        Self::authorize(&doc, principal)?;
        Ok(doc.clone())
    }

    /// The stored form of a document, for its owner.
    pub fn record(&self, id: &DocumentId, principal: &PrincipalId) -> Result<DocumentRecord> {
        let entry = self.entry(id)?;
        let doc = entry.doc.read();
        Self::authorize(&doc, principal)?;
        Ok(doc.to_record())
    }

    /// Apply an owner's edit as one atomic unit.
    ///
    /// The edit runs against a copy; the copy replaces the live document
    /// only if the edit succeeds.
    pub fn update<T>(
        &self,
        id: &DocumentId,
        principal: &PrincipalId,
        edit: impl FnOnce(&mut Document) -> hyprdoc_tree::Result<T>,
    ) -> Result<T> {
        let entry = self.entry(id)?;
        let mut doc = entry.doc.write();
        Self::authorize(&doc, principal)?;

        let mut draft = doc.clone();
        let out = edit(&mut draft)?;
        let completed = draft.status() == DocumentStatus::Completed
            && doc.status() != DocumentStatus::Completed;
        *doc = draft;

        let version = doc.version();
        drop(doc);
        self.emit(DocumentEvent::Updated {
            document_id: id.clone(),
            version,
        });
        if completed {
            self.emit(DocumentEvent::Completed {
                document_id: id.clone(),
            });
        }
        Ok(out)
    }

    /// Remove a document.
    pub fn delete(&self, id: &DocumentId, principal: &PrincipalId) -> Result<()> {
        let entry = self.entry(id)?;
        Self::authorize(&entry.doc.read(), principal)?;
        self.docs.remove(id);
        tracing::debug!(document = %id, "deleted document");
        self.emit(DocumentEvent::Deleted {
            document_id: id.clone(),
        });
        Ok(())
    }

    /// Ids of every document owned by `principal`, sorted.
    pub fn list_for_owner(&self, principal: &PrincipalId) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self
            .docs
            .iter()
            .filter(|r| &r.value().owner() == principal)
            .map(|r| r.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Signature audit trail of a document, oldest first.
    pub fn signatures(&self, id: &DocumentId) -> Result<Vec<SignatureRecord>> {
        Ok(self.entry(id)?.signatures.read().clone())
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.docs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to a DocumentStore.
/// With DashMap, the store itself doesn't need a lock.
pub type SharedDocumentStore = Arc<DocumentStore>;

/// Create a new shared document store.
pub fn shared_document_store() -> SharedDocumentStore {
    Arc::new(DocumentStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyprdoc_tree::{BlockPatch, Position, TreeError};
    use hyprdoc_types::BlockKind;

    fn alice() -> PrincipalId {
        PrincipalId::from("alice")
    }

    fn mallory() -> PrincipalId {
        PrincipalId::from("mallory")
    }

    #[test]
    fn test_create_and_get() {
        let store = DocumentStore::new();
        let id = store.create(alice(), "Lease");
        let doc = store.get(&id, &alice()).unwrap();
        assert_eq!(doc.title, "Lease");
        assert_eq!(doc.status(), DocumentStatus::Draft);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let store = DocumentStore::new();
        let id = DocumentId::from("nope");
        assert_eq!(
            store.get(&id, &alice()).unwrap_err(),
            StoreError::DocumentNotFound(id)
        );
    }

    #[test]
    fn test_non_owner_rejected() {
        let store = DocumentStore::new();
        let id = store.create(alice(), "Lease");
        assert!(matches!(
            store.get(&id, &mallory()),
            Err(StoreError::Unauthorized { .. })
        ));
        assert!(matches!(
            store.update(&id, &mallory(), |d| d.send()),
            Err(StoreError::Unauthorized { .. })
        ));
        assert!(matches!(
            store.delete(&id, &mallory()),
            Err(StoreError::Unauthorized { .. })
        ));
        assert!(store.contains(&id));
    }

    #[test]
    fn test_update_commits_on_success() {
        let store = DocumentStore::new();
        let id = store.create(alice(), "Lease");
        let block = store
            .update(&id, &alice(), |d| d.edit(|a| a.insert(BlockKind::Text, None, Position::After)))
            .unwrap();
        let doc = store.get(&id, &alice()).unwrap();
        assert!(doc.arena().contains(&block));
        assert_eq!(doc.version(), 1);
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let store = DocumentStore::new();
        let id = store.create(alice(), "Lease");
        let err = store
            .update(&id, &alice(), |d| {
                d.edit(|a| a.insert(BlockKind::Text, None, Position::After))?;
                d.update_block(&BlockId::from("ghost"), &BlockPatch::label("x"))
            })
            .unwrap_err();
        assert_eq!(err, StoreError::Tree(TreeError::BlockNotFound(BlockId::from("ghost"))));
        let doc = store.get(&id, &alice()).unwrap();
        assert!(doc.arena().is_empty());
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn test_insert_duplicate_rejected() {
        let store = DocumentStore::new();
        let id = store.create(alice(), "Lease");
        let record = store.record(&id, &alice()).unwrap();
        assert_eq!(store.insert(record).unwrap_err(), StoreError::AlreadyExists(id));
    }

    #[test]
    fn test_list_for_owner() {
        let store = DocumentStore::new();
        let a = store.create(alice(), "One");
        let b = store.create(alice(), "Two");
        store.create(mallory(), "Other");
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.list_for_owner(&alice()), expected);
    }

    #[test]
    fn test_delete_emits_event() {
        let store = DocumentStore::new();
        let id = store.create(alice(), "Lease");
        let mut rx = store.subscribe();
        store.delete(&id, &alice()).unwrap();
        assert!(store.is_empty());
        assert_eq!(rx.try_recv().unwrap(), DocumentEvent::Deleted { document_id: id });
    }
}
