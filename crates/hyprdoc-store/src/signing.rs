//! The signing transaction.
//!
//! `sign_block` is the one backend-authoritative mutation a signer (not the
//! owner) may perform. Under the document's write lock it:
//!
//! 1. rejects a completed document
//! 2. checks the party is on the document and may sign this block
//! 3. applies the signature to the block (any slot, any depth)
//! 4. prepends the "signed" audit entry and runs the completion check
//! 5. appends a [`SignatureRecord`] to the signature trail
//!
//! Steps 1 to 3 can fail; a failure leaves both the document and the trail
//! exactly as they were.

use serde::{Deserialize, Serialize};

use hyprdoc_tree::{SignatureData, TreeError};
use hyprdoc_types::{BlockId, DocumentId, DocumentStatus, PartyId};

use crate::store::{DocumentEvent, DocumentStore};
use crate::{Result, StoreError};

/// Input to [`DocumentStore::sign_block`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignBlockRequest {
    pub document_id: DocumentId,
    pub block_id: BlockId,
    pub party_id: PartyId,
    /// Signature image as a data URL.
    pub signature_asset: String,
    pub ip_address: String,
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Client-computed hash of the document at signing time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity_hash: Option<String>,
    /// Email or phone confirmed by the identity check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_identifier: Option<String>,
}

/// Result of a successful signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignBlockResponse {
    pub success: bool,
    pub status: DocumentStatus,
}

/// One row of a document's signature trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    pub id: String,
    pub document_id: DocumentId,
    pub block_id: BlockId,
    pub party_id: PartyId,
    pub signature_asset: String,
    pub ip_address: String,
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_identifier: Option<String>,
    /// Unix millis.
    pub signed_at: u64,
}

impl SignatureRecord {
    fn from_request(req: &SignBlockRequest, signed_at: u64) -> Self {
        Self {
            id: uuid::Uuid::now_v7().as_simple().to_string(),
            document_id: req.document_id.clone(),
            block_id: req.block_id.clone(),
            party_id: req.party_id.clone(),
            signature_asset: req.signature_asset.clone(),
            ip_address: req.ip_address.clone(),
            user_agent: req.user_agent.clone(),
            location: req.location.clone(),
            integrity_hash: req.integrity_hash.clone(),
            verified_identifier: req.verified_identifier.clone(),
            signed_at,
        }
    }
}

impl DocumentStore {
    /// Record a party's signature on a block as one atomic unit.
    pub fn sign_block(&self, req: SignBlockRequest) -> Result<SignBlockResponse> {
        let entry = self.entry(&req.document_id)?;
        let mut doc = entry.doc.write();

        if doc.status() == DocumentStatus::Completed {
            return Err(TreeError::AlreadyCompleted.into());
        }

        let signer = doc
            .party(&req.party_id)
            .map(|p| p.name.clone())
            .ok_or_else(|| StoreError::UnknownParty(req.party_id.clone()))?;
        if let Some(node) = doc.arena().get(&req.block_id)
            && let Some(assigned) = &node.fields.assigned_to_party_id
            && assigned != &req.party_id
        {
            return Err(StoreError::NotAssigned {
                block: req.block_id.clone(),
                party: req.party_id.clone(),
            });
        }

        let data = SignatureData::new(req.signature_asset.clone());
        let record = SignatureRecord::from_request(&req, data.signed_at);
        let before = doc.status();
        let status = doc.sign(&req.block_id, &data, &signer, Some(&req.ip_address))?;
        entry.signatures.write().push(record);
        drop(doc);

        tracing::info!(
            document = %req.document_id,
            block = %req.block_id,
            party = %req.party_id,
            %status,
            "block signed"
        );
        self.emit(DocumentEvent::Signed {
            document_id: req.document_id.clone(),
            block_id: req.block_id.clone(),
            party_id: req.party_id.clone(),
            status,
        });
        if status == DocumentStatus::Completed && before != DocumentStatus::Completed {
            self.emit(DocumentEvent::Completed {
                document_id: req.document_id,
            });
        }

        Ok(SignBlockResponse {
            success: true,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyprdoc_tree::{DocumentContent, DocumentRecord};
    use hyprdoc_types::{Block, BlockBody, Party, PrincipalId};

    fn signature(id: &str, party: &str) -> Block {
        Block::new(
            id,
            BlockBody::Signature {
                content: String::new(),
                signature_id: None,
                signed_at: None,
            },
        )
        .with_required(true)
        .assigned_to(party)
    }

    fn party(id: &str, name: &str) -> Party {
        Party {
            id: PartyId::from(id),
            name: name.into(),
            color: "#000000".into(),
            contact: None,
        }
    }

    fn seeded_store() -> DocumentStore {
        let store = DocumentStore::new();
        let record = DocumentRecord {
            id: DocumentId::from("doc"),
            title: "Agreement".into(),
            owner_id: PrincipalId::from("owner"),
            status: DocumentStatus::Sent,
            version: 0,
            content: DocumentContent {
                blocks: vec![signature("sig-a", "p-a"), signature("sig-b", "p-b")],
                parties: vec![party("p-a", "Ann"), party("p-b", "Ben")],
                ..DocumentContent::default()
            },
        };
        store.insert(record).unwrap();
        store
    }

    fn request(block: &str, party: &str) -> SignBlockRequest {
        SignBlockRequest {
            document_id: DocumentId::from("doc"),
            block_id: BlockId::from(block),
            party_id: PartyId::from(party),
            signature_asset: "data:image/png;base64,AAAA".into(),
            ip_address: "203.0.113.7".into(),
            user_agent: "test".into(),
            location: None,
            integrity_hash: Some("abc123".into()),
            verified_identifier: None,
        }
    }

    fn owner() -> PrincipalId {
        PrincipalId::from("owner")
    }

    #[test]
    fn test_sign_block_flow() {
        let store = seeded_store();
        let mut rx = store.subscribe();

        let first = store.sign_block(request("sig-a", "p-a")).unwrap();
        assert_eq!(first, SignBlockResponse { success: true, status: DocumentStatus::Sent });

        let second = store.sign_block(request("sig-b", "p-b")).unwrap();
        assert_eq!(second.status, DocumentStatus::Completed);

        let doc = store.get(&DocumentId::from("doc"), &owner()).unwrap();
        assert_eq!(doc.audit_log()[0].user, "System");
        assert_eq!(doc.audit_log()[1].user, "Ben");
        assert_eq!(doc.audit_log()[1].ip_address.as_deref(), Some("203.0.113.7"));

        let trail = store.signatures(&DocumentId::from("doc")).unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].party_id, PartyId::from("p-a"));
        assert_eq!(trail[1].integrity_hash.as_deref(), Some("abc123"));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            DocumentEvent::Completed {
                document_id: DocumentId::from("doc")
            }
        );
    }

    #[test]
    fn test_completed_document_rejects_signature() {
        let store = seeded_store();
        store.sign_block(request("sig-a", "p-a")).unwrap();
        store.sign_block(request("sig-b", "p-b")).unwrap();

        let err = store.sign_block(request("sig-a", "p-a")).unwrap_err();
        assert_eq!(err, StoreError::Tree(TreeError::AlreadyCompleted));
        assert_eq!(store.signatures(&DocumentId::from("doc")).unwrap().len(), 2);
    }

    #[test]
    fn test_wrong_party_rejected_without_side_effects() {
        let store = seeded_store();
        let before = store.record(&DocumentId::from("doc"), &owner()).unwrap();

        let err = store.sign_block(request("sig-a", "p-b")).unwrap_err();
        assert!(matches!(err, StoreError::NotAssigned { .. }));

        let err = store.sign_block(request("sig-a", "p-zzz")).unwrap_err();
        assert_eq!(err, StoreError::UnknownParty(PartyId::from("p-zzz")));

        let err = store.sign_block(request("ghost", "p-a")).unwrap_err();
        assert_eq!(err, StoreError::Tree(TreeError::BlockNotFound(BlockId::from("ghost"))));

        assert_eq!(store.record(&DocumentId::from("doc"), &owner()).unwrap(), before);
        assert!(store.signatures(&DocumentId::from("doc")).unwrap().is_empty());
    }

    #[test]
    fn test_missing_document() {
        let store = DocumentStore::new();
        let mut req = request("sig-a", "p-a");
        req.document_id = DocumentId::from("missing");
        assert_eq!(
            store.sign_block(req).unwrap_err(),
            StoreError::DocumentNotFound(DocumentId::from("missing"))
        );
    }

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::json!({
            "documentId": "doc",
            "blockId": "sig-a",
            "partyId": "p-a",
            "signatureAsset": "data:,",
            "ipAddress": "127.0.0.1",
            "userAgent": "curl"
        });
        let req: SignBlockRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.block_id, BlockId::from("sig-a"));
        assert!(req.location.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_signers_serialize() {
        use std::sync::Arc;
        use tokio::sync::Barrier;
        use tokio::task::JoinSet;

        for _ in 0..32 {
            let store = Arc::new(seeded_store());
            let barrier = Arc::new(Barrier::new(2));
            let mut tasks = JoinSet::new();
            for (block, party) in [("sig-a", "p-a"), ("sig-b", "p-b")] {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                tasks.spawn(async move {
                    barrier.wait().await;
                    store.sign_block(request(block, party))
                });
            }

            let mut statuses = Vec::new();
            while let Some(result) = tasks.join_next().await {
                statuses.push(result.expect("Task panicked").unwrap().status);
            }
            statuses.sort_by_key(|s| s.as_str());
            assert_eq!(statuses, [DocumentStatus::Completed, DocumentStatus::Sent]);

            let doc = store.get(&DocumentId::from("doc"), &owner()).unwrap();
            assert_eq!(doc.status(), DocumentStatus::Completed);
            assert_eq!(doc.pending_signatures().len(), 0);
            // two signatures, then the completion entry
            assert_eq!(doc.audit_log().len(), 3);
            assert_eq!(store.signatures(&DocumentId::from("doc")).unwrap().len(), 2);
        }
    }
}
