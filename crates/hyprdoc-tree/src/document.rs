//! The document aggregate: block forest plus its sibling records, the
//! signing status machine, and the persisted content form.
//!
//! ```text
//! Draft ──send()──► Sent ──last required signature──► Completed
//!   │                ▲
//!   └──sign()────────┘  (first signature while Draft)
//!
//! Archived, Template: set out of band, never part of signing
//! ```
//!
//! Completion is evaluated after every signature application by flattening
//! the whole forest (all slots) and checking that each required signature
//! block carries a non-empty asset. Once `Completed`, nothing moves the
//! status back and further signatures fail with
//! [`TreeError::AlreadyCompleted`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use hyprdoc_types::{
    AuditAction, AuditEntry, Block, BlockId, BlockKind, DocumentId, DocumentSettings,
    DocumentStatus, Party, PartyId, PrincipalId, Term, Variable,
};

use crate::arena::{BlockArena, Node};
use crate::diff::{DiffStatus, diff_blocks};
use crate::ops::{BlockPatch, SignatureData};
use crate::{Result, TreeConfig, TreeError};

/// `{{ key }}` placeholder in text content.
static PLACEHOLDER: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}"));

// ============================================================================
// Persisted form
// ============================================================================

/// The opaque `content` payload owned by the storage layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentContent {
    pub blocks: Vec<Block>,
    pub parties: Vec<Party>,
    pub variables: Vec<Variable>,
    pub terms: Vec<Term>,
    pub settings: DocumentSettings,
    pub audit_log: Vec<AuditEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Vec<Block>>,
}

/// A stored document row: identity, ownership, status, and content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub title: String,
    pub owner_id: PrincipalId,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub content: DocumentContent,
}

impl DocumentRecord {
    /// Parse a stored record.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pretty-printed JSON for storage.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Document
// ============================================================================

/// A live document: arena-backed forest plus parties, variables, terms,
/// settings, the newest-first audit log, and the send-time snapshot.
#[derive(Clone, Debug)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub owner: PrincipalId,
    pub parties: Vec<Party>,
    pub variables: Vec<Variable>,
    pub terms: Vec<Term>,
    pub settings: DocumentSettings,
    status: DocumentStatus,
    arena: BlockArena,
    audit_log: Vec<AuditEntry>,
    snapshot: Option<Vec<Block>>,
    version: u64,
}

impl Document {
    /// Create an empty draft owned by `owner`.
    pub fn new(title: impl Into<String>, owner: PrincipalId) -> Self {
        Self::with_config(title, owner, TreeConfig::default())
    }

    pub fn with_config(title: impl Into<String>, owner: PrincipalId, config: TreeConfig) -> Self {
        let mut doc = Self {
            id: DocumentId::new(),
            title: title.into(),
            owner,
            parties: Vec::new(),
            variables: Vec::new(),
            terms: Vec::new(),
            settings: DocumentSettings::default(),
            status: DocumentStatus::Draft,
            arena: BlockArena::with_config(config),
            audit_log: Vec::new(),
            snapshot: None,
            version: 0,
        };
        let created = AuditEntry::new(AuditAction::Created, doc.owner.as_str(), None);
        doc.audit_log.push(created);
        doc
    }

    /// Load from the stored form.
    pub fn from_record(record: DocumentRecord, config: TreeConfig) -> Result<Self> {
        let DocumentRecord {
            id,
            title,
            owner_id,
            status,
            version,
            content,
        } = record;
        Ok(Self {
            id,
            title,
            owner: owner_id,
            parties: content.parties,
            variables: content.variables,
            terms: content.terms,
            settings: content.settings,
            status,
            arena: BlockArena::from_forest_with_config(content.blocks, config)?,
            audit_log: content.audit_log,
            snapshot: content.snapshot,
            version,
        })
    }

    /// Convert to the stored form.
    pub fn to_record(&self) -> DocumentRecord {
        DocumentRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            owner_id: self.owner.clone(),
            status: self.status,
            version: self.version,
            content: self.content(),
        }
    }

    pub fn content(&self) -> DocumentContent {
        DocumentContent {
            blocks: self.arena.to_forest(),
            parties: self.parties.clone(),
            variables: self.variables.clone(),
            terms: self.terms.clone(),
            settings: self.settings.clone(),
            audit_log: self.audit_log.clone(),
            snapshot: self.snapshot.clone(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn arena(&self) -> &BlockArena {
        &self.arena
    }

    /// The nested forest.
    pub fn blocks(&self) -> Vec<Block> {
        self.arena.to_forest()
    }

    /// Audit log, newest first.
    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit_log
    }

    pub fn snapshot(&self) -> Option<&[Block]> {
        self.snapshot.as_deref()
    }

    /// Bumped on every successful mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn party(&self, id: &PartyId) -> Option<&Party> {
        self.parties.iter().find(|p| &p.id == id)
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    fn prepend_audit(&mut self, entry: AuditEntry) {
        self.audit_log.insert(0, entry);
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Run a structural edit against the forest.
    ///
    /// The version is bumped only when `edit` succeeds.
    pub fn edit<T>(&mut self, edit: impl FnOnce(&mut BlockArena) -> Result<T>) -> Result<T> {
        let out = edit(&mut self.arena)?;
        self.touch();
        Ok(out)
    }

    /// Merge a patch into a block. Patching a signature block on a sent
    /// document re-runs the completion check.
    pub fn update_block(&mut self, id: &BlockId, patch: &BlockPatch) -> Result<()> {
        self.arena.update(id, patch)?;
        self.touch();
        let is_signature = self.arena.get(id).is_some_and(|n| n.kind() == BlockKind::Signature);
        if is_signature && self.status == DocumentStatus::Sent {
            self.check_completion();
        }
        Ok(())
    }

    // ========================================================================
    // Status machine
    // ========================================================================

    /// Capture the diff baseline and move `Draft → Sent`.
    ///
    /// Sending an already-sent document recaptures the snapshot.
    pub fn send(&mut self) -> Result<()> {
        if !self.status.accepts_signatures() {
            return Err(TreeError::InvalidTransition {
                from: self.status,
                to: DocumentStatus::Sent,
            });
        }
        self.snapshot = Some(self.arena.to_forest());
        self.status = DocumentStatus::Sent;
        let entry = AuditEntry::new(AuditAction::Sent, self.owner.as_str(), None);
        self.prepend_audit(entry);
        self.touch();
        tracing::info!(document = %self.id, "document sent");
        Ok(())
    }

    /// Apply a signature, record it in the audit log, and run the
    /// completion check. Returns the resulting status.
    ///
    /// Fails without touching the document when it is completed (or not in
    /// the signing flow), or when `block` is not a signature block.
    pub fn sign(
        &mut self,
        block: &BlockId,
        data: &SignatureData,
        signer: &str,
        ip_address: Option<&str>,
    ) -> Result<DocumentStatus> {
        match self.status {
            DocumentStatus::Completed => return Err(TreeError::AlreadyCompleted),
            DocumentStatus::Archived | DocumentStatus::Template => {
                return Err(TreeError::InvalidTransition {
                    from: self.status,
                    to: DocumentStatus::Sent,
                });
            }
            DocumentStatus::Draft | DocumentStatus::Sent => {}
        }

        self.arena.apply_signature(block, data)?;

        if self.status == DocumentStatus::Draft {
            tracing::debug!(document = %self.id, "first signature on a draft, marking sent");
            self.status = DocumentStatus::Sent;
        }

        let label = self
            .arena
            .get(block)
            .map(|n| n.fields.label.clone())
            .unwrap_or_default();
        let mut entry = AuditEntry::new(
            AuditAction::Signed,
            signer,
            Some(format!("Signed block \"{label}\"")),
        );
        if let Some(ip) = ip_address {
            entry = entry.with_ip(ip);
        }
        self.prepend_audit(entry);

        self.check_completion();
        self.touch();
        tracing::info!(document = %self.id, block = %block, status = %self.status, "signature applied");
        Ok(self.status)
    }

    /// Promote to `Completed` when every required signature is filled.
    ///
    /// Returns whether the document is completed afterwards.
    pub fn check_completion(&mut self) -> bool {
        if self.status == DocumentStatus::Completed {
            return true;
        }
        if !self.status.accepts_signatures() || !self.is_complete() {
            return false;
        }
        self.status = DocumentStatus::Completed;
        self.prepend_audit(AuditEntry::system(
            AuditAction::Completed,
            "All required signatures collected",
        ));
        tracing::info!(document = %self.id, "document completed");
        true
    }

    /// True when no required signature block is left empty.
    pub fn is_complete(&self) -> bool {
        self.pending_signatures().is_empty()
    }

    /// Required signature blocks still waiting for an asset, in document
    /// order.
    pub fn pending_signatures(&self) -> Vec<&Node> {
        self.arena
            .of_kind(BlockKind::Signature)
            .into_iter()
            .filter(|n| n.fields.required && n.body.content().is_none_or(str::is_empty))
            .collect()
    }

    /// Move to `Archived`. Allowed from any status but `Archived`.
    pub fn archive(&mut self) -> Result<()> {
        self.transition(DocumentStatus::Archived, |s| s != DocumentStatus::Archived)
    }

    /// Turn a draft into a reusable template.
    pub fn mark_template(&mut self) -> Result<()> {
        self.transition(DocumentStatus::Template, |s| s == DocumentStatus::Draft)
    }

    fn transition(
        &mut self,
        to: DocumentStatus,
        allowed: impl Fn(DocumentStatus) -> bool,
    ) -> Result<()> {
        if !allowed(self.status) {
            return Err(TreeError::InvalidTransition { from: self.status, to });
        }
        tracing::debug!(document = %self.id, from = %self.status, %to, "status change");
        self.status = to;
        self.touch();
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Classify every block against the send-time snapshot.
    pub fn diff(&self) -> BTreeMap<BlockId, DiffStatus> {
        diff_blocks(&self.arena.to_forest(), self.snapshot.as_deref())
    }

    /// Blocks assigned to a party, in document order.
    pub fn blocks_for_party(&self, party: &PartyId) -> Vec<&Node> {
        self.arena
            .flatten()
            .into_iter()
            .filter(|n| n.fields.assigned_to_party_id.as_ref() == Some(party))
            .collect()
    }

    /// Value of a variable.
    pub fn variable(&self, key: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|v| v.key == key)
            .map(|v| v.value.as_str())
    }

    /// Set or add a variable.
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.variables.iter_mut().find(|v| v.key == key) {
            Some(var) => var.value = value,
            None => self.variables.push(Variable::new(key, value)),
        }
        self.touch();
    }

    /// Replace `{{key}}` placeholders with variable values. Unknown keys are
    /// left as written.
    pub fn interpolate(&self, text: &str) -> String {
        let re = match PLACEHOLDER.as_ref() {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!(error = %e, "placeholder pattern failed to compile");
                return text.to_string();
            }
        };
        re.replace_all(text, |caps: &regex::Captures| {
            let key = &caps[1];
            match self.variable(key) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
    }

    /// Document-specific glossary definition (case-insensitive).
    pub fn term(&self, word: &str) -> Option<&Term> {
        self.terms.iter().find(|t| t.term.eq_ignore_ascii_case(word))
    }

    /// Whether a block is shown given current variable values.
    ///
    /// A block under a conditional is visible only if the branch it sits in
    /// is the one the condition selects.
    pub fn is_visible(&self, id: &BlockId) -> bool {
        let mut current = id.clone();
        while let Some(parent) = self.arena.parent_of(&current) {
            if let Some(node) = self.arena.get(&parent.id)
                && let hyprdoc_types::BlockBody::Conditional { condition, .. } = &node.body
            {
                let matched = condition.matches(|k| self.variable(k).map(str::to_string));
                let in_then = parent.slot == hyprdoc_types::Slot::Children;
                if matched != in_then {
                    return false;
                }
            }
            current = parent.id.clone();
        }
        self.arena.contains(id)
    }
}
