//! Document-level types: parties, variables, glossary terms, settings,
//! audit entries, and the signing status.
//!
//! These are the sibling arrays that travel next to the block forest in a
//! persisted document. They carry no tree logic of their own.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::PartyId;

/// A signer or participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub id: PartyId,
    pub name: String,
    /// Display color (CSS hex) used to tint assigned fields.
    #[serde(default = "default_party_color")]
    pub color: String,
    /// Email or phone used for delivery and identity verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

fn default_party_color() -> String {
    "#6366f1".to_string()
}

impl Party {
    /// Create a new party with a fresh ID and the default color.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PartyId::new(),
            name: name.into(),
            color: default_party_color(),
            contact: None,
        }
    }
}

/// A named key/value substitution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Variable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A glossary override: document-specific definition of a term.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub term: String,
    pub definition: String,
}

/// Presentation and signing settings. Opaque to the tree engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentSettings {
    /// Parties must sign in the order they are listed.
    pub signing_order: bool,
    pub brand_color: Option<String>,
    pub allow_decline: bool,
    /// Base currency for currency/payment blocks without their own.
    pub currency: String,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            signing_order: false,
            brand_color: None,
            allow_decline: true,
            currency: "USD".into(),
        }
    }
}

/// Document lifecycle status.
///
/// `Draft → Sent → Completed` is the signing flow; `Archived` and `Template`
/// are set out of band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Sent,
    Completed,
    Archived,
    Template,
}

impl DocumentStatus {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Sent => "sent",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Archived => "archived",
            DocumentStatus::Template => "template",
        }
    }

    /// Check if signatures can still be collected.
    pub fn accepts_signatures(&self) -> bool {
        matches!(self, DocumentStatus::Draft | DocumentStatus::Sent)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened in an audit log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum AuditAction {
    Created,
    Edited,
    Sent,
    Viewed,
    Signed,
    Declined,
    Completed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Edited => "edited",
            AuditAction::Sent => "sent",
            AuditAction::Viewed => "viewed",
            AuditAction::Signed => "signed",
            AuditAction::Declined => "declined",
            AuditAction::Completed => "completed",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the document's audit log. The log is newest-first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    /// Unix millis.
    pub timestamp: u64,
    pub action: AuditAction,
    /// Display name of who acted ("System" for engine-generated entries).
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl AuditEntry {
    pub const SYSTEM_USER: &'static str = "System";

    /// Create an entry stamped with the current time.
    pub fn new(action: AuditAction, user: impl Into<String>, details: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().as_simple().to_string(),
            timestamp: crate::now_millis(),
            action,
            user: user.into(),
            details,
            ip_address: None,
        }
    }

    /// An engine-generated entry.
    pub fn system(action: AuditAction, details: impl Into<String>) -> Self {
        Self::new(action, Self::SYSTEM_USER, Some(details.into()))
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
