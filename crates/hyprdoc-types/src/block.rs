//! Block kinds and the block sum type.
//!
//! ## Design: one variant per kind
//!
//! `BlockBody` carries exactly the payload its kind needs. Only container
//! variants (`Columns`, `Column`, `Conditional`, `Repeater`) have child
//! slots, so a leaf with children cannot be constructed.
//!
//! `BlockBody` is generic over the child representation `C`:
//!
//! - `BlockBody<Block>`: the nested wire form stored in documents
//! - `BlockBody<BlockId>`: the arena form, children as id lists
//!
//! [`BlockBody::map_children`] converts between the two.
//!
//! ## Wire format
//!
//! Blocks serialize as flat JSON objects tagged by `type` (snake_case) with
//! camelCase fields, e.g.
//!
//! ```json
//! { "id": "b1", "type": "select", "label": "Plan", "variableName": "plan",
//!   "options": ["Basic", "Pro"] }
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};

use crate::ids::{BlockId, PartyId};

/// What a block *is*. Closed set: unknown tags fail to parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum BlockKind {
    Text,
    Input,
    Number,
    Email,
    Select,
    Radio,
    Checkbox,
    Date,
    Signature,
    Image,
    FileUpload,
    SectionBreak,
    Formula,
    Payment,
    Currency,
    Video,
    Html,
    Conditional,
    Repeater,
    Columns,
    Column,
    LongText,
}

impl BlockKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation (the wire tag).
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Input => "input",
            BlockKind::Number => "number",
            BlockKind::Email => "email",
            BlockKind::Select => "select",
            BlockKind::Radio => "radio",
            BlockKind::Checkbox => "checkbox",
            BlockKind::Date => "date",
            BlockKind::Signature => "signature",
            BlockKind::Image => "image",
            BlockKind::FileUpload => "file_upload",
            BlockKind::SectionBreak => "section_break",
            BlockKind::Formula => "formula",
            BlockKind::Payment => "payment",
            BlockKind::Currency => "currency",
            BlockKind::Video => "video",
            BlockKind::Html => "html",
            BlockKind::Conditional => "conditional",
            BlockKind::Repeater => "repeater",
            BlockKind::Columns => "columns",
            BlockKind::Column => "column",
            BlockKind::LongText => "long_text",
        }
    }

    /// Human-readable label given to freshly created blocks.
    pub fn default_label(&self) -> &'static str {
        match self {
            BlockKind::Text => "Text Block",
            BlockKind::Input => "Short Answer",
            BlockKind::Number => "Number",
            BlockKind::Email => "Email Address",
            BlockKind::Select => "Dropdown",
            BlockKind::Radio => "Multiple Choice",
            BlockKind::Checkbox => "Checkboxes",
            BlockKind::Date => "Date",
            BlockKind::Signature => "Signature",
            BlockKind::Image => "Image",
            BlockKind::FileUpload => "File Upload",
            BlockKind::SectionBreak => "Section Break",
            BlockKind::Formula => "Formula",
            BlockKind::Payment => "Payment",
            BlockKind::Currency => "Currency",
            BlockKind::Video => "Video",
            BlockKind::Html => "HTML",
            BlockKind::Conditional => "Conditional Branch",
            BlockKind::Repeater => "Repeater",
            BlockKind::Columns => "Columns",
            BlockKind::Column => "Column",
            BlockKind::LongText => "Long Answer",
        }
    }

    /// Check if this kind owns child slots.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            BlockKind::Columns | BlockKind::Column | BlockKind::Conditional | BlockKind::Repeater
        )
    }

    /// Check if this kind presents a list of options.
    pub fn is_choice(&self) -> bool {
        matches!(self, BlockKind::Select | BlockKind::Radio | BlockKind::Checkbox)
    }

    /// Check if this kind collects a value bound to a variable.
    pub fn is_input_like(&self) -> bool {
        matches!(
            self,
            BlockKind::Input
                | BlockKind::LongText
                | BlockKind::Number
                | BlockKind::Email
                | BlockKind::Date
                | BlockKind::Select
                | BlockKind::Radio
                | BlockKind::Checkbox
                | BlockKind::FileUpload
                | BlockKind::Formula
                | BlockKind::Currency
        )
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which child list of a container a block lives in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// `children`: every container has this slot.
    #[default]
    Children,
    /// `elseChildren`: conditional blocks only.
    Else,
}

/// Show/hide rule on a conditional block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default)]
    pub variable_name: String,
    #[serde(default)]
    pub equals: String,
}

impl Condition {
    /// Evaluate against a variable lookup. An empty condition never matches.
    pub fn matches(&self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        if self.variable_name.is_empty() {
            return false;
        }
        lookup(&self.variable_name).is_some_and(|v| v == self.equals)
    }
}

/// Conversion settings on a currency block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencySettings {
    #[serde(default)]
    pub amount: f64,
    /// Variable supplying the amount instead of the fixed `amount`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_variable: Option<String>,
    pub base_currency: String,
    pub target_currency: String,
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            amount: 0.0,
            source_variable: None,
            base_currency: "USD".into(),
            target_currency: "EUR".into(),
        }
    }
}

/// Checkout settings on a payment block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSettings {
    #[serde(default)]
    pub amount: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            amount: 0.0,
            currency: "USD".into(),
            description: None,
        }
    }
}

/// Kind-specific payload of a block. `C` is the child representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
#[serde(bound(deserialize = "C: Deserialize<'de>"))]
pub enum BlockBody<C> {
    Text {
        #[serde(default)]
        content: String,
    },
    Input {
        #[serde(default)]
        variable_name: String,
    },
    LongText {
        #[serde(default)]
        variable_name: String,
    },
    Number {
        #[serde(default)]
        variable_name: String,
    },
    Email {
        #[serde(default)]
        variable_name: String,
    },
    Date {
        #[serde(default)]
        variable_name: String,
    },
    Select {
        #[serde(default)]
        variable_name: String,
        #[serde(default)]
        options: Vec<String>,
    },
    Radio {
        #[serde(default)]
        variable_name: String,
        #[serde(default)]
        options: Vec<String>,
    },
    Checkbox {
        #[serde(default)]
        variable_name: String,
        #[serde(default)]
        options: Vec<String>,
    },
    Signature {
        /// Signature asset (data URL); empty until signed.
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature_id: Option<String>,
        /// Unix millis.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signed_at: Option<u64>,
    },
    Image {
        #[serde(default)]
        content: String,
    },
    Video {
        #[serde(default)]
        content: String,
    },
    Html {
        #[serde(default)]
        content: String,
    },
    FileUpload {
        #[serde(default)]
        variable_name: String,
        #[serde(default)]
        content: String,
    },
    SectionBreak {},
    Formula {
        #[serde(default)]
        variable_name: String,
        #[serde(default)]
        formula: String,
    },
    Payment {
        #[serde(default)]
        payment_settings: PaymentSettings,
    },
    Currency {
        #[serde(default)]
        variable_name: String,
        #[serde(default)]
        currency_settings: CurrencySettings,
    },
    Conditional {
        #[serde(default)]
        condition: Condition,
        #[serde(default)]
        children: Vec<C>,
        #[serde(default)]
        else_children: Vec<C>,
    },
    Repeater {
        #[serde(default)]
        variable_name: String,
        #[serde(default)]
        children: Vec<C>,
    },
    Columns {
        #[serde(default)]
        children: Vec<C>,
    },
    Column {
        /// Percentage of the row, 0..=100.
        #[serde(default)]
        width: f64,
        #[serde(default)]
        children: Vec<C>,
    },
}

impl<C> BlockBody<C> {
    /// The kind tag of this body.
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockBody::Text { .. } => BlockKind::Text,
            BlockBody::Input { .. } => BlockKind::Input,
            BlockBody::LongText { .. } => BlockKind::LongText,
            BlockBody::Number { .. } => BlockKind::Number,
            BlockBody::Email { .. } => BlockKind::Email,
            BlockBody::Date { .. } => BlockKind::Date,
            BlockBody::Select { .. } => BlockKind::Select,
            BlockBody::Radio { .. } => BlockKind::Radio,
            BlockBody::Checkbox { .. } => BlockKind::Checkbox,
            BlockBody::Signature { .. } => BlockKind::Signature,
            BlockBody::Image { .. } => BlockKind::Image,
            BlockBody::Video { .. } => BlockKind::Video,
            BlockBody::Html { .. } => BlockKind::Html,
            BlockBody::FileUpload { .. } => BlockKind::FileUpload,
            BlockBody::SectionBreak {} => BlockKind::SectionBreak,
            BlockBody::Formula { .. } => BlockKind::Formula,
            BlockBody::Payment { .. } => BlockKind::Payment,
            BlockBody::Currency { .. } => BlockKind::Currency,
            BlockBody::Conditional { .. } => BlockKind::Conditional,
            BlockBody::Repeater { .. } => BlockKind::Repeater,
            BlockBody::Columns { .. } => BlockKind::Columns,
            BlockBody::Column { .. } => BlockKind::Column,
        }
    }

    /// Free-text content (text, html, image, video, signature, file upload).
    pub fn content(&self) -> Option<&str> {
        match self {
            BlockBody::Text { content }
            | BlockBody::Image { content }
            | BlockBody::Video { content }
            | BlockBody::Html { content }
            | BlockBody::Signature { content, .. }
            | BlockBody::FileUpload { content, .. } => Some(content.as_str()),
            _ => None,
        }
    }

    /// Mutable access to free-text content.
    pub fn content_mut(&mut self) -> Option<&mut String> {
        match self {
            BlockBody::Text { content }
            | BlockBody::Image { content }
            | BlockBody::Video { content }
            | BlockBody::Html { content }
            | BlockBody::Signature { content, .. }
            | BlockBody::FileUpload { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Variable binding key, for kinds that collect a value.
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            BlockBody::Input { variable_name }
            | BlockBody::LongText { variable_name }
            | BlockBody::Number { variable_name }
            | BlockBody::Email { variable_name }
            | BlockBody::Date { variable_name }
            | BlockBody::Select { variable_name, .. }
            | BlockBody::Radio { variable_name, .. }
            | BlockBody::Checkbox { variable_name, .. }
            | BlockBody::FileUpload { variable_name, .. }
            | BlockBody::Formula { variable_name, .. }
            | BlockBody::Currency { variable_name, .. }
            | BlockBody::Repeater { variable_name, .. } => Some(variable_name.as_str()),
            _ => None,
        }
    }

    /// Mutable access to the variable binding key.
    pub fn variable_name_mut(&mut self) -> Option<&mut String> {
        match self {
            BlockBody::Input { variable_name }
            | BlockBody::LongText { variable_name }
            | BlockBody::Number { variable_name }
            | BlockBody::Email { variable_name }
            | BlockBody::Date { variable_name }
            | BlockBody::Select { variable_name, .. }
            | BlockBody::Radio { variable_name, .. }
            | BlockBody::Checkbox { variable_name, .. }
            | BlockBody::FileUpload { variable_name, .. }
            | BlockBody::Formula { variable_name, .. }
            | BlockBody::Currency { variable_name, .. }
            | BlockBody::Repeater { variable_name, .. } => Some(variable_name),
            _ => None,
        }
    }

    /// Options list of a choice block.
    pub fn options(&self) -> Option<&[String]> {
        match self {
            BlockBody::Select { options, .. }
            | BlockBody::Radio { options, .. }
            | BlockBody::Checkbox { options, .. } => Some(options.as_slice()),
            _ => None,
        }
    }

    /// Mutable access to the options list.
    pub fn options_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            BlockBody::Select { options, .. }
            | BlockBody::Radio { options, .. }
            | BlockBody::Checkbox { options, .. } => Some(options),
            _ => None,
        }
    }

    /// Width of a column block.
    pub fn width(&self) -> Option<f64> {
        match self {
            BlockBody::Column { width, .. } => Some(*width),
            _ => None,
        }
    }

    /// Child list for a slot, if this body has that slot.
    pub fn slot(&self, slot: Slot) -> Option<&Vec<C>> {
        match (self, slot) {
            (BlockBody::Conditional { children, .. }, Slot::Children)
            | (BlockBody::Repeater { children, .. }, Slot::Children)
            | (BlockBody::Columns { children }, Slot::Children)
            | (BlockBody::Column { children, .. }, Slot::Children) => Some(children),
            (BlockBody::Conditional { else_children, .. }, Slot::Else) => Some(else_children),
            _ => None,
        }
    }

    /// Mutable child list for a slot, if this body has that slot.
    pub fn slot_mut(&mut self, slot: Slot) -> Option<&mut Vec<C>> {
        match (self, slot) {
            (BlockBody::Conditional { children, .. }, Slot::Children)
            | (BlockBody::Repeater { children, .. }, Slot::Children)
            | (BlockBody::Columns { children }, Slot::Children)
            | (BlockBody::Column { children, .. }, Slot::Children) => Some(children),
            (BlockBody::Conditional { else_children, .. }, Slot::Else) => Some(else_children),
            _ => None,
        }
    }

    /// All child slots in traversal order (`children` before `elseChildren`).
    pub fn slots(&self) -> Vec<(Slot, &Vec<C>)> {
        [Slot::Children, Slot::Else]
            .into_iter()
            .filter_map(|s| self.slot(s).map(|list| (s, list)))
            .collect()
    }

    /// Check if this body owns child slots.
    pub fn is_container(&self) -> bool {
        self.kind().is_container()
    }

    /// Rebuild the body with a different child representation.
    ///
    /// `f` is called once per slot, `children` before `elseChildren`.
    pub fn map_children<D>(self, mut f: impl FnMut(Slot, Vec<C>) -> Vec<D>) -> BlockBody<D> {
        match self {
            BlockBody::Text { content } => BlockBody::Text { content },
            BlockBody::Input { variable_name } => BlockBody::Input { variable_name },
            BlockBody::LongText { variable_name } => BlockBody::LongText { variable_name },
            BlockBody::Number { variable_name } => BlockBody::Number { variable_name },
            BlockBody::Email { variable_name } => BlockBody::Email { variable_name },
            BlockBody::Date { variable_name } => BlockBody::Date { variable_name },
            BlockBody::Select { variable_name, options } => BlockBody::Select { variable_name, options },
            BlockBody::Radio { variable_name, options } => BlockBody::Radio { variable_name, options },
            BlockBody::Checkbox { variable_name, options } => {
                BlockBody::Checkbox { variable_name, options }
            }
            BlockBody::Signature { content, signature_id, signed_at } => {
                BlockBody::Signature { content, signature_id, signed_at }
            }
            BlockBody::Image { content } => BlockBody::Image { content },
            BlockBody::Video { content } => BlockBody::Video { content },
            BlockBody::Html { content } => BlockBody::Html { content },
            BlockBody::FileUpload { variable_name, content } => {
                BlockBody::FileUpload { variable_name, content }
            }
            BlockBody::SectionBreak {} => BlockBody::SectionBreak {},
            BlockBody::Formula { variable_name, formula } => BlockBody::Formula { variable_name, formula },
            BlockBody::Payment { payment_settings } => BlockBody::Payment { payment_settings },
            BlockBody::Currency { variable_name, currency_settings } => {
                BlockBody::Currency { variable_name, currency_settings }
            }
            BlockBody::Conditional { condition, children, else_children } => {
                let children = f(Slot::Children, children);
                let else_children = f(Slot::Else, else_children);
                BlockBody::Conditional { condition, children, else_children }
            }
            BlockBody::Repeater { variable_name, children } => BlockBody::Repeater {
                variable_name,
                children: f(Slot::Children, children),
            },
            BlockBody::Columns { children } => BlockBody::Columns {
                children: f(Slot::Children, children),
            },
            BlockBody::Column { width, children } => BlockBody::Column {
                width,
                children: f(Slot::Children, children),
            },
        }
    }
}

/// Fields shared by every block kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockFields {
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_party_id: Option<PartyId>,
}

/// Helper for `#[serde(skip_serializing_if)]` on bool fields.
fn is_false(v: &bool) -> bool {
    !v
}

/// A node of the document forest in its nested (wire) form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(flatten)]
    pub fields: BlockFields,
    #[serde(flatten)]
    pub body: BlockBody<Block>,
}

impl Block {
    /// Create a block with an explicit id and empty shared fields.
    pub fn new(id: impl Into<BlockId>, body: BlockBody<Block>) -> Self {
        Self {
            id: id.into(),
            fields: BlockFields::default(),
            body,
        }
    }

    /// Builder-style label setter.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.fields.label = label.into();
        self
    }

    /// Builder-style required flag.
    pub fn with_required(mut self, required: bool) -> Self {
        self.fields.required = required;
        self
    }

    /// Builder-style party assignment.
    pub fn assigned_to(mut self, party: impl Into<PartyId>) -> Self {
        self.fields.assigned_to_party_id = Some(party.into());
        self
    }

    pub fn kind(&self) -> BlockKind {
        self.body.kind()
    }

    /// Visit this block and every descendant depth-first, all slots.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Block)) {
        visit(self);
        for (_, children) in self.body.slots() {
            for child in children {
                child.walk(visit);
            }
        }
    }

    /// Count of this block plus all descendants.
    pub fn subtree_len(&self) -> usize {
        let mut n = 0;
        self.walk(&mut |_| n += 1);
        n
    }
}

/// Collect every block of a forest depth-first, across all slots.
pub fn flatten_forest(forest: &[Block]) -> Vec<&Block> {
    let mut out = Vec::new();
    for block in forest {
        block.walk(&mut |b| out.push(b));
    }
    out
}
