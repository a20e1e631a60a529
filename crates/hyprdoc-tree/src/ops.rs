//! Structural mutations: insert, update, delete, move, duplicate, and
//! signature application.
//!
//! Every operation addresses blocks by id and edits the arena's id lists in
//! place. Placement is resolved (and validated) before anything is touched,
//! so a rejected operation leaves the forest unchanged.
//!
//! Not-found handling differs by operation: insert and move fall back to a
//! root append, while update, delete, and apply_signature report
//! [`TreeError::BlockNotFound`].

use serde::{Deserialize, Serialize};
use strum::EnumString;

use hyprdoc_types::{
    Block, BlockBody, BlockId, BlockKind, Condition, CurrencySettings, PartyId, PaymentSettings,
    Slot,
};

use crate::arena::{BlockArena, Node, ParentRef, check_layout, verify_layout};
use crate::factory::{new_block, reissue_ids};
use crate::{Result, TreeError};

/// Where a block lands relative to its target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum Position {
    /// Immediately following the target in its parent's list.
    #[default]
    After,
    /// Appended to the target's `children`.
    Inside,
    /// Appended to a conditional target's `elseChildren`.
    InsideElse,
}

impl Position {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as std::str::FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::After => "after",
            Position::Inside => "inside",
            Position::InsideElse => "inside_else",
        }
    }
}

/// Resolved attachment point: which list, and which sibling to follow
/// (`None` appends to the end).
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Placement {
    pub parent: Option<ParentRef>,
    pub after: Option<BlockId>,
}

impl Placement {
    fn root() -> Self {
        Self { parent: None, after: None }
    }

    fn append(parent: ParentRef) -> Self {
        Self { parent: Some(parent), after: None }
    }
}

/// Partial update merged into a block by [`BlockArena::update`].
///
/// Each `Some` field is written; `None` fields are left alone. Fields that
/// do not exist on the target's kind reject the whole patch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockPatch {
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub required: Option<bool>,
    pub assigned_to_party_id: Option<PartyId>,
    /// Clear the party assignment.
    pub unassign: bool,
    pub content: Option<String>,
    pub variable_name: Option<String>,
    pub options: Option<Vec<String>>,
    /// Column width; goes through [`BlockArena::resize_column`].
    pub width: Option<f64>,
    pub condition: Option<Condition>,
    pub formula: Option<String>,
    pub signature_id: Option<String>,
    pub signed_at: Option<u64>,
    pub currency_settings: Option<CurrencySettings>,
    pub payment_settings: Option<PaymentSettings>,
}

impl BlockPatch {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Reject the patch if any of its fields is foreign to the body's kind.
    fn check(&self, id: &BlockId, body: &BlockBody<BlockId>) -> Result<()> {
        let kind = body.kind();
        let unsupported = |field| TreeError::UnsupportedField {
            id: id.clone(),
            field,
        };

        if self.content.is_some() && body.content().is_none() {
            return Err(unsupported("content"));
        }
        if self.variable_name.is_some() && body.variable_name().is_none() {
            return Err(unsupported("variableName"));
        }
        if self.options.is_some() && body.options().is_none() {
            return Err(unsupported("options"));
        }
        if let Some(width) = self.width {
            if kind != BlockKind::Column {
                return Err(unsupported("width"));
            }
            if !width.is_finite() {
                return Err(TreeError::InvalidWidth(width));
            }
        }
        if self.condition.is_some() && kind != BlockKind::Conditional {
            return Err(unsupported("condition"));
        }
        if self.formula.is_some() && kind != BlockKind::Formula {
            return Err(unsupported("formula"));
        }
        if self.signature_id.is_some() && kind != BlockKind::Signature {
            return Err(unsupported("signatureId"));
        }
        if self.signed_at.is_some() && kind != BlockKind::Signature {
            return Err(unsupported("signedAt"));
        }
        if self.currency_settings.is_some() && kind != BlockKind::Currency {
            return Err(unsupported("currencySettings"));
        }
        if self.payment_settings.is_some() && kind != BlockKind::Payment {
            return Err(unsupported("paymentSettings"));
        }
        Ok(())
    }

    /// Write every field except `width`. Call [`check`](Self::check) first.
    fn write(&self, node: &mut Node) {
        let fields = &mut node.fields;
        if let Some(label) = &self.label {
            fields.label = label.clone();
        }
        if let Some(placeholder) = &self.placeholder {
            fields.placeholder = Some(placeholder.clone());
        }
        if let Some(required) = self.required {
            fields.required = required;
        }
        if self.unassign {
            fields.assigned_to_party_id = None;
        }
        if let Some(party) = &self.assigned_to_party_id {
            fields.assigned_to_party_id = Some(party.clone());
        }

        let body = &mut node.body;
        if let Some(content) = &self.content
            && let Some(slot) = body.content_mut()
        {
            *slot = content.clone();
        }
        if let Some(name) = &self.variable_name
            && let Some(slot) = body.variable_name_mut()
        {
            *slot = name.clone();
        }
        if let Some(options) = &self.options
            && let Some(slot) = body.options_mut()
        {
            *slot = options.clone();
        }

        match body {
            BlockBody::Conditional { condition, .. } => {
                if let Some(c) = &self.condition {
                    *condition = c.clone();
                }
            }
            BlockBody::Formula { formula, .. } => {
                if let Some(f) = &self.formula {
                    *formula = f.clone();
                }
            }
            BlockBody::Signature { signature_id, signed_at, .. } => {
                if let Some(s) = &self.signature_id {
                    *signature_id = Some(s.clone());
                }
                if let Some(t) = self.signed_at {
                    *signed_at = Some(t);
                }
            }
            BlockBody::Currency { currency_settings, .. } => {
                if let Some(s) = &self.currency_settings {
                    *currency_settings = s.clone();
                }
            }
            BlockBody::Payment { payment_settings } => {
                if let Some(s) = &self.payment_settings {
                    *payment_settings = s.clone();
                }
            }
            _ => {}
        }
    }
}

/// A captured signature, as applied to a signature block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureData {
    /// Signature image as a data URL.
    pub asset: String,
    /// Unix millis.
    pub signed_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_id: Option<String>,
}

impl SignatureData {
    /// Signature stamped with the current time.
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            signed_at: hyprdoc_types::now_millis(),
            signature_id: None,
        }
    }

    pub fn with_signature_id(mut self, id: impl Into<String>) -> Self {
        self.signature_id = Some(id.into());
        self
    }
}

/// Levels occupied by a nested block (1 for a leaf).
fn block_height(block: &Block) -> usize {
    1 + block
        .body
        .slots()
        .into_iter()
        .flat_map(|(_, kids)| kids.iter())
        .map(block_height)
        .max()
        .unwrap_or(0)
}

impl BlockArena {
    // =========================================================================
    // Placement
    // =========================================================================

    /// Work out where a block of `kind` lands for `(target, position)`.
    ///
    /// - no target, or an unknown one, appends to the root
    /// - `inside` a leaf falls back to `after` it
    /// - a non-column `inside` a row goes to the end of its last column
    /// - a non-column `after` a column goes to the end of that column
    /// - a column anywhere but a row is rejected
    pub(crate) fn resolve_placement(
        &self,
        id: &BlockId,
        kind: BlockKind,
        target: Option<&BlockId>,
        position: Position,
    ) -> Result<Placement> {
        let Some(target) = target else {
            check_layout(kind, None, id)?;
            return Ok(Placement::root());
        };
        let Some(node) = self.get(target) else {
            tracing::warn!(target = %target, "insert target not found, appending to root");
            check_layout(kind, None, id)?;
            return Ok(Placement::root());
        };

        let placement = match (position, node.kind()) {
            (Position::Inside | Position::InsideElse, BlockKind::Columns) => {
                if kind == BlockKind::Column {
                    Placement::append(ParentRef::children(target.clone()))
                } else {
                    match node.children().last() {
                        Some(last) => Placement::append(ParentRef::children(last.clone())),
                        None => self.placement_after(target),
                    }
                }
            }
            (Position::InsideElse, BlockKind::Conditional) => {
                Placement::append(ParentRef::new(target.clone(), Slot::Else))
            }
            (Position::Inside | Position::InsideElse, k) if k.is_container() => {
                Placement::append(ParentRef::children(target.clone()))
            }
            (Position::After, BlockKind::Column) if kind != BlockKind::Column => {
                Placement::append(ParentRef::children(target.clone()))
            }
            _ => self.placement_after(target),
        };

        let parent_kind = placement
            .parent
            .as_ref()
            .and_then(|p| self.get(&p.id))
            .map(|n| n.kind());
        check_layout(kind, parent_kind, id)?;
        Ok(placement)
    }

    fn placement_after(&self, target: &BlockId) -> Placement {
        Placement {
            parent: self.parent_of(target).cloned(),
            after: Some(target.clone()),
        }
    }

    /// Depth (0 for roots) of a block placed into `parent`.
    fn slot_depth(&self, parent: Option<&ParentRef>) -> usize {
        parent.map_or(0, |p| self.depth(&p.id) + 1)
    }

    fn check_depth(&self, placement: &Placement, height: usize) -> Result<()> {
        let depth = self.slot_depth(placement.parent.as_ref()) + height.saturating_sub(1);
        if depth > self.config.max_depth {
            return Err(TreeError::TooDeep {
                depth,
                max: self.config.max_depth,
            });
        }
        Ok(())
    }

    /// Link an already-registered node at a resolved placement.
    fn link_at(&mut self, id: &BlockId, placement: Placement) {
        let index = match &placement.after {
            Some(anchor) => self.index_of(anchor).map_or(usize::MAX, |i| i + 1),
            None => usize::MAX,
        };
        self.link(id, placement.parent, index);
    }

    /// The row a parent edge points into, if it is one.
    pub(crate) fn row_of(&self, parent: Option<&ParentRef>) -> Option<BlockId> {
        let parent = parent?;
        (self.get(&parent.id)?.kind() == BlockKind::Columns).then(|| parent.id.clone())
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Create a block of `kind` via the factory and attach it.
    ///
    /// Returns the new block's id.
    pub fn insert(
        &mut self,
        kind: BlockKind,
        target: Option<&BlockId>,
        position: Position,
    ) -> Result<BlockId> {
        self.insert_block(new_block(kind), target, position)
    }

    /// Attach an already-built subtree using the insert placement rules.
    pub fn insert_block(
        &mut self,
        block: Block,
        target: Option<&BlockId>,
        position: Position,
    ) -> Result<BlockId> {
        self.check_fresh_ids(&block)?;
        for (_, kids) in block.body.slots() {
            verify_layout(kids, Some(block.kind()))?;
        }
        let placement = self.resolve_placement(&block.id, block.kind(), target, position)?;
        self.check_depth(&placement, block_height(&block))?;

        let kind = block.kind();
        let row = self.row_of(placement.parent.as_ref());
        let id = self.import(block, placement.parent.clone());
        self.link_at(&id, placement);
        if let Some(row) = row {
            self.equalize_widths(&row)?;
        }

        tracing::debug!(block = %id, %kind, "inserted block");
        Ok(id)
    }

    /// Merge a patch into the block at any depth.
    pub fn update(&mut self, id: &BlockId, patch: &BlockPatch) -> Result<()> {
        patch.check(id, &self.node(id)?.body)?;
        patch.write(self.node_mut(id)?);
        if let Some(width) = patch.width {
            self.resize_column(id, width)?;
        }
        tracing::debug!(block = %id, "updated block");
        Ok(())
    }

    /// Remove a block and its whole subtree, across all slots.
    ///
    /// Returns every removed id (root of the subtree first) so callers can
    /// drop selection state.
    pub fn delete(&mut self, id: &BlockId) -> Result<Vec<BlockId>> {
        let removed: Vec<BlockId> = self.subtree(id).iter().map(|n| n.id.clone()).collect();
        if removed.is_empty() {
            return Err(TreeError::BlockNotFound(id.clone()));
        }

        let parent = self.parent_of(id).cloned();
        self.unlink(id);
        for gone in &removed {
            self.nodes.remove(gone);
        }
        if let Some(row) = self.row_of(parent.as_ref()) {
            self.normalize_widths(&row)?;
        }

        tracing::debug!(block = %id, count = removed.len(), "deleted subtree");
        Ok(removed)
    }

    /// Move a subtree next to or into `target`.
    ///
    /// A missing target, or one inside the dragged subtree, sends the block
    /// to the end of the root list. Moving a block onto itself does nothing.
    pub fn move_block(
        &mut self,
        dragged: &BlockId,
        target: Option<&BlockId>,
        position: Position,
    ) -> Result<()> {
        let kind = self.node(dragged)?.kind();
        if target == Some(dragged) {
            return Ok(());
        }
        let target = match target {
            Some(t) if self.is_within(t, dragged) => {
                tracing::warn!(dragged = %dragged, target = %t, "move target inside dragged subtree, appending to root");
                None
            }
            other => other,
        };

        let placement = self.resolve_placement(dragged, kind, target, position)?;
        self.check_depth(&placement, self.height(dragged))?;

        let from_row = self.row_of(self.parent_of(dragged));
        let to_row = self.row_of(placement.parent.as_ref());

        self.unlink(dragged);
        self.link_at(dragged, placement);

        if from_row != to_row {
            if let Some(row) = from_row {
                self.normalize_widths(&row)?;
            }
            if let Some(row) = to_row {
                self.equalize_widths(&row)?;
            }
        }

        tracing::debug!(block = %dragged, "moved block");
        Ok(())
    }

    /// Deep-copy a subtree with fresh ids and place it right after the
    /// original. Returns the copy's id.
    pub fn duplicate(&mut self, id: &BlockId) -> Result<BlockId> {
        let original = self
            .build_block(id)
            .ok_or_else(|| TreeError::BlockNotFound(id.clone()))?;
        let copy = reissue_ids(original);

        let placement = self.placement_after(id);
        let row = self.row_of(placement.parent.as_ref());
        let copy_id = self.import(copy, placement.parent.clone());
        self.link_at(&copy_id, placement);
        if let Some(row) = row {
            self.equalize_widths(&row)?;
        }

        tracing::debug!(block = %id, copy = %copy_id, "duplicated block");
        Ok(copy_id)
    }

    /// Fill a signature block: asset into `content`, stamp `signedAt`, and
    /// record the signature id when given.
    pub fn apply_signature(&mut self, id: &BlockId, data: &SignatureData) -> Result<()> {
        let node = self.node_mut(id)?;
        let BlockBody::Signature {
            content,
            signature_id,
            signed_at,
        } = &mut node.body
        else {
            return Err(TreeError::UnsupportedOperation {
                id: id.clone(),
                operation: "apply_signature",
            });
        };

        *content = data.asset.clone();
        *signed_at = Some(data.signed_at);
        if let Some(sid) = &data.signature_id {
            *signature_id = Some(sid.clone());
        }

        tracing::debug!(block = %id, "applied signature");
        Ok(())
    }
}
