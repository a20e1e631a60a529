//! Arena-backed block forest.
//!
//! Blocks live in a flat map keyed by [`BlockId`]. Containers store their
//! children as id lists inside their [`BlockBody<BlockId>`]; every node
//! records the parent edge `(parent id, slot)` it hangs from. Root order is
//! its own id list.
//!
//! ```text
//! roots: [a, row]
//! nodes:
//!   a    { parent: None,              body: Text }
//!   row  { parent: None,              body: Columns { children: [c1, c2] } }
//!   c1   { parent: (row, children),   body: Column { width: 50, children: [b] } }
//!   c2   { parent: (row, children),   body: Column { width: 50, children: [] } }
//!   b    { parent: (c1, children),    body: Input }
//! ```
//!
//! Id uniqueness is a property of the map itself. Mutations are index
//! operations on the id lists: nothing is deep-cloned on edit. The nested
//! [`Block`] form is only materialized at the edges ([`BlockArena::from_forest`],
//! [`BlockArena::to_forest`], detach).

use std::collections::{HashMap, HashSet};

use hyprdoc_types::{Block, BlockBody, BlockFields, BlockId, BlockKind, Slot, flatten_forest};

use crate::layout::set_width;
use crate::{Result, TreeConfig, TreeError};

/// Tolerance when checking that a row's widths sum to 100.
pub(crate) const WIDTH_EPSILON: f64 = 1e-6;

/// The edge from a node up to its container.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParentRef {
    pub id: BlockId,
    pub slot: Slot,
}

impl ParentRef {
    pub fn new(id: BlockId, slot: Slot) -> Self {
        Self { id, slot }
    }

    pub fn children(id: BlockId) -> Self {
        Self::new(id, Slot::Children)
    }
}

/// A block stored in the arena.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: BlockId,
    pub fields: BlockFields,
    pub body: BlockBody<BlockId>,
    pub(crate) parent: Option<ParentRef>,
}

impl Node {
    pub fn kind(&self) -> BlockKind {
        self.body.kind()
    }

    /// The container edge, or `None` for roots.
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// Ids in the `children` slot (empty for leaves).
    pub fn children(&self) -> &[BlockId] {
        self.body.slot(Slot::Children).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// The document forest.
#[derive(Clone, Debug, Default)]
pub struct BlockArena {
    pub(crate) nodes: HashMap<BlockId, Node>,
    pub(crate) roots: Vec<BlockId>,
    pub(crate) config: TreeConfig,
}

impl BlockArena {
    /// Create an empty forest with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty forest with explicit limits.
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            config,
        }
    }

    /// Load a nested forest with default limits.
    pub fn from_forest(forest: Vec<Block>) -> Result<Self> {
        Self::from_forest_with_config(forest, TreeConfig::default())
    }

    /// Load a nested forest.
    ///
    /// Rejects duplicate ids and misplaced columns. Widths outside 0..=100
    /// are clamped, and rows whose widths have drifted away from 100 are
    /// rescaled on load.
    pub fn from_forest_with_config(forest: Vec<Block>, config: TreeConfig) -> Result<Self> {
        let mut seen = HashSet::new();
        for block in flatten_forest(&forest) {
            if !seen.insert(block.id.clone()) {
                return Err(TreeError::DuplicateBlock(block.id.clone()));
            }
        }
        verify_layout(&forest, None)?;

        let mut arena = Self::with_config(config);
        for block in forest {
            let id = arena.import(block, None);
            arena.roots.push(id);
        }

        let rows: Vec<BlockId> = arena
            .nodes
            .values()
            .filter(|n| n.kind() == BlockKind::Columns && !n.children().is_empty())
            .map(|n| n.id.clone())
            .collect();
        for row in rows {
            let mut clamped = false;
            for column in arena.children_of(&row, Slot::Children).to_vec() {
                let width = arena.get(&column).and_then(|n| n.body.width()).unwrap_or(0.0);
                if !(0.0..=100.0).contains(&width) {
                    tracing::warn!(column = %column, width, "column width out of range, clamping");
                    let width = if width.is_nan() { 0.0 } else { width.clamp(0.0, 100.0) };
                    set_width(&mut arena, &column, width);
                    clamped = true;
                }
            }
            let sum: f64 = arena.row_widths(&row).iter().sum();
            if clamped || (sum - 100.0).abs() > WIDTH_EPSILON {
                tracing::warn!(row = %row, sum, "column widths drifted, normalizing");
                arena.normalize_widths(&row)?;
            }
        }

        Ok(arena)
    }

    /// Materialize the nested forest, in order.
    pub fn to_forest(&self) -> Vec<Block> {
        self.roots.iter().filter_map(|id| self.build_block(id)).collect()
    }

    /// Materialize one subtree as a nested block.
    pub fn build_block(&self, id: &BlockId) -> Option<Block> {
        let node = self.nodes.get(id)?;
        let body = node
            .body
            .clone()
            .map_children(|_, kids| kids.iter().filter_map(|k| self.build_block(k)).collect());
        Some(Block {
            id: node.id.clone(),
            fields: node.fields.clone(),
            body,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of blocks at any depth.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &BlockId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Root ids in document order.
    pub fn roots(&self) -> &[BlockId] {
        &self.roots
    }

    /// Child ids of `id` in `slot` (empty if absent or a leaf).
    pub fn children_of(&self, id: &BlockId, slot: Slot) -> &[BlockId] {
        self.nodes
            .get(id)
            .and_then(|n| n.body.slot(slot))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, id: &BlockId) -> Option<&ParentRef> {
        self.nodes.get(id)?.parent.as_ref()
    }

    /// Position of `id` within its parent's list (or the root list).
    pub fn index_of(&self, id: &BlockId) -> Option<usize> {
        let parent = self.nodes.get(id)?.parent.as_ref();
        self.list(parent)?.iter().position(|c| c == id)
    }

    /// Widths of the columns in a row, in order.
    pub fn row_widths(&self, row: &BlockId) -> Vec<f64> {
        self.children_of(row, Slot::Children)
            .iter()
            .filter_map(|c| self.nodes.get(c)?.body.width())
            .collect()
    }

    // =========================================================================
    // Primitives
    // =========================================================================

    pub(crate) fn node_mut(&mut self, id: &BlockId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| TreeError::BlockNotFound(id.clone()))
    }

    pub(crate) fn node(&self, id: &BlockId) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| TreeError::BlockNotFound(id.clone()))
    }

    /// The id list a parent edge points into.
    pub(crate) fn list(&self, parent: Option<&ParentRef>) -> Option<&Vec<BlockId>> {
        match parent {
            None => Some(&self.roots),
            Some(p) => self.nodes.get(&p.id)?.body.slot(p.slot),
        }
    }

    pub(crate) fn list_mut(&mut self, parent: Option<&ParentRef>) -> Option<&mut Vec<BlockId>> {
        match parent {
            None => Some(&mut self.roots),
            Some(p) => self.nodes.get_mut(&p.id)?.body.slot_mut(p.slot),
        }
    }

    /// Register a nested block and its descendants. The caller links the
    /// returned id into a list.
    pub(crate) fn import(&mut self, block: Block, parent: Option<ParentRef>) -> BlockId {
        let Block { id, fields, body } = block;
        let body = body.map_children(|slot, kids| {
            kids.into_iter()
                .map(|kid| self.import(kid, Some(ParentRef::new(id.clone(), slot))))
                .collect()
        });
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                fields,
                body,
                parent,
            },
        );
        id
    }

    /// Remove a node and its descendants from the map, returning the nested
    /// block. The caller must already have unlinked it.
    pub(crate) fn export(&mut self, id: &BlockId) -> Option<Block> {
        let Node { id, fields, body, .. } = self.nodes.remove(id)?;
        let body = body.map_children(|_, kids| kids.iter().filter_map(|k| self.export(k)).collect());
        Some(Block { id, fields, body })
    }

    /// Remove `id` from its parent's list. Returns where it was.
    pub(crate) fn unlink(&mut self, id: &BlockId) -> Option<(Option<ParentRef>, usize)> {
        let parent = self.nodes.get(id)?.parent.clone();
        let list = self.list_mut(parent.as_ref())?;
        let idx = list.iter().position(|c| c == id)?;
        list.remove(idx);
        Some((parent, idx))
    }

    /// Splice `id` into a list at `index` (clamped) and record the edge.
    pub(crate) fn link(&mut self, id: &BlockId, parent: Option<ParentRef>, index: usize) {
        let linked = match self.list_mut(parent.as_ref()) {
            Some(list) => {
                let idx = index.min(list.len());
                list.insert(idx, id.clone());
                true
            }
            None => false,
        };
        debug_assert!(linked, "link target {parent:?} has no such slot");
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = parent;
        }
    }

    /// Unlink and remove a subtree, returning it in nested form.
    pub fn detach(&mut self, id: &BlockId) -> Option<Block> {
        self.unlink(id)?;
        self.export(id)
    }

    /// Fail if any id of `block` is already present or repeated.
    pub(crate) fn check_fresh_ids(&self, block: &Block) -> Result<()> {
        let mut seen = HashSet::new();
        let mut clash = None;
        block.walk(&mut |b| {
            if clash.is_none() && (self.nodes.contains_key(&b.id) || !seen.insert(&b.id)) {
                clash = Some(b.id.clone());
            }
        });
        match clash {
            Some(id) => Err(TreeError::DuplicateBlock(id)),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    /// Check every structural invariant of the forest.
    ///
    /// - every stored node is reachable from the roots exactly once
    /// - parent edges agree with the child lists
    /// - `columns` holds only `column`, and `column` only lives in `columns`
    /// - column widths are within 0..=100 and non-empty rows sum to 100
    pub fn validate(&self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut stack: Vec<(Option<ParentRef>, BlockId)> =
            self.roots.iter().rev().map(|id| (None, id.clone())).collect();

        while let Some((expected_parent, id)) = stack.pop() {
            if !visited.insert(id.clone()) {
                return Err(TreeError::Corrupt(format!("{id} reachable more than once")));
            }
            let node = self
                .nodes
                .get(&id)
                .ok_or_else(|| TreeError::Corrupt(format!("dangling child {id}")))?;
            if node.parent != expected_parent {
                return Err(TreeError::Corrupt(format!(
                    "{id} records parent {:?}, found under {:?}",
                    node.parent, expected_parent
                )));
            }

            let parent_kind = expected_parent
                .as_ref()
                .and_then(|p| self.nodes.get(&p.id))
                .map(|n| n.kind());
            check_layout(node.kind(), parent_kind, &id)?;

            if let Some(width) = node.body.width()
                && !(0.0..=100.0).contains(&width)
            {
                return Err(TreeError::Corrupt(format!("{id} has width {width}")));
            }
            if node.kind() == BlockKind::Columns && !node.children().is_empty() {
                let sum: f64 = self.row_widths(&id).iter().sum();
                if (sum - 100.0).abs() > 1e-3 {
                    return Err(TreeError::Corrupt(format!("row {id} widths sum to {sum}")));
                }
            }

            for (slot, kids) in node.body.slots().into_iter().rev() {
                for kid in kids.iter().rev() {
                    stack.push((Some(ParentRef::new(id.clone(), slot)), kid.clone()));
                }
            }
        }

        if visited.len() != self.nodes.len() {
            return Err(TreeError::Corrupt(format!(
                "{} orphaned nodes",
                self.nodes.len() - visited.len()
            )));
        }
        Ok(())
    }
}

/// `column` only inside `columns`, and `columns` holds only `column`.
pub(crate) fn check_layout(kind: BlockKind, parent: Option<BlockKind>, id: &BlockId) -> Result<()> {
    let in_row = parent == Some(BlockKind::Columns);
    if kind == BlockKind::Column && !in_row {
        return Err(TreeError::InvalidPlacement {
            id: id.clone(),
            reason: "a column can only live inside a columns row",
        });
    }
    if kind != BlockKind::Column && in_row {
        return Err(TreeError::InvalidPlacement {
            id: id.clone(),
            reason: "a columns row can only hold columns",
        });
    }
    Ok(())
}

/// Recursively check column placement over a nested list.
pub(crate) fn verify_layout(list: &[Block], parent: Option<BlockKind>) -> Result<()> {
    for block in list {
        check_layout(block.kind(), parent, &block.id)?;
        for (_, kids) in block.body.slots() {
            verify_layout(kids, Some(block.kind()))?;
        }
    }
    Ok(())
}
