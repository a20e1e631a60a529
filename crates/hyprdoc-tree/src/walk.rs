//! Traversal over the arena.
//!
//! Every walk covers all child slots (`children` then `elseChildren`), so a
//! required signature tucked into a conditional's else branch is seen by the
//! completion gate, the diff, and delete alike.

use std::collections::HashSet;

use hyprdoc_types::{BlockId, BlockKind};

use crate::arena::{BlockArena, Node};

/// Maximum expected tree depth. Traversal code uses this as a circuit breaker.
///
/// Real documents rarely nest past 5 (columns → column → conditional → leaf).
/// Exceeding 512 indicates corruption.
pub const MAX_TREE_DEPTH: usize = 512;

impl BlockArena {
    /// Iterate blocks in document (depth-first) order.
    ///
    /// Returns (depth, node) pairs where depth is 0 for roots.
    pub fn iter_dfs(&self) -> impl Iterator<Item = (usize, &Node)> {
        DfsIterator::new(self, self.roots.iter().rev().map(|id| (0, id.clone())).collect())
    }

    /// Every node in document order.
    pub fn flatten(&self) -> Vec<&Node> {
        self.iter_dfs().map(|(_, n)| n).collect()
    }

    /// All ids in document order.
    pub fn ids(&self) -> Vec<BlockId> {
        self.iter_dfs().map(|(_, n)| n.id.clone()).collect()
    }

    /// The subtree rooted at `root`, root first, in document order.
    pub fn subtree(&self, root: &BlockId) -> Vec<&Node> {
        if !self.contains(root) {
            return Vec::new();
        }
        DfsIterator::new(self, vec![(0, root.clone())]).map(|(_, n)| n).collect()
    }

    /// Get the depth of a block (0 for roots).
    ///
    /// Circuit-breaks at `MAX_TREE_DEPTH`.
    pub fn depth(&self, id: &BlockId) -> usize {
        self.ancestors(id).len()
    }

    /// Ancestors of a block, from immediate parent to root.
    ///
    /// Circuit-breaks at `MAX_TREE_DEPTH`.
    pub fn ancestors(&self, id: &BlockId) -> Vec<&Node> {
        let mut result = Vec::new();
        let mut current = self.get(id);

        while let Some(node) = current {
            if result.len() >= MAX_TREE_DEPTH {
                tracing::warn!("ancestors() hit MAX_TREE_DEPTH ({MAX_TREE_DEPTH}), truncating");
                break;
            }
            match node.parent().and_then(|p| self.get(&p.id)) {
                Some(parent) => {
                    result.push(parent);
                    current = Some(parent);
                }
                None => break,
            }
        }

        result
    }

    /// Check whether `id` is `root` or lies somewhere beneath it.
    pub fn is_within(&self, id: &BlockId, root: &BlockId) -> bool {
        id == root || self.ancestors(id).iter().any(|a| &a.id == root)
    }

    /// Height of the subtree at `id` (1 for a leaf).
    pub fn height(&self, id: &BlockId) -> usize {
        DfsIterator::new(self, vec![(0, id.clone())])
            .map(|(d, _)| d + 1)
            .max()
            .unwrap_or(0)
    }

    /// Nodes of a given kind, in document order.
    pub fn of_kind(&self, kind: BlockKind) -> Vec<&Node> {
        self.iter_dfs().map(|(_, n)| n).filter(|n| n.kind() == kind).collect()
    }
}

/// Depth-first iterator over arena nodes.
///
/// Tracks visited nodes to protect against corrupted edges. Circuit-breaks
/// past `MAX_TREE_DEPTH` levels.
struct DfsIterator<'a> {
    arena: &'a BlockArena,
    stack: Vec<(usize, BlockId)>,
    visited: HashSet<BlockId>,
}

impl<'a> DfsIterator<'a> {
    fn new(arena: &'a BlockArena, stack: Vec<(usize, BlockId)>) -> Self {
        Self {
            arena,
            stack,
            visited: HashSet::new(),
        }
    }
}

impl<'a> Iterator for DfsIterator<'a> {
    type Item = (usize, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((depth, id)) = self.stack.pop() {
            if !self.visited.insert(id.clone()) {
                continue; // already visited (corrupt edge)
            }
            if depth > MAX_TREE_DEPTH {
                tracing::warn!("DFS iterator hit MAX_TREE_DEPTH ({MAX_TREE_DEPTH}), skipping subtree");
                continue;
            }
            if let Some(node) = self.arena.get(&id) {
                // Push slots and children in reverse so `children` pops first
                for (_, kids) in node.body.slots().into_iter().rev() {
                    for kid in kids.iter().rev() {
                        self.stack.push((depth + 1, kid.clone()));
                    }
                }
                return Some((depth, node));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyprdoc_types::{Block, BlockBody, Condition};

    fn text(id: &str) -> Block {
        Block::new(id, BlockBody::Text { content: id.into() })
    }

    fn sample() -> BlockArena {
        let cond = Block::new(
            "cond",
            BlockBody::Conditional {
                condition: Condition::default(),
                children: vec![text("yes")],
                else_children: vec![text("no")],
            },
        );
        let row = Block::new(
            "row",
            BlockBody::Columns {
                children: vec![
                    Block::new("c1", BlockBody::Column { width: 50.0, children: vec![cond] }),
                    Block::new("c2", BlockBody::Column { width: 50.0, children: vec![text("b")] }),
                ],
            },
        );
        BlockArena::from_forest(vec![text("a"), row, text("z")]).unwrap()
    }

    fn ids(nodes: &[&Node]) -> Vec<String> {
        nodes.iter().map(|n| n.id.as_str().to_string()).collect()
    }

    #[test]
    fn test_dfs_order_covers_else_branch() {
        let arena = sample();
        assert_eq!(
            ids(&arena.flatten()),
            ["a", "row", "c1", "cond", "yes", "no", "c2", "b", "z"]
        );
    }

    #[test]
    fn test_dfs_depths() {
        let arena = sample();
        let depths: Vec<_> = arena.iter_dfs().map(|(d, _)| d).collect();
        assert_eq!(depths, [0, 0, 1, 2, 3, 3, 1, 2, 0]);
    }

    #[test]
    fn test_subtree() {
        let arena = sample();
        assert_eq!(ids(&arena.subtree(&BlockId::from("c1"))), ["c1", "cond", "yes", "no"]);
        assert!(arena.subtree(&BlockId::from("missing")).is_empty());
    }

    #[test]
    fn test_ancestors_and_depth() {
        let arena = sample();
        let no = BlockId::from("no");
        assert_eq!(ids(&arena.ancestors(&no)), ["cond", "c1", "row"]);
        assert_eq!(arena.depth(&no), 3);
        assert_eq!(arena.depth(&BlockId::from("a")), 0);
    }

    #[test]
    fn test_is_within() {
        let arena = sample();
        assert!(arena.is_within(&BlockId::from("yes"), &BlockId::from("row")));
        assert!(arena.is_within(&BlockId::from("row"), &BlockId::from("row")));
        assert!(!arena.is_within(&BlockId::from("a"), &BlockId::from("row")));
    }

    #[test]
    fn test_height() {
        let arena = sample();
        assert_eq!(arena.height(&BlockId::from("row")), 4);
        assert_eq!(arena.height(&BlockId::from("a")), 1);
    }

    #[test]
    fn test_of_kind() {
        let arena = sample();
        assert_eq!(ids(&arena.of_kind(BlockKind::Column)), ["c1", "c2"]);
    }
}
