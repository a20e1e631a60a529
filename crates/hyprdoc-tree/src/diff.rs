//! Snapshot diff: classify every block of the live forest against the
//! forest captured at send time.
//!
//! Lookup is per level. A block's children are compared against the
//! children of the snapshot block with the same id (slot by slot), so a
//! block moved under a different parent reads as `added`. Blocks present
//! only in the snapshot are not reported.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use hyprdoc_types::{Block, BlockId, Slot};

/// Classification of one block against the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    /// No block with this id at this level of the snapshot.
    Added,
    /// Same id, but content, label, or options differ.
    Modified,
    Unchanged,
}

impl DiffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffStatus::Added => "added",
            DiffStatus::Modified => "modified",
            DiffStatus::Unchanged => "unchanged",
        }
    }
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify every block of `current`.
///
/// With no snapshot the result is empty. Otherwise every id of `current`,
/// at any depth and in any slot, appears exactly once.
pub fn diff_blocks(current: &[Block], snapshot: Option<&[Block]>) -> BTreeMap<BlockId, DiffStatus> {
    let mut out = BTreeMap::new();
    if let Some(snapshot) = snapshot {
        diff_level(current, snapshot, &mut out);
    }
    out
}

fn diff_level(current: &[Block], snapshot: &[Block], out: &mut BTreeMap<BlockId, DiffStatus>) {
    let lookup: HashMap<&BlockId, &Block> = snapshot.iter().map(|b| (&b.id, b)).collect();

    for block in current {
        let before = lookup.get(&block.id).copied();
        let status = match before {
            None => DiffStatus::Added,
            Some(old) if is_modified(block, old) => DiffStatus::Modified,
            Some(_) => DiffStatus::Unchanged,
        };
        out.insert(block.id.clone(), status);

        for (slot, children) in block.body.slots() {
            let old_children = before.map_or(&[][..], |old| snapshot_slot(old, slot));
            diff_level(children, old_children, out);
        }
    }
}

fn snapshot_slot(block: &Block, slot: Slot) -> &[Block] {
    block.body.slot(slot).map_or(&[][..], |v| v.as_slice())
}

fn is_modified(block: &Block, old: &Block) -> bool {
    block.body.content() != old.body.content()
        || block.fields.label != old.fields.label
        || options_json(block) != options_json(old)
}

/// Options compared in serialized form.
fn options_json(block: &Block) -> Option<String> {
    block
        .body
        .options()
        .and_then(|opts| serde_json::to_string(opts).ok())
}

/// Count blocks per status.
pub fn summarize(diff: &BTreeMap<BlockId, DiffStatus>) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for status in diff.values() {
        *counts.entry(status.as_str()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyprdoc_types::{BlockBody, Condition};

    fn text(id: &str, content: &str) -> Block {
        Block::new(id, BlockBody::Text { content: content.into() })
    }

    fn select(id: &str, options: &[&str]) -> Block {
        Block::new(
            id,
            BlockBody::Select {
                variable_name: "v".into(),
                options: options.iter().map(|s| s.to_string()).collect(),
            },
        )
    }

    fn conditional(id: &str, children: Vec<Block>, else_children: Vec<Block>) -> Block {
        Block::new(
            id,
            BlockBody::Conditional {
                condition: Condition::default(),
                children,
                else_children,
            },
        )
    }

    fn status(diff: &BTreeMap<BlockId, DiffStatus>, id: &str) -> DiffStatus {
        diff[&BlockId::from(id)]
    }

    #[test]
    fn test_no_snapshot_is_empty() {
        assert!(diff_blocks(&[text("a", "x")], None).is_empty());
    }

    #[test]
    fn test_classification() {
        let snapshot = vec![text("a", "hello"), text("b", "same"), select("s", &["x", "y"])];
        let current = vec![
            text("a", "hello, world"),
            text("b", "same"),
            select("s", &["x", "y"]),
            text("new", ""),
        ];
        let diff = diff_blocks(&current, Some(&snapshot));
        assert_eq!(status(&diff, "a"), DiffStatus::Modified);
        assert_eq!(status(&diff, "b"), DiffStatus::Unchanged);
        assert_eq!(status(&diff, "s"), DiffStatus::Unchanged);
        assert_eq!(status(&diff, "new"), DiffStatus::Added);
    }

    #[test]
    fn test_label_and_options_changes() {
        let snapshot = vec![text("a", "x").with_label("Old"), select("s", &["x", "y"])];
        let current = vec![text("a", "x").with_label("New"), select("s", &["y", "x"])];
        let diff = diff_blocks(&current, Some(&snapshot));
        assert_eq!(status(&diff, "a"), DiffStatus::Modified);
        assert_eq!(status(&diff, "s"), DiffStatus::Modified);
    }

    #[test]
    fn test_deleted_blocks_not_reported() {
        let snapshot = vec![text("a", "x"), text("gone", "y")];
        let current = vec![text("a", "x")];
        let diff = diff_blocks(&current, Some(&snapshot));
        assert_eq!(diff.len(), 1);
        assert!(!diff.contains_key(&BlockId::from("gone")));
    }

    #[test]
    fn test_recurses_into_both_slots() {
        let snapshot = vec![conditional("c", vec![text("yes", "1")], vec![text("no", "2")])];
        let current = vec![conditional(
            "c",
            vec![text("yes", "1")],
            vec![text("no", "changed"), text("extra", "")],
        )];
        let diff = diff_blocks(&current, Some(&snapshot));
        assert_eq!(diff.len(), 4);
        assert_eq!(status(&diff, "c"), DiffStatus::Unchanged);
        assert_eq!(status(&diff, "yes"), DiffStatus::Unchanged);
        assert_eq!(status(&diff, "no"), DiffStatus::Modified);
        assert_eq!(status(&diff, "extra"), DiffStatus::Added);
    }

    #[test]
    fn test_block_moved_to_new_parent_reads_as_added() {
        let snapshot = vec![text("a", "x"), conditional("c", vec![], vec![])];
        let current = vec![conditional("c", vec![text("a", "x")], vec![])];
        let diff = diff_blocks(&current, Some(&snapshot));
        assert_eq!(status(&diff, "a"), DiffStatus::Added);
    }

    #[test]
    fn test_children_of_added_parent_are_added() {
        let snapshot = vec![];
        let current = vec![conditional("c", vec![text("x", "")], vec![text("y", "")])];
        let diff = diff_blocks(&current, Some(&snapshot));
        assert!(diff.values().all(|s| *s == DiffStatus::Added));
        assert_eq!(diff.len(), 3);
    }

    #[test]
    fn test_summarize() {
        let snapshot = vec![text("a", "x")];
        let current = vec![text("a", "y"), text("b", "")];
        let counts = summarize(&diff_blocks(&current, Some(&snapshot)));
        assert_eq!(counts.get("modified"), Some(&1));
        assert_eq!(counts.get("added"), Some(&1));
        assert_eq!(counts.get("unchanged"), None);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&DiffStatus::Modified).unwrap(), "\"modified\"");
    }
}
