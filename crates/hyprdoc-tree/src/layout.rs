//! Column layout: split a block into a two-column row, ungroup a row back
//! into a flat list, and keep a row's widths summing to 100.

use serde::{Deserialize, Serialize};
use strum::EnumString;

use hyprdoc_types::{BlockBody, BlockId, BlockKind, Slot};

use crate::arena::{BlockArena, ParentRef, WIDTH_EPSILON};
use crate::factory::{new_block, new_column, new_row};
use crate::{Result, TreeError};

/// What goes into the new column next to the split target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitSource {
    /// Relocate a block already in the forest.
    Existing(BlockId),
    /// Build a fresh block of this kind.
    New(BlockKind),
}

/// Which side of the target the source lands on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum SplitDirection {
    /// Source in the first column, target in the second.
    Left,
    #[default]
    Right,
}

impl SplitDirection {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as std::str::FromStr>::from_str(s).ok()
    }
}

impl BlockArena {
    /// Replace `target` with a `columns` row holding two 50/50 columns: one
    /// with the source, one with the target.
    ///
    /// Returns the id of the new row.
    pub fn split_into_columns(
        &mut self,
        target: &BlockId,
        source: SplitSource,
        direction: SplitDirection,
    ) -> Result<BlockId> {
        let target_node = self.node(target)?;
        if target_node.kind() == BlockKind::Column {
            return Err(TreeError::InvalidSplit(format!("{target} is a column")));
        }

        let source_height = match &source {
            SplitSource::Existing(src) => {
                let src_node = self.node(src)?;
                if src == target {
                    return Err(TreeError::InvalidSplit(format!("{src} cannot be split with itself")));
                }
                if src_node.kind() == BlockKind::Column {
                    return Err(TreeError::InvalidSplit(format!("{src} is a column")));
                }
                if self.is_within(target, src) || self.is_within(src, target) {
                    return Err(TreeError::InvalidSplit(format!(
                        "{src} and {target} are nested in each other"
                    )));
                }
                self.height(src)
            }
            SplitSource::New(BlockKind::Column) => {
                return Err(TreeError::InvalidSplit("cannot split with a bare column".into()));
            }
            SplitSource::New(BlockKind::Columns) => 2,
            SplitSource::New(_) => 1,
        };

        // Target moves two levels down (row, column)
        let depth = self.depth(target) + 2 + self.height(target).max(source_height) - 1;
        if depth > self.config.max_depth {
            return Err(TreeError::TooDeep {
                depth,
                max: self.config.max_depth,
            });
        }

        // Detach the source first so the target's index is final
        let source_id = match source {
            SplitSource::Existing(src) => {
                self.unlink(&src);
                src
            }
            SplitSource::New(kind) => {
                let block = new_block(kind);
                self.import(block, None)
            }
        };

        let Some((parent, index)) = self.unlink(target) else {
            return Err(TreeError::Corrupt(format!("{target} is not linked")));
        };

        let row = new_row(vec![new_column(50.0, Vec::new()), new_column(50.0, Vec::new())]);
        let row_id = self.import(row, parent.clone());
        self.link(&row_id, parent, index);

        let columns = self.children_of(&row_id, Slot::Children).to_vec();
        let (first, second) = match direction {
            SplitDirection::Left => (&source_id, target),
            SplitDirection::Right => (target, &source_id),
        };
        self.link(first, Some(ParentRef::children(columns[0].clone())), 0);
        self.link(second, Some(ParentRef::children(columns[1].clone())), 0);

        tracing::debug!(target = %target, source = %source_id, row = %row_id, "split into columns");
        Ok(row_id)
    }

    /// Flatten a `columns` row: every column's children, in column order,
    /// take the row's place. The row and column wrappers are removed.
    ///
    /// Returns the promoted ids in their new order.
    pub fn ungroup_row(&mut self, row: &BlockId) -> Result<Vec<BlockId>> {
        let node = self.node(row)?;
        if node.kind() != BlockKind::Columns {
            return Err(TreeError::UnsupportedOperation {
                id: row.clone(),
                operation: "ungroup_row",
            });
        }

        let columns = node.children().to_vec();
        let flat: Vec<BlockId> = columns
            .iter()
            .flat_map(|c| self.children_of(c, Slot::Children).iter().cloned())
            .collect();

        let Some((parent, index)) = self.unlink(row) else {
            return Err(TreeError::Corrupt(format!("{row} is not linked")));
        };
        for (offset, id) in flat.iter().enumerate() {
            self.link(id, parent.clone(), index + offset);
        }
        for column in &columns {
            self.nodes.remove(column);
        }
        self.nodes.remove(row);

        tracing::debug!(row = %row, promoted = flat.len(), "ungrouped row");
        Ok(flat)
    }

    /// Set a column's width, taking the difference from its neighbour.
    ///
    /// The width is clamped so every column keeps at least
    /// `min_column_width`, and the row is left summing to exactly 100.
    pub fn resize_column(&mut self, column: &BlockId, width: f64) -> Result<()> {
        if !width.is_finite() {
            return Err(TreeError::InvalidWidth(width));
        }
        let node = self.node(column)?;
        if node.kind() != BlockKind::Column {
            return Err(TreeError::UnsupportedOperation {
                id: column.clone(),
                operation: "resize_column",
            });
        }
        let Some(row) = node.parent().map(|p| p.id.clone()) else {
            return Err(TreeError::Corrupt(format!("column {column} has no row")));
        };

        let siblings = self.children_of(&row, Slot::Children).to_vec();
        let n = siblings.len();
        let min = self.config.min_column_width_for(n);
        let width = if n == 1 {
            100.0
        } else {
            width.clamp(min, self.config.max_column_width(n))
        };

        let idx = siblings.iter().position(|c| c == column).unwrap_or(0);
        set_width(self, column, width);

        let others: Vec<BlockId> = siblings.iter().filter(|c| *c != column).cloned().collect();
        if others.is_empty() {
            return Ok(());
        }

        // Nearest columns first, right neighbour before left
        let mut nearest: Vec<(usize, BlockId)> = siblings
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(i, c)| (i, c.clone()))
            .collect();
        nearest.sort_by_key(|(i, _)| (i.abs_diff(idx), *i < idx));

        let remaining = 100.0 - width;
        let mut excess: f64 = others.iter().map(|c| self.column_width(c)).sum::<f64>() - remaining;
        if excess > 0.0 {
            for (_, c) in &nearest {
                if excess <= WIDTH_EPSILON {
                    break;
                }
                let w = self.column_width(c);
                let take = (w - min).max(0.0).min(excess);
                set_width(self, c, w - take);
                excess -= take;
            }
        } else if let Some((_, c)) = nearest.first() {
            let w = self.column_width(c);
            set_width(self, c, w - excess);
        }
        self.absorb_residual(&others, remaining);

        tracing::debug!(column = %column, width, "resized column");
        Ok(())
    }

    /// Rescale a row's widths proportionally so they sum to 100.
    ///
    /// A row whose widths are all zero is equalized instead.
    pub fn normalize_widths(&mut self, row: &BlockId) -> Result<()> {
        let columns = self.row_columns(row, "normalize_widths")?;
        if columns.is_empty() {
            return Ok(());
        }
        let sum: f64 = columns.iter().map(|c| self.column_width(c)).sum();
        if sum <= WIDTH_EPSILON {
            return self.equalize_widths(row);
        }
        let scale = 100.0 / sum;
        for c in &columns {
            let w = self.column_width(c) * scale;
            set_width(self, c, w);
        }
        self.absorb_residual(&columns, 100.0);
        Ok(())
    }

    /// Give every column of a row the same width.
    pub fn equalize_widths(&mut self, row: &BlockId) -> Result<()> {
        let columns = self.row_columns(row, "equalize_widths")?;
        if columns.is_empty() {
            return Ok(());
        }
        let each = 100.0 / columns.len() as f64;
        for c in &columns {
            set_width(self, c, each);
        }
        self.absorb_residual(&columns, 100.0);
        Ok(())
    }

    fn row_columns(&self, row: &BlockId, operation: &'static str) -> Result<Vec<BlockId>> {
        let node = self.node(row)?;
        if node.kind() != BlockKind::Columns {
            return Err(TreeError::UnsupportedOperation {
                id: row.clone(),
                operation,
            });
        }
        Ok(node.children().to_vec())
    }

    fn column_width(&self, column: &BlockId) -> f64 {
        self.get(column).and_then(|n| n.body.width()).unwrap_or(0.0)
    }

    /// Make `columns` sum to exactly `total` by adjusting the last one.
    fn absorb_residual(&mut self, columns: &[BlockId], total: f64) {
        if let Some((last, rest)) = columns.split_last() {
            let rest_sum: f64 = rest.iter().map(|c| self.column_width(c)).sum();
            set_width(self, last, (total - rest_sum).max(0.0));
        }
    }
}

pub(crate) fn set_width(arena: &mut BlockArena, column: &BlockId, value: f64) {
    if let Some(node) = arena.nodes.get_mut(column)
        && let BlockBody::Column { width, .. } = &mut node.body
    {
        *width = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockPatch;
    use hyprdoc_types::Block;

    fn input(id: &str) -> Block {
        Block::new(id, BlockBody::Input { variable_name: id.into() })
    }

    fn column(id: &str, width: f64, children: Vec<Block>) -> Block {
        Block::new(id, BlockBody::Column { width, children })
    }

    fn row(id: &str, columns: Vec<Block>) -> Block {
        Block::new(id, BlockBody::Columns { children: columns })
    }

    fn bid(s: &str) -> BlockId {
        BlockId::from(s)
    }

    fn sum(widths: &[f64]) -> f64 {
        widths.iter().sum()
    }

    #[test]
    fn test_split_with_new_block_right() {
        let mut arena = BlockArena::from_forest(vec![input("a"), input("t"), input("b")]).unwrap();
        let row_id = arena
            .split_into_columns(&bid("t"), SplitSource::New(BlockKind::Text), SplitDirection::Right)
            .unwrap();

        assert_eq!(arena.roots(), &[bid("a"), row_id.clone(), bid("b")]);
        assert_eq!(arena.row_widths(&row_id), [50.0, 50.0]);
        let cols = arena.children_of(&row_id, Slot::Children).to_vec();
        assert_eq!(arena.children_of(&cols[0], Slot::Children), &[bid("t")]);
        let right = &arena.children_of(&cols[1], Slot::Children)[0];
        assert_eq!(arena.get(right).unwrap().kind(), BlockKind::Text);
        arena.validate().unwrap();
    }

    #[test]
    fn test_split_with_existing_block_left() {
        let mut arena = BlockArena::from_forest(vec![input("src"), input("a"), input("t")]).unwrap();
        let row_id = arena
            .split_into_columns(&bid("t"), SplitSource::Existing(bid("src")), SplitDirection::Left)
            .unwrap();

        assert_eq!(arena.roots(), &[bid("a"), row_id.clone()]);
        let cols = arena.children_of(&row_id, Slot::Children).to_vec();
        assert_eq!(arena.children_of(&cols[0], Slot::Children), &[bid("src")]);
        assert_eq!(arena.children_of(&cols[1], Slot::Children), &[bid("t")]);
        assert_eq!(arena.len(), 6);
        arena.validate().unwrap();
    }

    #[test]
    fn test_split_rejects_nested_source() {
        let forest = vec![row("r", vec![column("c", 100.0, vec![input("x")])])];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        let err = arena
            .split_into_columns(&bid("r"), SplitSource::Existing(bid("x")), SplitDirection::Left)
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidSplit(_)));
        arena.validate().unwrap();
    }

    #[test]
    fn test_split_rejects_column_target() {
        let forest = vec![row("r", vec![column("c", 100.0, vec![])])];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        let err = arena
            .split_into_columns(&bid("c"), SplitSource::New(BlockKind::Text), SplitDirection::Left)
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidSplit(_)));
    }

    #[test]
    fn test_split_inside_column_nests_row() {
        let forest = vec![row("r", vec![column("c", 100.0, vec![input("x")])])];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        let inner = arena
            .split_into_columns(&bid("x"), SplitSource::New(BlockKind::Email), SplitDirection::Right)
            .unwrap();
        assert_eq!(arena.children_of(&bid("c"), Slot::Children), &[inner]);
        assert_eq!(arena.depth(&bid("x")), 4);
        arena.validate().unwrap();
    }

    #[test]
    fn test_ungroup_row_example() {
        let forest = vec![row(
            "r",
            vec![column("c1", 50.0, vec![input("A")]), column("c2", 50.0, vec![input("B")])],
        )];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        let flat = arena.ungroup_row(&bid("r")).unwrap();
        assert_eq!(flat, [bid("A"), bid("B")]);
        assert_eq!(arena.to_forest(), vec![input("A"), input("B")]);
        arena.validate().unwrap();
    }

    #[test]
    fn test_ungroup_keeps_position_and_order() {
        let forest = vec![
            input("first"),
            row(
                "r",
                vec![
                    column("c1", 40.0, vec![input("a"), input("b")]),
                    column("c2", 20.0, vec![]),
                    column("c3", 40.0, vec![input("c")]),
                ],
            ),
            input("last"),
        ];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        arena.ungroup_row(&bid("r")).unwrap();
        let roots: Vec<_> = arena.roots().iter().map(|id| id.as_str()).collect();
        assert_eq!(roots, ["first", "a", "b", "c", "last"]);
        assert_eq!(arena.len(), 5);
    }

    #[test]
    fn test_ungroup_requires_row() {
        let mut arena = BlockArena::from_forest(vec![input("a")]).unwrap();
        assert!(matches!(
            arena.ungroup_row(&bid("a")),
            Err(TreeError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_split_then_ungroup_restores_forest() {
        let original = vec![input("a"), input("t"), input("b")];
        let mut arena = BlockArena::from_forest(original.clone()).unwrap();
        let row_id = arena
            .split_into_columns(&bid("t"), SplitSource::Existing(bid("a")), SplitDirection::Left)
            .unwrap();
        arena.ungroup_row(&row_id).unwrap();
        assert_eq!(arena.to_forest(), vec![input("a"), input("t"), input("b")]);
        arena.validate().unwrap();
    }

    #[test]
    fn test_resize_takes_from_neighbour() {
        let forest = vec![row(
            "r",
            vec![column("c1", 40.0, vec![]), column("c2", 30.0, vec![]), column("c3", 30.0, vec![])],
        )];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        arena.resize_column(&bid("c2"), 50.0).unwrap();
        assert_eq!(arena.row_widths(&bid("r")), [40.0, 50.0, 10.0]);
    }

    #[test]
    fn test_resize_last_column_uses_previous() {
        let forest = vec![row("r", vec![column("c1", 50.0, vec![]), column("c2", 50.0, vec![])])];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        arena.resize_column(&bid("c2"), 25.0).unwrap();
        assert_eq!(arena.row_widths(&bid("r")), [75.0, 25.0]);
    }

    #[test]
    fn test_resize_clamps_to_min() {
        let forest = vec![row("r", vec![column("c1", 50.0, vec![]), column("c2", 50.0, vec![])])];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        arena.resize_column(&bid("c1"), 99.0).unwrap();
        assert_eq!(arena.row_widths(&bid("r")), [90.0, 10.0]);
        arena.resize_column(&bid("c1"), -5.0).unwrap();
        assert_eq!(arena.row_widths(&bid("r")), [10.0, 90.0]);
    }

    #[test]
    fn test_resize_never_drifts() {
        let forest = vec![row(
            "r",
            vec![column("c1", 25.0, vec![]), column("c2", 25.0, vec![]), column("c3", 50.0, vec![])],
        )];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        for (col, w) in [("c1", 33.3), ("c3", 12.7), ("c2", 80.0), ("c1", 17.9), ("c3", 61.1)] {
            arena.resize_column(&bid(col), w).unwrap();
            let widths = arena.row_widths(&bid("r"));
            assert!((sum(&widths) - 100.0).abs() < WIDTH_EPSILON, "{widths:?}");
            assert!(widths.iter().all(|w| *w >= 10.0 - WIDTH_EPSILON), "{widths:?}");
        }
        arena.validate().unwrap();
    }

    #[test]
    fn test_resize_single_column_is_full_width() {
        let forest = vec![row("r", vec![column("c1", 100.0, vec![])])];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        arena.resize_column(&bid("c1"), 30.0).unwrap();
        assert_eq!(arena.row_widths(&bid("r")), [100.0]);
    }

    #[test]
    fn test_resize_in_crowded_row() {
        for n in [10usize, 11, 12, 15] {
            let columns = (0..n)
                .map(|i| column(&format!("c{i}"), 100.0 / n as f64, vec![]))
                .collect();
            let mut arena = BlockArena::from_forest(vec![row("r", columns)]).unwrap();
            for (col, w) in [("c0", 20.0), ("c1", 1.0), ("c0", 100.0)] {
                arena.resize_column(&bid(col), w).unwrap();
                let widths = arena.row_widths(&bid("r"));
                assert!((sum(&widths) - 100.0).abs() < WIDTH_EPSILON, "{n}: {widths:?}");
                assert!(widths.iter().all(|w| *w >= 0.0), "{n}: {widths:?}");
            }
            arena.validate().unwrap();
        }
    }

    #[test]
    fn test_resize_rejects_non_finite_width() {
        let forest = vec![row("r", vec![column("c1", 60.0, vec![]), column("c2", 40.0, vec![])])];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        for w in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                arena.resize_column(&bid("c1"), w),
                Err(TreeError::InvalidWidth(_))
            ));
        }

        let patch = BlockPatch {
            label: Some("Left".into()),
            width: Some(f64::NAN),
            ..BlockPatch::default()
        };
        assert!(matches!(arena.update(&bid("c1"), &patch), Err(TreeError::InvalidWidth(_))));
        assert_eq!(arena.get(&bid("c1")).unwrap().fields.label, "");
        assert_eq!(arena.row_widths(&bid("r")), [60.0, 40.0]);
        arena.validate().unwrap();
    }

    #[test]
    fn test_resize_requires_column() {
        let mut arena = BlockArena::from_forest(vec![input("a")]).unwrap();
        assert!(matches!(
            arena.resize_column(&bid("a"), 50.0),
            Err(TreeError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_normalize_and_equalize() {
        let forest = vec![row("r", vec![column("c1", 60.0, vec![]), column("c2", 40.0, vec![])])];
        let mut arena = BlockArena::from_forest(forest).unwrap();
        set_width(&mut arena, &bid("c1"), 30.0);
        set_width(&mut arena, &bid("c2"), 10.0);
        arena.normalize_widths(&bid("r")).unwrap();
        assert_eq!(arena.row_widths(&bid("r")), [75.0, 25.0]);

        arena.equalize_widths(&bid("r")).unwrap();
        assert_eq!(arena.row_widths(&bid("r")), [50.0, 50.0]);
    }

    #[test]
    fn test_normalize_zero_row_equalizes() {
        let forest = vec![row("r", vec![column("c1", 0.0, vec![]), column("c2", 0.0, vec![])])];
        let arena = BlockArena::from_forest(forest).unwrap();
        assert_eq!(arena.row_widths(&bid("r")), [50.0, 50.0]);
    }
}
