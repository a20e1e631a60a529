//! Block forest as an ASCII tree.

use std::collections::BTreeMap;

use hyprdoc_tree::{BlockArena, DiffStatus};
use hyprdoc_types::{BlockBody, BlockId, Slot};

/// Display options for [`format_tree`].
#[derive(Clone, Debug)]
pub struct TreeStyle {
    pub summary_width: usize,
    pub short_ids: bool,
}

impl Default for TreeStyle {
    fn default() -> Self {
        Self {
            summary_width: 40,
            short_ids: false,
        }
    }
}

/// Format the forest as tree lines, one per block.
///
/// When `diff` is given each line is suffixed with the block's status
/// (unchanged blocks are left bare).
pub fn format_tree(
    arena: &BlockArena,
    diff: Option<&BTreeMap<BlockId, DiffStatus>>,
    style: &TreeStyle,
) -> Vec<String> {
    let mut lines = Vec::new();
    let roots = arena.roots();
    for (idx, root) in roots.iter().enumerate() {
        let is_last = idx == roots.len() - 1;
        format_node(arena, root, None, 0, "", is_last, diff, style, &mut lines);
    }
    lines
}

#[allow(clippy::too_many_arguments)]
fn format_node(
    arena: &BlockArena,
    id: &BlockId,
    slot: Option<Slot>,
    depth: usize,
    prefix: &str,
    is_last: bool,
    diff: Option<&BTreeMap<BlockId, DiffStatus>>,
    style: &TreeStyle,
    lines: &mut Vec<String>,
) {
    let Some(node) = arena.get(id) else {
        return;
    };

    let connector = if depth == 0 {
        ""
    } else if is_last {
        "└─ "
    } else {
        "├─ "
    };
    let branch = if slot == Some(Slot::Else) { "else " } else { "" };
    let shown_id = if style.short_ids { id.short() } else { id.as_str() };

    let mut line = format!(
        "{prefix}{connector}{branch}{shown_id} [{}] \"{}\"",
        node.kind().as_str(),
        node.fields.label
    );
    if let Some(content) = node.body.content()
        && !matches!(node.body, BlockBody::Signature { .. })
    {
        let summary = format_content_summary(content, style.summary_width);
        if !summary.is_empty() {
            line.push_str(&format!(" {summary}"));
        }
    }
    if let Some(width) = node.body.width() {
        line.push_str(&format!(" {width:.1}%"));
    }
    if let BlockBody::Signature {
        signed_at: Some(_), ..
    } = &node.body
    {
        line.push_str(" (signed)");
    }
    if let Some(status) = diff.and_then(|d| d.get(id))
        && *status != DiffStatus::Unchanged
    {
        line.push_str(&format!(" +{status}"));
    }
    lines.push(line);

    let children: Vec<(Slot, &BlockId)> = node
        .body
        .slots()
        .into_iter()
        .flat_map(|(slot, list)| list.iter().map(move |c| (slot, c)))
        .collect();
    let child_prefix = if depth == 0 {
        String::new()
    } else if is_last {
        format!("{prefix}   ")
    } else {
        format!("{prefix}│  ")
    };

    for (i, (child_slot, child)) in children.iter().enumerate() {
        let is_last_child = i == children.len() - 1;
        format_node(
            arena,
            child,
            Some(*child_slot),
            depth + 1,
            &child_prefix,
            is_last_child,
            diff,
            style,
            lines,
        );
    }
}

/// First line of `content`, truncated to `max_chars`.
fn format_content_summary(content: &str, max_chars: usize) -> String {
    let first_line = content.lines().next().unwrap_or("");
    let trimmed = first_line.trim();

    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
