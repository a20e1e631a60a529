//! HyprDoc command-line editor.
//!
//! Every command loads a document file (the JSON form of a
//! [`DocumentRecord`](hyprdoc_tree::DocumentRecord)), applies one operation,
//! and writes the file back only if the operation succeeded.
//!
//! ```text
//! hyprdoc lease.json new --title "Lease"
//! hyprdoc lease.json insert text
//! hyprdoc lease.json split 0192 --kind signature --direction left
//! hyprdoc lease.json send
//! hyprdoc lease.json sign 0193 --party 0194 --asset data:image/png;base64,...
//! hyprdoc lease.json show --diff
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use hyprdoc_tree::{Position, SplitDirection};
use hyprdoc_types::BlockKind;

mod commands;
pub mod config;
pub mod render;

pub use commands::run;

/// Edit, send, and sign HyprDoc documents.
#[derive(Parser, Debug)]
#[command(name = "hyprdoc")]
#[command(about = "Edit, send, and sign HyprDoc documents")]
pub struct Cli {
    /// Document file (JSON)
    pub file: PathBuf,

    /// Config file (defaults to ~/.config/hyprdoc/config.ron)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new empty draft
    New {
        #[arg(long)]
        title: String,
        /// Owner principal (defaults to the configured owner)
        #[arg(long)]
        owner: Option<String>,
    },
    /// Print the block tree
    Show {
        /// Mark blocks added or modified since the document was sent
        #[arg(long)]
        diff: bool,
        /// Print the stored JSON instead of the tree
        #[arg(long)]
        json: bool,
    },
    /// Insert a new block and print its id
    Insert {
        #[arg(value_parser = parse_kind)]
        kind: BlockKind,
        /// Block to place relative to (appends at root when omitted)
        #[arg(long)]
        target: Option<String>,
        #[arg(long, value_parser = parse_position, default_value = "after")]
        position: Position,
    },
    /// Merge a JSON patch into a block
    Update {
        block: String,
        /// e.g. '{"label": "Tenant", "required": true}'
        patch: String,
    },
    /// Delete a block and its subtree
    Delete { block: String },
    /// Move a block (and its subtree)
    Move {
        block: String,
        #[arg(long)]
        target: Option<String>,
        #[arg(long, value_parser = parse_position, default_value = "after")]
        position: Position,
    },
    /// Copy a block (and its subtree) with fresh ids
    Duplicate { block: String },
    /// Put a block side by side with another block in a new row
    Split {
        target: String,
        /// Move this existing block into the new row
        #[arg(long, conflicts_with = "kind", required_unless_present = "kind")]
        source: Option<String>,
        /// Create a block of this kind in the new row
        #[arg(long, value_parser = parse_kind)]
        kind: Option<BlockKind>,
        #[arg(long, value_parser = parse_direction, default_value = "right")]
        direction: SplitDirection,
    },
    /// Dissolve a row, keeping its blocks in column order
    Ungroup { row: String },
    /// Set a column's width (percent); siblings absorb the difference
    Resize { column: String, width: f64 },
    /// Add a signing party and print its id
    Party {
        name: String,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        contact: Option<String>,
    },
    /// Set a document variable
    Set { key: String, value: String },
    /// Send the document for signing (captures the diff baseline)
    Send,
    /// Sign a signature block as a party
    Sign {
        block: String,
        #[arg(long)]
        party: String,
        /// Signature image data URL
        #[arg(long)]
        asset: String,
        #[arg(long, default_value = "127.0.0.1")]
        ip: String,
        #[arg(long, default_value = "hyprdoc-cli")]
        user_agent: String,
    },
    /// Summarize changes since the document was sent
    Diff,
    /// Print status, pending signatures, and the audit log
    Status,
    /// Check the tree's structural invariants
    Validate,
}

fn parse_kind(s: &str) -> Result<BlockKind, String> {
    BlockKind::from_str(s).ok_or_else(|| format!("unknown block kind: {s}"))
}

fn parse_position(s: &str) -> Result<Position, String> {
    Position::from_str(s).ok_or_else(|| format!("unknown position: {s} (after, inside, inside_else)"))
}

fn parse_direction(s: &str) -> Result<SplitDirection, String> {
    SplitDirection::from_str(s).ok_or_else(|| format!("unknown direction: {s} (left, right)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_insert() {
        let cli = Cli::try_parse_from([
            "hyprdoc", "doc.json", "insert", "long_text", "--target", "abc", "--position", "inside",
        ])
        .unwrap();
        match cli.command {
            Command::Insert {
                kind,
                target,
                position,
            } => {
                assert_eq!(kind, BlockKind::LongText);
                assert_eq!(target.as_deref(), Some("abc"));
                assert_eq!(position, Position::Inside);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_split_needs_a_source() {
        assert!(Cli::try_parse_from(["hyprdoc", "doc.json", "split", "abc"]).is_err());
        assert!(
            Cli::try_parse_from([
                "hyprdoc", "doc.json", "split", "abc", "--kind", "text", "--source", "def"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Cli::try_parse_from(["hyprdoc", "doc.json", "insert", "spreadsheet"]).is_err());
    }
}
