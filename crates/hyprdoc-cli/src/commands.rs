//! Command execution against a document file.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};

use hyprdoc_store::{DocumentStore, SignBlockRequest};
use hyprdoc_tree::{BlockPatch, Document, DocumentRecord, SplitSource, summarize};
use hyprdoc_types::{BlockId, Party, PartyId, PrincipalId};

use crate::config::{CliConfig, load_config};
use crate::render::{TreeStyle, format_tree};
use crate::{Cli, Command};

/// Run one command and return what should be printed.
pub fn run(cli: Cli) -> Result<String> {
    let config = load_config(cli.config.as_deref()).context("Failed to load config")?;
    let path = cli.file.as_path();

    match cli.command {
        Command::New { title, owner } => {
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            let owner = PrincipalId::from(owner.unwrap_or_else(|| config.default_owner.clone()));
            let doc = Document::with_config(title, owner, config.tree.clone());
            save(path, &doc)?;
            Ok(doc.id.to_string())
        }
        Command::Show { diff, json } => {
            let doc = load(path, &config)?;
            if json {
                return doc.to_record().to_json().context("Failed to serialize document");
            }
            let marks = diff.then(|| doc.diff());
            let mut lines = vec![format!(
                "{} ({}, v{})",
                doc.title,
                doc.status(),
                doc.version()
            )];
            lines.extend(format_tree(doc.arena(), marks.as_ref(), &style(&config)));
            Ok(lines.join("\n"))
        }
        Command::Insert {
            kind,
            target,
            position,
        } => edit(path, &config, |doc| {
            let target = target.as_deref().map(|t| resolve_target(doc, t)).transpose()?;
            let id = doc.edit(|a| a.insert(kind, target.as_ref(), position))?;
            Ok(id.to_string())
        }),
        Command::Update { block, patch } => {
            let patch: BlockPatch =
                serde_json::from_str(&patch).context("Patch is not a valid block patch")?;
            edit(path, &config, |doc| {
                let id = resolve_block(doc, &block)?;
                doc.update_block(&id, &patch)?;
                Ok(id.to_string())
            })
        }
        Command::Delete { block } => edit(path, &config, |doc| {
            let id = resolve_block(doc, &block)?;
            let removed = doc.edit(|a| a.delete(&id))?;
            Ok(join_ids(&removed))
        }),
        Command::Move {
            block,
            target,
            position,
        } => edit(path, &config, |doc| {
            let id = resolve_block(doc, &block)?;
            let target = target.as_deref().map(|t| resolve_block(doc, t)).transpose()?;
            doc.edit(|a| a.move_block(&id, target.as_ref(), position))?;
            Ok(id.to_string())
        }),
        Command::Duplicate { block } => edit(path, &config, |doc| {
            let id = resolve_block(doc, &block)?;
            let copy = doc.edit(|a| a.duplicate(&id))?;
            Ok(copy.to_string())
        }),
        Command::Split {
            target,
            source,
            kind,
            direction,
        } => edit(path, &config, |doc| {
            let target = resolve_block(doc, &target)?;
            let source = match (source, kind) {
                (Some(src), _) => SplitSource::Existing(resolve_block(doc, &src)?),
                (None, Some(kind)) => SplitSource::New(kind),
                (None, None) => bail!("split needs --source or --kind"),
            };
            let row = doc.edit(|a| a.split_into_columns(&target, source, direction))?;
            Ok(row.to_string())
        }),
        Command::Ungroup { row } => edit(path, &config, |doc| {
            let id = resolve_block(doc, &row)?;
            let blocks = doc.edit(|a| a.ungroup_row(&id))?;
            Ok(join_ids(&blocks))
        }),
        Command::Resize { column, width } => edit(path, &config, |doc| {
            let id = resolve_block(doc, &column)?;
            doc.edit(|a| a.resize_column(&id, width))?;
            let row = doc
                .arena()
                .parent_of(&id)
                .map(|p| p.id.clone())
                .ok_or_else(|| anyhow!("column {id} has no row"))?;
            let widths: Vec<String> = doc
                .arena()
                .row_widths(&row)
                .iter()
                .map(|w| format!("{w:.1}"))
                .collect();
            Ok(widths.join(" "))
        }),
        Command::Party {
            name,
            color,
            contact,
        } => edit(path, &config, |doc| {
            let mut party = Party::new(name);
            if let Some(color) = color {
                party.color = color;
            }
            party.contact = contact;
            let id = party.id.to_string();
            doc.parties.push(party);
            Ok(id)
        }),
        Command::Set { key, value } => edit(path, &config, |doc| {
            doc.set_variable(key.clone(), value);
            Ok(key)
        }),
        Command::Send => edit(path, &config, |doc| {
            doc.send()?;
            Ok(doc.status().to_string())
        }),
        Command::Sign {
            block,
            party,
            asset,
            ip,
            user_agent,
        } => sign(path, &config, &block, &party, asset, ip, user_agent),
        Command::Diff => {
            let doc = load(path, &config)?;
            if doc.snapshot().is_none() {
                return Ok("not sent yet".to_string());
            }
            let counts = summarize(&doc.diff());
            let lines: Vec<String> = counts.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            Ok(lines.join("\n"))
        }
        Command::Status => {
            let doc = load(path, &config)?;
            let mut lines = vec![format!("status: {}", doc.status())];
            for node in doc.pending_signatures() {
                lines.push(format!("pending: {} \"{}\"", node.id, node.fields.label));
            }
            for entry in doc.audit_log() {
                let details = entry.details.as_deref().unwrap_or("");
                lines.push(format!("{} {} {} {details}", entry.timestamp, entry.action.as_str(), entry.user));
            }
            Ok(lines.join("\n"))
        }
        Command::Validate => {
            let doc = load(path, &config)?;
            doc.arena().validate()?;
            Ok(format!("ok ({} blocks)", doc.arena().len()))
        }
    }
}

/// Sign through the store so the signature goes through the same
/// transaction a server would run.
fn sign(
    path: &Path,
    config: &CliConfig,
    block: &str,
    party: &str,
    asset: String,
    ip: String,
    user_agent: String,
) -> Result<String> {
    let doc = load(path, config)?;
    let block_id = resolve_block(&doc, block)?;
    let party_id = resolve_party(&doc, party)?;
    let owner = doc.owner.clone();

    let store = DocumentStore::with_config(config.tree.clone());
    let document_id = store.insert(doc.to_record())?;
    let response = store.sign_block(SignBlockRequest {
        document_id: document_id.clone(),
        block_id,
        party_id,
        signature_asset: asset,
        ip_address: ip,
        user_agent,
        location: None,
        integrity_hash: None,
        verified_identifier: None,
    })?;

    let signed = store.get(&document_id, &owner)?;
    save(path, &signed)?;
    Ok(response.status.to_string())
}

// ============================================================================
// File I/O
// ============================================================================

fn load(path: &Path, config: &CliConfig) -> Result<Document> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let record = DocumentRecord::from_json(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let doc = Document::from_record(record, config.tree.clone())
        .with_context(|| format!("Invalid document in {}", path.display()))?;
    tracing::debug!(document = %doc.id, blocks = doc.arena().len(), "loaded document");
    Ok(doc)
}

fn save(path: &Path, doc: &Document) -> Result<()> {
    let json = doc.to_record().to_json().context("Failed to serialize document")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(document = %doc.id, version = doc.version(), "saved document");
    Ok(())
}

/// Load, apply `f`, and save only if `f` succeeds.
fn edit(path: &Path, config: &CliConfig, f: impl FnOnce(&mut Document) -> Result<String>) -> Result<String> {
    let mut doc = load(path, config)?;
    let out = f(&mut doc)?;
    save(path, &doc)?;
    Ok(out)
}

// ============================================================================
// Helpers
// ============================================================================

fn style(config: &CliConfig) -> TreeStyle {
    TreeStyle {
        summary_width: config.summary_width,
        short_ids: config.short_ids,
    }
}

fn join_ids(ids: &[BlockId]) -> String {
    ids.iter().map(BlockId::to_string).collect::<Vec<_>>().join("\n")
}

/// Resolve a block id or a unique id prefix.
fn resolve_block(doc: &Document, query: &str) -> Result<BlockId> {
    let exact = BlockId::from(query);
    if doc.arena().contains(&exact) {
        return Ok(exact);
    }
    let matches: Vec<BlockId> = doc
        .arena()
        .ids()
        .into_iter()
        .filter(|id| id.matches_prefix(query))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.clone()),
        [] => bail!("no block matches '{query}'"),
        _ => bail!("'{query}' is ambiguous ({} blocks match)", matches.len()),
    }
}

/// Resolve an insert target. A query that matches nothing is passed
/// through as-is so the engine appends at root; ambiguity is still an error.
fn resolve_target(doc: &Document, query: &str) -> Result<BlockId> {
    let matching = doc
        .arena()
        .ids()
        .into_iter()
        .filter(|id| id.matches_prefix(query))
        .count();
    if matching == 0 {
        return Ok(BlockId::from(query));
    }
    resolve_block(doc, query)
}

/// Resolve a party by id, id prefix, or exact name.
fn resolve_party(doc: &Document, query: &str) -> Result<PartyId> {
    let matches: Vec<&Party> = doc
        .parties
        .iter()
        .filter(|p| p.id.as_str() == query || p.name == query)
        .collect();
    if let [one] = matches.as_slice() {
        return Ok(one.id.clone());
    }
    let by_prefix: Vec<&Party> = doc.parties.iter().filter(|p| p.id.matches_prefix(query)).collect();
    match by_prefix.as_slice() {
        [one] => Ok(one.id.clone()),
        [] => bail!("no party matches '{query}'"),
        _ => bail!("'{query}' is ambiguous ({} parties match)", by_prefix.len()),
    }
}
