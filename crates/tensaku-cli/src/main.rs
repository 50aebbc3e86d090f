//! tensaku command-line driver.
//!
//! Runs the reconciliation engine over documents stored as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Diff two documents and list the ordered entries
//! tensaku diff original.json modified.json
//!
//! # Replay a recorded agent stream against a baseline, then accept it
//! tensaku replay original.json stream.json --accept --write out.json
//! ```
//!
//! A stream file is a JSON array of batches:
//!
//! ```json
//! [{"target": {"cell": 1}, "edits": [{"text": {"start_line": 0, "end_line": 1, "text": "x = 2\n"}}]},
//!  {"target": "document", "edits": [], "last": true}]
//! ```
//!
//! Set `RUST_LOG=tensaku_engine=debug` to trace the engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tensaku_diff::SimilarDiffService;
use tensaku_engine::{AgentEdit, DiffEntry, EditTarget, EngineConfig, MemoryStore, Reconciler};
use tensaku_types::Document;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tensaku")]
#[command(about = "Review cell-level differences between two documents")]
struct Args {
    /// Engine configuration (RON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Diff two documents
    Diff { original: PathBuf, modified: PathBuf },

    /// Replay an agent edit stream against a baseline
    Replay {
        original: PathBuf,
        stream: PathBuf,

        /// Accept every change after the stream ends
        #[arg(long, conflicts_with = "reject")]
        accept: bool,

        /// Reject every change after the stream ends
        #[arg(long)]
        reject: bool,

        /// Write the resulting modified document here
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

/// One batch of a recorded agent stream.
#[derive(Debug, Deserialize)]
struct Batch {
    target: EditTarget,
    edits: Vec<AgentEdit>,
    #[serde(default)]
    last: bool,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    state: String,
    changes: usize,
    entries: &'a [DiffEntry],
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let engine = match args.command {
        Command::Diff { original, modified } => {
            let original = load_document(&original)?;
            let modified = load_document(&modified)?;
            let mut engine = new_engine(config);
            engine.initialize(original, modified).await;
            engine
        }
        Command::Replay {
            original,
            stream,
            accept,
            reject,
            write,
        } => {
            let original = load_document(&original)?;
            let batches = load_stream(&stream)?;
            let mut engine = new_engine(config);
            engine.initialize(original.clone(), original).await;
            replay(&mut engine, batches).await?;

            if accept {
                engine.accept_all().await?;
            } else if reject {
                engine.reject_all().await?;
            }
            if let Some(path) = write {
                let text = serde_json::to_string_pretty(engine.modified())?;
                std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
                tracing::info!(path = %path.display(), "wrote modified document");
            }
            engine
        }
    };

    print_report(&engine, args.json)
}

fn new_engine(config: EngineConfig) -> Reconciler {
    let service = Arc::new(SimilarDiffService::new(config.line_diff_algorithm));
    Reconciler::new(service, Arc::new(MemoryStore::new()), config)
}

fn load_document(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing document {}", path.display()))
}

fn load_stream(path: &Path) -> Result<Vec<Batch>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let batches: Vec<Batch> =
        serde_json::from_str(&text).with_context(|| format!("parsing stream {}", path.display()))?;
    if batches.is_empty() {
        bail!("stream {} has no batches", path.display());
    }
    Ok(batches)
}

async fn replay(engine: &mut Reconciler, batches: Vec<Batch>) -> Result<()> {
    let count = batches.len();
    for (i, batch) in batches.into_iter().enumerate() {
        // A stream without an explicit last batch still ends on its final one.
        let last = batch.last || i + 1 == count;
        engine
            .apply_agent_edits(batch.target, batch.edits, last)
            .await
            .with_context(|| format!("applying batch {i}"))?;
        if last {
            break;
        }
    }
    Ok(())
}

fn print_report(engine: &Reconciler, json: bool) -> Result<()> {
    if json {
        let report = Report {
            state: engine.state().to_string(),
            changes: engine.change_count(),
            entries: engine.entries(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for entry in engine.entries() {
        let index = |i: Option<usize>| i.map_or_else(|| "-".to_string(), |i| i.to_string());
        println!(
            "{:<9} {:>4} {:>4} {:>3}  {}",
            entry.tag().to_string(),
            index(entry.original_index()),
            index(entry.modified_index()),
            entry.change_count(),
            preview(engine, entry),
        );
    }
    println!("{} change(s), {}", engine.change_count(), engine.state());
    Ok(())
}

/// First line of the entry's cell, from whichever side has it.
fn preview(engine: &Reconciler, entry: &DiffEntry) -> String {
    let cell = entry
        .modified_index()
        .and_then(|i| engine.modified().cell(i))
        .or_else(|| entry.original_index().and_then(|i| engine.original().cell(i)));
    cell.and_then(|c| c.source.lines().next())
        .unwrap_or_default()
        .chars()
        .take(60)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_stream_parses_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        std::fs::write(
            &path,
            r#"[
                {"target": {"cell": 0}, "edits": [{"text": {"start_line": 0, "end_line": 1, "text": "x\n"}}]},
                {"target": "document", "edits": [], "last": true}
            ]"#,
        )
        .unwrap();

        let batches = load_stream(&path).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].target, EditTarget::Cell(0));
        assert!(!batches[0].last);
        assert!(batches[1].last);
    }

    #[test]
    fn test_empty_stream_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(load_stream(&path).is_err());
    }

    #[tokio::test]
    async fn test_replay_ends_processing() {
        let dir = tempfile::tempdir().unwrap();
        let doc_path = dir.path().join("doc.json");
        std::fs::write(
            &doc_path,
            r#"{"uri": "file:///nb.ipynb", "cells": [{"kind": "code", "source": "x = 1\n"}]}"#,
        )
        .unwrap();
        let original = load_document(&doc_path).unwrap();

        let mut engine = new_engine(EngineConfig::default());
        engine.initialize(original.clone(), original).await;
        let batches = vec![Batch {
            target: EditTarget::Cell(0),
            edits: vec![AgentEdit::Text(tensaku_types::TextEdit::replace(0, 1, "x = 2\n"))],
            last: false,
        }];
        replay(&mut engine, batches).await.unwrap();

        assert!(!engine.is_processing());
        assert_eq!(engine.change_count(), 1);
    }
}
