//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tensaku_diff::{CellDiff, DiffError, DiffService, LineDiff, SimilarDiffService};
use tensaku_engine::{AgentEdit, EditTarget, EngineConfig, MemoryStore, Reconciler};
use tensaku_types::{Cell, CellEdit, Document, TextEdit};

pub const URI: &str = "mem://notebook.ipynb";

/// Wraps the in-process service and counts full document diffs.
#[derive(Debug, Default)]
pub struct CountingService {
    inner: SimilarDiffService,
    pub document_diffs: AtomicUsize,
}

impl CountingService {
    pub fn calls(&self) -> usize {
        self.document_diffs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiffService for CountingService {
    async fn compute_diff(&self, original: &Document, modified: &Document) -> Result<CellDiff, DiffError> {
        self.document_diffs.fetch_add(1, Ordering::SeqCst);
        self.inner.compute_diff(original, modified).await
    }

    async fn compute_line_diff(&self, original: &str, modified: &str) -> Result<LineDiff, DiffError> {
        self.inner.compute_line_diff(original, modified).await
    }
}

/// A service that is never reachable.
#[derive(Debug, Default)]
pub struct FailingService;

#[async_trait]
impl DiffService for FailingService {
    async fn compute_diff(&self, _: &Document, _: &Document) -> Result<CellDiff, DiffError> {
        Err(DiffError::Unavailable("diff worker is gone".into()))
    }

    async fn compute_line_diff(&self, _: &str, _: &str) -> Result<LineDiff, DiffError> {
        Err(DiffError::Unavailable("diff worker is gone".into()))
    }
}

pub fn doc(sources: &[&str]) -> Document {
    Document::new(URI, sources.iter().map(|s| Cell::code(*s)).collect())
}

/// The three-cell notebook most tests start from.
pub fn abc() -> Document {
    doc(&["a = 1\n", "b = 2\n", "c = 3\n"])
}

pub fn engine_with(service: Arc<dyn DiffService>) -> (Reconciler, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = Reconciler::new(service, store.clone(), EngineConfig::default());
    (engine, store)
}

/// An engine whose two documents start identical.
pub async fn clean_session() -> (Reconciler, Arc<CountingService>, Arc<MemoryStore>) {
    let service = Arc::new(CountingService::default());
    let (mut engine, store) = engine_with(service.clone());
    let original = abc();
    engine.initialize(original.clone(), original).await;
    (engine, service, store)
}

/// Agent rewrites `b` in place, then inserts `d` after it on the last batch.
pub async fn agent_session() -> Reconciler {
    let (mut engine, _, _) = clean_session().await;
    engine
        .apply_agent_edits(
            EditTarget::Cell(1),
            vec![AgentEdit::Text(TextEdit::replace(0, 1, "b = 20\n"))],
            false,
        )
        .await
        .unwrap();
    engine
        .apply_agent_edits(
            EditTarget::Document,
            vec![AgentEdit::Cell(CellEdit::insert(2, vec![Cell::code("d = 4\n")]))],
            true,
        )
        .await
        .unwrap();
    engine
}

pub fn sources(document: &Document) -> Vec<String> {
    document.cells().map(|c| c.source.clone()).collect()
}

/// Every cell has exactly one entry, and every index an entry names holds
/// that entry's cell.
pub fn assert_entries_resolve(engine: &Reconciler) {
    let mut seen = std::collections::HashSet::new();
    for entry in engine.entries() {
        assert!(seen.insert(entry.cell), "{:?} has two entries", entry.cell);
        if let Some(o) = entry.original_index() {
            assert_eq!(engine.original().cell(o).map(|c| c.id), Some(entry.cell), "original {o}");
        }
        if let Some(m) = entry.modified_index() {
            assert_eq!(engine.modified().cell(m).map(|c| c.id), Some(entry.cell), "modified {m}");
        }
    }
    let covered = engine.entries().iter().filter(|e| e.original_index().is_some()).count();
    assert_eq!(covered, engine.original().len());
    let covered = engine.entries().iter().filter(|e| e.modified_index().is_some()).count();
    assert_eq!(covered, engine.modified().len());
}

/// Keep entries until nothing is left to review.
pub fn keep_everything(engine: &mut Reconciler) {
    while let Some(pos) = engine.entries().iter().position(|e| e.change_count() > 0) {
        assert!(engine.keep_cell(pos).unwrap(), "keep at {pos} did nothing");
    }
}
