//! The reconciliation engine.
//!
//! A [`Reconciler`] owns one review session: the frozen `original` baseline,
//! the live `modified` copy, and the ordered diff list between them. Every
//! mutation of either document goes through it, and every mutation leaves
//! the diff list consistent before returning:
//!
//! - [`streaming`]: agent edits, cell-scoped or whole-document
//! - [`mirror`]: edits made by the person reviewing
//! - [`review`]: keep/undo, accept/reject all, snapshots, undo/redo
//! - [`navigate`]: next/previous and accept/reject of the focused change
//!
//! Full recomputes go through a [`DiffRequest`] stamped with a token. Only
//! the outcome of the newest request is installed; older ones are dropped.

mod mirror;
mod navigate;
mod review;
mod streaming;

use std::collections::HashMap;
use std::sync::Arc;

use tensaku_diff::{CellCorrespondence, DiffError, DiffService, LineDiff};
use tensaku_types::{CellId, Document, DocumentUri, RequestId, SessionId};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::config::EngineConfig;
use crate::entry::{BufferRef, DiffEntry, EntryKind};
use crate::error::{EngineError, Result};
use crate::events::{ReviewState, SessionEvent};
use crate::history::{Checkpoint, History};
use crate::navigation::ChangeNavigator;
use crate::ordering;
use crate::store::DocumentStore;
use crate::tracker::CellTracker;

pub use navigate::FocusedChange;
pub use streaming::{AgentEdit, EditTarget};

use streaming::StreamMode;

/// A pending full diff recompute.
///
/// Created by [`Reconciler::begin_recompute`], run against a diff service,
/// and handed back to [`Reconciler::install`]. The request carries copies of
/// both documents, so running it does not borrow the engine.
#[derive(Debug)]
pub struct DiffRequest {
    token: u64,
    original: Document,
    modified: Document,
}

/// Result of running a [`DiffRequest`].
#[derive(Debug)]
pub struct DiffOutcome {
    token: u64,
    versions: (u64, u64),
    /// `true` when the documents were identical and no service was called.
    short_circuited: bool,
    result: std::result::Result<Vec<(CellCorrespondence, Option<LineDiff>)>, DiffError>,
}

impl DiffRequest {
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Compute the diff. Identical documents never reach the service.
    pub async fn run(self, service: &dyn DiffService) -> DiffOutcome {
        let versions = (self.original.version(), self.modified.version());
        if self.original.content_eq(&self.modified) {
            let all_unchanged = (0..self.modified.len())
                .map(|i| (CellCorrespondence::Unchanged { original: i, modified: i }, None))
                .collect();
            return DiffOutcome {
                token: self.token,
                versions,
                short_circuited: true,
                result: Ok(all_unchanged),
            };
        }

        let result = self.compute(service).await;
        DiffOutcome {
            token: self.token,
            versions,
            short_circuited: false,
            result,
        }
    }

    async fn compute(
        &self,
        service: &dyn DiffService,
    ) -> std::result::Result<Vec<(CellCorrespondence, Option<LineDiff>)>, DiffError> {
        let diff = service.compute_diff(&self.original, &self.modified).await?;
        if !diff.covers(self.original.len(), self.modified.len()) {
            return Err(DiffError::Malformed(format!(
                "{} correspondences do not cover {} original and {} modified cells",
                diff.correspondences.len(),
                self.original.len(),
                self.modified.len()
            )));
        }

        let mut resolved = Vec::with_capacity(diff.correspondences.len());
        for correspondence in diff.correspondences {
            let line_diff = match correspondence {
                CellCorrespondence::Modified { original, modified } => {
                    let (Some(a), Some(b)) = (self.original.cell(original), self.modified.cell(modified)) else {
                        return Err(DiffError::Malformed(format!("no cell pair at {original}/{modified}")));
                    };
                    Some(service.compute_line_diff(&a.source, &b.source).await?)
                }
                _ => None,
            };
            resolved.push((correspondence, line_diff));
        }
        Ok(resolved)
    }
}

impl DiffOutcome {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn short_circuited(&self) -> bool {
        self.short_circuited
    }
}

/// Owner of one review session.
pub struct Reconciler {
    session: SessionId,
    request: RequestId,
    config: EngineConfig,

    original: Document,
    modified: Document,
    entries: Vec<DiffEntry>,
    trackers: HashMap<CellId, CellTracker>,

    service: Arc<dyn DiffService>,
    store: Arc<dyn DocumentStore>,

    request_token: u64,
    next_seq: u64,
    state: ReviewState,
    /// Content of the baseline when the session started, for detecting a
    /// modified document that was manually restored.
    initial_content: Vec<u8>,

    processing: bool,
    rewrite_ratio: f64,
    stream: StreamMode,

    navigator: ChangeNavigator,
    history: History,
    events: broadcast::Sender<SessionEvent>,

    /// The modified document did not exist in the store before this session.
    newly_created: bool,
    diff_view: bool,
    snapshot_seq: u64,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("session", &self.session)
            .field("uri", self.modified.uri())
            .field("state", &self.state)
            .field("entries", &self.entries.len())
            .field("changes", &self.navigator.total())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create an engine with empty documents. Call
    /// [`initialize`](Self::initialize) to start a session.
    pub fn new(service: Arc<dyn DiffService>, store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let history = History::new(config.history_limit);
        Self {
            session: SessionId::new(),
            request: RequestId::new(),
            config,
            original: Document::empty("untitled:original"),
            modified: Document::empty("untitled:modified"),
            entries: Vec::new(),
            trackers: HashMap::new(),
            service,
            store,
            request_token: 0,
            next_seq: 0,
            state: ReviewState::Modified,
            initial_content: Vec::new(),
            processing: false,
            rewrite_ratio: 0.0,
            stream: StreamMode::Idle,
            navigator: ChangeNavigator::default(),
            history,
            events,
            newly_created: false,
            diff_view: true,
            snapshot_seq: 0,
        }
    }

    /// Start a session for the document at `uri`.
    ///
    /// `original` is the baseline captured before the agent request. The
    /// modified document is resolved from the store; a missing document
    /// starts empty and is marked as created by this session.
    pub async fn open(
        uri: impl Into<DocumentUri>,
        original: Document,
        service: Arc<dyn DiffService>,
        store: Arc<dyn DocumentStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        let uri = uri.into();
        let resolved = store.resolve(&uri).await?;
        let newly_created = resolved.is_none();
        let modified = resolved.unwrap_or_else(|| Document::empty(uri.clone()));

        let mut engine = Self::new(service, store, config);
        engine.newly_created = newly_created;
        engine.initialize(original, modified).await;
        debug!(session = %engine.session, %uri, newly_created, "opened review session");
        Ok(engine)
    }

    /// Install both documents and compute the diff list from scratch.
    ///
    /// Safe to call again; any diff still in flight from an earlier call is
    /// discarded when it completes.
    pub async fn initialize(&mut self, original: Document, modified: Document) -> bool {
        self.initial_content = original.content_bytes();
        self.original = original;
        self.modified = modified;
        self.stream = StreamMode::Idle;
        self.history.clear();
        self.set_state(ReviewState::Modified);
        self.clear_entries();
        self.recompute().await
    }

    /// Recompute the diff list for the current documents.
    pub async fn recompute(&mut self) -> bool {
        let request = self.begin_recompute();
        let service = Arc::clone(&self.service);
        let outcome = request.run(service.as_ref()).await;
        self.install(outcome)
    }

    /// Issue a new recompute request. Supersedes every earlier request.
    pub fn begin_recompute(&mut self) -> DiffRequest {
        self.request_token += 1;
        debug!(token = self.request_token, "diff requested");
        DiffRequest {
            token: self.request_token,
            original: self.original.clone(),
            modified: self.modified.clone(),
        }
    }

    /// Install a diff outcome. Returns `false` when the outcome is stale.
    ///
    /// A service failure installs an empty list rather than an error: no
    /// detected differences is the safer failure for an editor.
    pub fn install(&mut self, outcome: DiffOutcome) -> bool {
        if outcome.token != self.request_token {
            debug!(token = outcome.token, current = self.request_token, "discarding stale diff");
            return false;
        }
        if outcome.versions != (self.original.version(), self.modified.version()) {
            debug!(token = outcome.token, "documents changed while diffing, discarding");
            return false;
        }

        let correspondences = outcome.result.unwrap_or_else(|e| {
            warn!(error = %e, "diff service failed, showing no changes");
            Vec::new()
        });

        self.entries.clear();
        self.trackers.clear();
        for (correspondence, line_diff) in correspondences {
            self.push_correspondence(correspondence, line_diff);
        }
        debug!(
            token = outcome.token,
            entries = self.entries.len(),
            short_circuited = outcome.short_circuited,
            "diff installed"
        );
        self.resort();
        true
    }

    fn push_correspondence(&mut self, correspondence: CellCorrespondence, line_diff: Option<LineDiff>) {
        let seq = self.next_seq();
        match correspondence {
            CellCorrespondence::Unchanged { original, modified } | CellCorrespondence::Modified { original, modified } => {
                let Some(cell) = self.bind_pair(original, modified) else {
                    return;
                };
                match (correspondence, line_diff) {
                    (CellCorrespondence::Modified { .. }, Some(line_diff)) => {
                        self.trackers.insert(cell, CellTracker::new(cell, line_diff.clone()));
                        self.entries
                            .push(DiffEntry::modified(cell, original, modified, line_diff, seq));
                    }
                    _ => self.entries.push(DiffEntry::unchanged(cell, original, modified, seq)),
                }
            }
            CellCorrespondence::Inserted { modified } => self.push_inserted(modified, seq),
            CellCorrespondence::Deleted { original } => self.push_deleted(original, seq),
        }
    }

    /// Make both sides of a pair share the original cell's id. On conflict
    /// the pair is split into a deletion and an insertion.
    fn bind_pair(&mut self, original: usize, modified: usize) -> Option<CellId> {
        let (Some(a), Some(b)) = (self.original.cell(original), self.modified.cell(modified)) else {
            error!(original, modified, "diff pairs cells that do not exist");
            return None;
        };
        let (original_id, modified_id) = (a.id, b.id);
        if original_id == modified_id {
            return Some(original_id);
        }
        // A moved cell can still hold the original id at another position.
        if let Some(holder) = self.modified.index_of(&original_id) {
            if let Err(e) = self.modified.rebind_unique(holder, &self.original) {
                warn!(error = %e, holder, "cannot free original id");
            }
        }
        match self.modified.rebind_id(modified, original_id) {
            Ok(()) => Some(original_id),
            Err(e) => {
                warn!(error = %e, original, modified, "cannot pair cells, splitting");
                let seq = self.next_seq();
                self.push_deleted(original, seq);
                let seq = self.next_seq();
                self.push_inserted(modified, seq);
                None
            }
        }
    }

    fn push_inserted(&mut self, modified: usize, seq: u64) {
        let Some(id) = self.modified.cell(modified).map(|c| c.id) else {
            error!(modified, "inserted cell missing");
            return;
        };
        // Same content elsewhere in the original derives the same id.
        if self.original.contains(&id) {
            match self.modified.rebind_unique(modified, &self.original) {
                Ok(fresh) => debug!(%id, %fresh, modified, "inserted cell rebound to a fresh id"),
                Err(e) => {
                    error!(error = %e, modified, "cannot rebind inserted cell");
                    return;
                }
            }
        }
        let Some(cell) = self.modified.cell(modified) else { return };
        let entry = DiffEntry::inserted(cell.id, modified, cell.line_count(), seq);
        if let Some(line_diff) = entry.line_diff() {
            self.trackers.insert(cell.id, CellTracker::new(cell.id, line_diff.clone()));
        }
        self.entries.push(entry);
    }

    fn push_deleted(&mut self, original: usize, seq: u64) {
        let Some(cell) = self.original.cell(original) else {
            error!(original, "deleted cell missing");
            return;
        };
        self.entries
            .push(DiffEntry::deleted(cell.id, original, cell.line_count(), seq));
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    pub fn session_id(&self) -> SessionId {
        self.session
    }

    pub fn request_id(&self) -> RequestId {
        self.request
    }

    /// Associate the session with a new agent request.
    pub fn set_request_id(&mut self, request: RequestId) {
        self.request = request;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn original(&self) -> &Document {
        &self.original
    }

    pub fn modified(&self) -> &Document {
        &self.modified
    }

    /// The ordered diff list.
    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn entry_for(&self, cell: CellId) -> Option<&DiffEntry> {
        self.entries.iter().find(|e| e.cell == cell)
    }

    /// Total atomic changes, as shown to the user.
    pub fn change_count(&self) -> usize {
        ordering::count_changes(&self.entries)
    }

    pub fn tracker(&self, cell: CellId) -> Option<&CellTracker> {
        self.trackers.get(&cell)
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn rewrite_ratio(&self) -> f64 {
        self.rewrite_ratio
    }

    pub fn is_newly_created(&self) -> bool {
        self.newly_created
    }

    pub fn diff_view_enabled(&self) -> bool {
        self.diff_view
    }

    pub fn navigator(&self) -> &ChangeNavigator {
        &self.navigator
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ── Internals shared by the operation modules ──────────────────────────

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn set_state(&mut self, state: ReviewState) {
        if self.state != state {
            debug!(session = %self.session, from = %self.state, to = %state, "review state changed");
            self.state = state;
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    fn set_processing(&mut self, processing: bool) {
        if self.processing != processing {
            self.processing = processing;
            self.emit(SessionEvent::ProcessingChanged(processing));
        }
    }

    fn set_rewrite_ratio(&mut self, ratio: f64) {
        let ratio = ratio.clamp(0.0, 1.0);
        if (self.rewrite_ratio - ratio).abs() > f64::EPSILON {
            self.rewrite_ratio = ratio;
            self.emit(SessionEvent::RewriteRatio(ratio));
        }
    }

    fn position_of(&self, cell: CellId) -> Option<usize> {
        self.entries.iter().position(|e| e.cell == cell)
    }

    /// Sort the list, rebuild the flattened index and notify.
    fn resort(&mut self) {
        ordering::sort_cell_changes(&mut self.entries);
        self.navigator.rebuild(&self.entries);
        self.sync_focus();
        self.emit(SessionEvent::EntriesChanged {
            changes: self.navigator.total(),
        });
    }

    fn clear_entries(&mut self) {
        self.entries.clear();
        self.trackers.clear();
        self.navigator.rebuild(&self.entries);
        self.navigator.set_position(None);
        self.emit(SessionEvent::EntriesChanged { changes: 0 });
    }

    /// Clear the diff list, then rebuild it from scratch.
    async fn clear_and_recompute(&mut self) -> bool {
        self.clear_entries();
        self.recompute().await
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            original: self.original.clone(),
            modified: self.modified.clone(),
            state: self.state,
        }
    }

    fn record_history(&mut self) {
        let checkpoint = self.checkpoint();
        self.history.record(checkpoint);
    }

    /// Record `checkpoint` as an undo step only if the action changed something.
    fn record_if(&mut self, checkpoint: Checkpoint, applied: bool) {
        if applied {
            self.history.record(checkpoint);
        }
    }

    /// Read one side of an entry's buffer pair.
    ///
    /// A cell that cannot be resolved means the list and the documents have
    /// drifted apart. That is a bug: it panics in debug builds and is
    /// logged and skipped otherwise.
    fn resolve_buffer(&self, buffer: BufferRef, document: &Document, cell: CellId) -> Option<String> {
        match buffer {
            BufferRef::Empty => Some(String::new()),
            BufferRef::Cell { index } => {
                let found = document.cell(index).filter(|c| c.id == cell);
                debug_assert!(found.is_some(), "entry for {cell:?} points at index {index} of {}", document.uri());
                if found.is_none() {
                    error!(%cell, index, uri = %document.uri(), "diff entry out of sync with document, skipping");
                }
                found.map(|c| c.source.clone())
            }
        }
    }

    /// Resolve both texts of the entry at `pos`.
    fn resolve_texts(&self, pos: usize) -> Option<(String, String)> {
        let entry = self.entries.get(pos)?;
        let buffers = entry.buffers();
        let original = self.resolve_buffer(buffers.original, &self.original, entry.cell)?;
        let modified = self.resolve_buffer(buffers.modified, &self.modified, entry.cell)?;
        Some((original, modified))
    }

    /// Recompute the line diff of a paired cell and update its entry and
    /// tracker. With `collapse_identical`, a cell whose buffers now match
    /// becomes unchanged; otherwise it stays modified and flagged identical.
    async fn refresh_cell(&mut self, cell: CellId, collapse_identical: bool) {
        let Some(pos) = self.position_of(cell) else { return };
        if !self.entries[pos].is_paired() {
            return;
        }
        let Some((original_text, modified_text)) = self.resolve_texts(pos) else {
            return;
        };

        let service = Arc::clone(&self.service);
        let line_diff = match service.compute_line_diff(&original_text, &modified_text).await {
            Ok(diff) => diff,
            Err(e) => {
                warn!(error = %e, %cell, "line diff failed, treating cell as unchanged");
                LineDiff::identical()
            }
        };

        let Some(entry) = self.entries.iter_mut().find(|e| e.cell == cell) else {
            return;
        };
        let (Some(original_index), Some(modified_index)) = (entry.original_index(), entry.modified_index()) else {
            return;
        };
        let was_unchanged = matches!(entry.kind, EntryKind::Unchanged { .. });

        if line_diff.identical && (collapse_identical || was_unchanged) {
            entry.kind = EntryKind::Unchanged {
                original_index,
                modified_index,
            };
            if let Some(tracker) = self.trackers.get_mut(&cell) {
                tracker.set_line_diff(line_diff);
            }
        } else {
            entry.kind = EntryKind::Modified {
                original_index,
                modified_index,
                line_diff: line_diff.clone(),
            };
            self.trackers
                .entry(cell)
                .or_insert_with(|| CellTracker::new(cell, LineDiff::default()))
                .set_line_diff(line_diff);
        }
    }

    /// Tracker for `cell`, created on first use.
    fn tracker_mut(&mut self, cell: CellId) -> &mut CellTracker {
        self.trackers
            .entry(cell)
            .or_insert_with(|| CellTracker::new(cell, LineDiff::identical()))
    }

    fn entry_at(&self, index: usize) -> Result<&DiffEntry> {
        self.entries.get(index).ok_or(EngineError::EntryOutOfRange(index))
    }
}
