//! Cell-diff reconciliation engine for tensaku.
//!
//! Keeps an ordered list of per-cell diff entries consistent between a
//! frozen *original* document and a live *modified* copy while an agent
//! streams edits into the copy and a person reviews them.
//!
//! # Entries
//!
//! Every cell of either document appears in exactly one [`DiffEntry`]:
//!
//! - **Unchanged**: paired, identical text
//! - **Modified**: paired, with a line diff
//! - **Inserted**: only in the modified document
//! - **Deleted**: only in the original document
//!
//! Entries name their cells by index; indices are shifted in place whenever
//! a splice or move lands, and the list is re-sorted into reading order with
//! [`sort_cell_changes`].
//!
//! # Review
//!
//! Keep commits a change into the original; undo reverts it in the modified
//! document. Both work per entry, per line change, or for the whole session
//! via [`Reconciler::accept_all`] and [`Reconciler::reject_all`]. Engine
//! writes are tagged [`EditOrigin::Engine`](tensaku_types::EditOrigin) and
//! never echo back into the list.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tensaku_diff::SimilarDiffService;
//! use tensaku_engine::{EngineConfig, MemoryStore, Reconciler};
//! use tensaku_types::{Cell, Document};
//!
//! # async fn demo() {
//! let original = Document::new("mem://nb", vec![Cell::code("x = 1\n")]);
//! let modified = original.clone();
//! let mut engine = Reconciler::new(
//!     Arc::new(SimilarDiffService::default()),
//!     Arc::new(MemoryStore::new()),
//!     EngineConfig::default(),
//! );
//! engine.initialize(original, modified).await;
//! assert_eq!(engine.change_count(), 0);
//! # }
//! ```

pub mod config;
mod engine;
pub mod entry;
mod error;
pub mod events;
pub mod history;
pub mod navigation;
pub mod ordering;
pub mod plan;
pub mod snapshot;
pub mod store;
pub mod tracker;

pub use config::{ConfigError, EngineConfig};
pub use engine::{AgentEdit, DiffOutcome, DiffRequest, EditTarget, FocusedChange, Reconciler};
pub use entry::{BufferPair, BufferRef, DiffEntry, EntryKind, EntryTag};
pub use error::{EngineError, Result};
pub use events::{ReviewState, SessionEvent};
pub use history::{Checkpoint, History};
pub use navigation::{ChangeLocation, ChangeNavigator};
pub use ordering::{count_changes, sort_cell_changes};
pub use plan::DocumentEditPlan;
pub use snapshot::{SnapshotBlob, SnapshotLocator};
pub use store::{DocumentStore, MemoryStore, StoreError};
pub use tracker::{CellTracker, TrackerEvent, TrackerState};
