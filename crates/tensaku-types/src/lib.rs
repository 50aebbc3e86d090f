//! Shared cell, document and identity types for tensaku.
//!
//! tensaku keeps two copies of a cell document side by side: a frozen
//! *original* baseline and a live *modified* copy that an agent and a person
//! both edit. This crate holds the vocabulary both sides share:
//!
//! - [`Cell`] / [`CellKind`]: one independently editable content block
//! - [`Document`]: an ordered arena of cells indexed by internal id
//! - [`CellEdit`] / [`TextEdit`]: structural and line-level edits
//! - [`DocumentChange`] / [`EditOrigin`]: what an applied edit did, and who did it
//! - [`CellId`], [`SessionId`], [`RequestId`], [`DocumentUri`]: typed identifiers

mod cell;
mod document;
mod error;
pub mod ids;
pub mod text;

pub use cell::{Cell, CellKind, CellOutput};
pub use document::{CellEdit, ChangeKind, Document, DocumentChange, EditOrigin, Metadata};
pub use error::{DocumentError, Result};
pub use ids::{CellId, DocumentUri, RequestId, SessionId};
pub use text::TextEdit;
