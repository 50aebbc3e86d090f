//! Diffing for tensaku.
//!
//! Two granularities:
//!
//! - **Cell correspondence**: which original cell became which modified
//!   cell ([`CellCorrespondence`]), computed per document pair.
//! - **Line diff**: which line ranges of one cell buffer changed
//!   ([`LineDiff`]), computed per cell pair.
//!
//! The engine talks to a [`DiffService`]; [`SimilarDiffService`] is the
//! in-process implementation.

mod error;
mod line;
mod service;
mod similar_service;

pub use error::{DiffError, Result};
pub use line::{LineChange, LineDiff, LineRange};
pub use service::{CellCorrespondence, CellDiff, DiffService};
pub use similar_service::{LineDiffAlgorithm, SimilarDiffService};
