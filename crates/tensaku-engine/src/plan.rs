//! Whole-document edit plans.
//!
//! When the agent writes the document as one text stream instead of editing
//! cells, its line edits land in a [`DocumentEditPlan`]. The plan starts as
//! the current modified document rendered to text, one header line per cell:
//!
//! ```text
//! #%%
//! import os
//! #%% markdown
//! # Heading
//! #%% code python
//! print(os.getcwd())
//! ```
//!
//! On the last batch the text is split back into cells and compiled into
//! structural edits against the cells it was rendered from.

use similar::{Algorithm, DiffOp};
use tensaku_types::{Cell, CellEdit, CellKind, Document, TextEdit, text};

use crate::error::Result;

/// Buffered whole-document text for one streaming session.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentEditPlan {
    separator: String,
    text: String,
    edits_applied: usize,
}

impl DocumentEditPlan {
    /// Render `document` as the starting text of a plan.
    pub fn from_document(document: &Document, separator: &str) -> Self {
        let mut text = String::new();
        for cell in document.cells() {
            text.push_str(&header_line(cell, separator));
            text.push('\n');
            text.push_str(&cell.source);
            text.push('\n');
        }
        Self {
            separator: separator.to_string(),
            text,
            edits_applied: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of text edits applied so far.
    pub fn edits_applied(&self) -> usize {
        self.edits_applied
    }

    /// Apply one batch of line edits to the plan text.
    pub fn apply(&mut self, edits: &[TextEdit]) -> Result<()> {
        self.text = text::apply_text_edits(&self.text, edits)?;
        self.edits_applied += edits.len();
        Ok(())
    }

    /// Split the plan text into cells.
    pub fn cells(&self) -> Vec<Cell> {
        let mut cells = Vec::new();
        let mut current: Option<Cell> = None;
        let mut body = String::new();

        for line in self.text.split_inclusive('\n') {
            let bare = line.trim_end_matches(['\n', '\r']);
            if let Some(rest) = bare.strip_prefix(self.separator.as_str()) {
                if let Some(cell) = current.take() {
                    cells.push(finish(cell, &body));
                } else if !body.is_empty() {
                    cells.push(finish(Cell::code(""), &body));
                }
                body.clear();
                current = Some(parse_header(rest));
            } else {
                body.push_str(line);
            }
        }

        if let Some(cell) = current {
            cells.push(finish(cell, &body));
        } else if !body.is_empty() {
            cells.push(finish(Cell::code(""), &body));
        }
        cells
    }

    /// Compile the plan into edits that turn `current` into the plan's cells.
    ///
    /// Edits are ordered bottom-up so each one's indices are still valid
    /// when applied in sequence.
    pub fn compile(&self, current: &Document) -> Vec<CellEdit> {
        let target = self.cells();
        let existing: Vec<&Cell> = current.cells().collect();

        let key = |c: &Cell| (c.kind.as_str(), c.language.clone(), c.source.clone());
        let old_keys: Vec<_> = existing.iter().map(|c| key(c)).collect();
        let new_keys: Vec<_> = target.iter().map(key).collect();

        let ops = similar::capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys);
        let mut edits = Vec::new();

        for op in ops.iter().rev() {
            match *op {
                DiffOp::Equal { .. } => {}
                DiffOp::Delete { old_index, old_len, .. } => {
                    edits.push(CellEdit::delete(old_index, old_len));
                }
                DiffOp::Insert {
                    old_index,
                    new_index,
                    new_len,
                } => {
                    edits.push(CellEdit::insert(old_index, target[new_index..new_index + new_len].to_vec()));
                }
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => {
                    let mut paired = 0;
                    while paired < old_len.min(new_len) && existing[old_index + paired].kind == target[new_index + paired].kind {
                        paired += 1;
                    }

                    if new_len > paired {
                        edits.push(CellEdit::insert(
                            old_index + old_len,
                            target[new_index + paired..new_index + new_len].to_vec(),
                        ));
                    }
                    if old_len > paired {
                        edits.push(CellEdit::delete(old_index + paired, old_len - paired));
                    }
                    for k in (0..paired).rev() {
                        let before = existing[old_index + k];
                        let after = &target[new_index + k];
                        if before.language != after.language {
                            edits.push(CellEdit::Language {
                                index: old_index + k,
                                language: after.language.clone(),
                            });
                        }
                        if before.source != after.source {
                            edits.push(CellEdit::Content {
                                index: old_index + k,
                                edits: vec![TextEdit::replace_all(&before.source, after.source.clone())],
                            });
                        }
                    }
                }
            }
        }

        tracing::debug!(
            cells = target.len(),
            edits = edits.len(),
            "compiled document edit plan"
        );
        edits
    }
}

fn header_line(cell: &Cell, separator: &str) -> String {
    match (cell.kind, &cell.language) {
        (CellKind::Code, None) => separator.to_string(),
        (CellKind::Code, Some(language)) => format!("{separator} code {language}"),
        (CellKind::Markup, _) => format!("{separator} markdown"),
        (CellKind::Raw, _) => format!("{separator} raw"),
    }
}

fn parse_header(rest: &str) -> Cell {
    let mut words = rest.split_whitespace();
    match words.next() {
        None => Cell::code(""),
        Some(word) => match CellKind::from_str(word) {
            Some(CellKind::Code) => match words.next() {
                Some(language) => Cell::code("").with_language(language),
                None => Cell::code(""),
            },
            Some(kind) => Cell::new(kind, ""),
            // `#%% python` is shorthand for a code cell in that language.
            None => Cell::code("").with_language(word),
        },
    }
}

/// Set the body, dropping the line break that precedes the next header.
fn finish(mut cell: Cell, body: &str) -> Cell {
    let body = body.strip_suffix('\n').unwrap_or(body);
    let body = body.strip_suffix('\r').unwrap_or(body);
    cell.source = body.to_string();
    cell
}
