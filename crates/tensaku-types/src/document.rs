//! Cell documents and the structural edits that change them.
//!
//! A [`Document`] is an arena of cells indexed by internal id *and* ordered
//! by position (`IndexMap<CellId, Cell>`). Every mutation goes through
//! [`Document::apply`], which is all-or-nothing and reports what happened as
//! a list of [`DocumentChange`]s tagged with the [`EditOrigin`] of the batch.
//!
//! # Edit semantics
//!
//! ```text
//! Replace { start, delete_count, cells }   splice cells in/out at `start`
//! Move    { from, length, to }             lift [from, from+length), reinsert at `to`
//!                                          (`to` indexes the list *after* removal)
//! Metadata / Outputs / Language            attribute edits on one cell
//! DocumentMetadata                         document-level attributes
//! Content { index, edits }                 line edits on one cell's buffer
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellOutput};
use crate::error::{DocumentError, Result};
use crate::ids::{CellId, DocumentUri};
use crate::text::{TextEdit, apply_text_edits};

/// JSON object used for cell and document metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Who caused an edit.
///
/// Threaded through every mutation instead of a "currently applying my own
/// edit" flag, so engine-originated changes can never be misread as user
/// changes no matter where a batch is interrupted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOrigin {
    /// Streamed from the agent.
    Agent,
    /// Typed or performed by the person reviewing.
    User,
    /// Applied by the reconciliation engine itself (mirroring, keep/undo).
    Engine,
}

/// A structural or content edit against a document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CellEdit {
    Replace {
        start: usize,
        delete_count: usize,
        cells: Vec<Cell>,
    },
    Move {
        from: usize,
        length: usize,
        to: usize,
    },
    Metadata {
        index: usize,
        metadata: Metadata,
    },
    Outputs {
        index: usize,
        outputs: Vec<CellOutput>,
    },
    Language {
        index: usize,
        language: Option<String>,
    },
    DocumentMetadata {
        metadata: Metadata,
    },
    Content {
        index: usize,
        edits: Vec<TextEdit>,
    },
}

impl CellEdit {
    /// Insert `cells` before position `at`.
    pub fn insert(at: usize, cells: Vec<Cell>) -> Self {
        CellEdit::Replace {
            start: at,
            delete_count: 0,
            cells,
        }
    }

    /// Delete `count` cells starting at `start`.
    pub fn delete(start: usize, count: usize) -> Self {
        CellEdit::Replace {
            start,
            delete_count: count,
            cells: Vec::new(),
        }
    }
}

/// What a single applied edit did.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeKind {
    /// Cells removed and/or inserted at `start`.
    Spliced {
        start: usize,
        removed: Vec<Cell>,
        inserted: Vec<CellId>,
    },
    /// `cells` (in order) now start at `to`.
    Moved {
        from: usize,
        to: usize,
        cells: Vec<CellId>,
    },
    Metadata { index: usize, cell: CellId },
    Outputs { index: usize, cell: CellId },
    Language { index: usize, cell: CellId },
    DocumentMetadata,
    Content {
        index: usize,
        cell: CellId,
        edits: Vec<TextEdit>,
    },
}

/// A change event emitted by [`Document::apply`].
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentChange {
    pub origin: EditOrigin,
    pub kind: ChangeKind,
}

/// An ordered document of cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentRepr", into = "DocumentRepr")]
pub struct Document {
    uri: DocumentUri,
    cells: IndexMap<CellId, Cell>,
    metadata: Metadata,
    version: u64,
}

impl Document {
    /// Create a document, assigning internal ids to any unobserved cells.
    ///
    /// Pre-assigned ids are kept; a duplicate pre-assigned id is replaced by
    /// a fresh content-derived one.
    pub fn new(uri: impl Into<DocumentUri>, cells: Vec<Cell>) -> Self {
        let mut map = IndexMap::with_capacity(cells.len());
        for mut cell in cells {
            if cell.id.is_nil() || map.contains_key(&cell.id) {
                cell.id = assign_id(&map, &cell);
            }
            map.insert(cell.id, cell);
        }
        Self {
            uri: uri.into(),
            cells: map,
            metadata: Metadata::new(),
            version: 0,
        }
    }

    /// An empty document.
    pub fn empty(uri: impl Into<DocumentUri>) -> Self {
        Self::new(uri, Vec::new())
    }

    /// Builder: set document metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn uri(&self) -> &DocumentUri {
        &self.uri
    }

    /// Incremented once per successful [`apply`](Self::apply).
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at a position.
    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get_index(index).map(|(_, cell)| cell)
    }

    /// Position of a cell by internal id.
    pub fn index_of(&self, id: &CellId) -> Option<usize> {
        self.cells.get_index_of(id)
    }

    pub fn contains(&self, id: &CellId) -> bool {
        self.cells.contains_key(id)
    }

    /// Cells in document order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Internal ids in document order.
    pub fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells.keys().copied()
    }

    /// Canonical bytes of the document content: kinds, sources, languages,
    /// metadata and outputs. Internal ids and the version are excluded, so
    /// two documents compare byte-identical exactly when their content does.
    pub fn content_bytes(&self) -> Vec<u8> {
        #[derive(Serialize)]
        struct CellView<'a> {
            kind: &'a str,
            source: &'a str,
            language: &'a Option<String>,
            metadata: &'a Metadata,
            outputs: &'a [CellOutput],
        }

        #[derive(Serialize)]
        struct View<'a> {
            metadata: &'a Metadata,
            cells: Vec<CellView<'a>>,
        }

        let view = View {
            metadata: &self.metadata,
            cells: self
                .cells
                .values()
                .map(|c| CellView {
                    kind: c.kind.as_str(),
                    source: &c.source,
                    language: &c.language,
                    metadata: &c.metadata,
                    outputs: &c.outputs,
                })
                .collect(),
        };
        serde_json::to_vec(&view).unwrap_or_default()
    }

    /// Check whether two documents have byte-identical content.
    pub fn content_eq(&self, other: &Document) -> bool {
        self.len() == other.len() && self.content_bytes() == other.content_bytes()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Apply a batch of edits atomically.
    ///
    /// Edits apply in order against a scratch copy; the document is replaced
    /// only when all of them succeed. A failure inside a multi-edit batch is
    /// reported as [`DocumentError::AtomicBatchFailed`].
    pub fn apply(&mut self, edits: Vec<CellEdit>, origin: EditOrigin) -> Result<Vec<DocumentChange>> {
        let batched = edits.len() > 1;
        let mut cells = self.cells.clone();
        let mut metadata = self.metadata.clone();
        let mut changes = Vec::with_capacity(edits.len());

        for (op_index, edit) in edits.into_iter().enumerate() {
            let kind = apply_one(&mut cells, &mut metadata, edit).map_err(|e| {
                if batched { e.in_batch(op_index) } else { e }
            })?;
            changes.push(DocumentChange { origin, kind });
        }

        self.cells = cells;
        self.metadata = metadata;
        self.version += 1;
        tracing::trace!(uri = %self.uri, version = self.version, ?origin, changes = changes.len(), "document edited");
        Ok(changes)
    }

    /// Give the cell at `index` a different internal id.
    ///
    /// Used when a correspondence is established between two cells that were
    /// first observed separately, so both sides agree on one identity.
    pub fn rebind_id(&mut self, index: usize, id: CellId) -> Result<()> {
        let len = self.cells.len();
        let current = *self
            .cells
            .get_index(index)
            .ok_or(DocumentError::CellIndexOutOfRange { index, len })?
            .0;
        if current == id {
            return Ok(());
        }
        if self.cells.contains_key(&id) {
            return Err(DocumentError::DuplicateCell(id));
        }
        if let Some((_, mut cell)) = self.cells.shift_remove_index(index) {
            cell.id = id;
            self.cells.shift_insert(index, id, cell);
        }
        Ok(())
    }

    /// Give the cell at `index` a content-derived id taken neither here nor
    /// in `other`, and return it.
    pub fn rebind_unique(&mut self, index: usize, other: &Document) -> Result<CellId> {
        let len = self.cells.len();
        let (_, cell) = self
            .cells
            .get_index(index)
            .ok_or(DocumentError::CellIndexOutOfRange { index, len })?;
        let mut salt = 0;
        let id = loop {
            let id = CellId::derive(cell.kind, &cell.source, salt);
            if !self.cells.contains_key(&id) && !other.contains(&id) {
                break id;
            }
            salt += 1;
        };
        self.rebind_id(index, id)?;
        Ok(id)
    }

    /// Replace every cell and the metadata with those of `other`, keeping this
    /// document's uri. Ids are carried over.
    pub fn replace_content(&mut self, other: &Document) {
        self.cells = other.cells.clone();
        self.metadata = other.metadata.clone();
        self.version += 1;
    }
}

/// Derive a content-based id that is not yet taken in `cells`.
fn assign_id(cells: &IndexMap<CellId, Cell>, cell: &Cell) -> CellId {
    let mut salt = 0;
    loop {
        let id = CellId::derive(cell.kind, &cell.source, salt);
        if !cells.contains_key(&id) {
            return id;
        }
        salt += 1;
    }
}

fn check_index(cells: &IndexMap<CellId, Cell>, index: usize) -> Result<CellId> {
    cells
        .get_index(index)
        .map(|(id, _)| *id)
        .ok_or(DocumentError::CellIndexOutOfRange {
            index,
            len: cells.len(),
        })
}

fn apply_one(cells: &mut IndexMap<CellId, Cell>, metadata: &mut Metadata, edit: CellEdit) -> Result<ChangeKind> {
    match edit {
        CellEdit::Replace {
            start,
            delete_count,
            cells: new_cells,
        } => {
            let len = cells.len();
            if start > len || start + delete_count > len {
                return Err(DocumentError::CellIndexOutOfRange {
                    index: start + delete_count,
                    len,
                });
            }

            let mut removed = Vec::with_capacity(delete_count);
            for _ in 0..delete_count {
                if let Some((_, cell)) = cells.shift_remove_index(start) {
                    removed.push(cell);
                }
            }

            let mut inserted = Vec::with_capacity(new_cells.len());
            for (offset, mut cell) in new_cells.into_iter().enumerate() {
                if cell.id.is_nil() {
                    cell.id = assign_id(cells, &cell);
                } else if cells.contains_key(&cell.id) {
                    return Err(DocumentError::DuplicateCell(cell.id));
                }
                inserted.push(cell.id);
                cells.shift_insert(start + offset, cell.id, cell);
            }

            Ok(ChangeKind::Spliced {
                start,
                removed,
                inserted,
            })
        }

        CellEdit::Move { from, length, to } => {
            let len = cells.len();
            if length == 0 || from + length > len {
                return Err(DocumentError::InvalidEdit(format!(
                    "move of {} cells from {} exceeds document of {} cells",
                    length, from, len
                )));
            }
            if to > len - length {
                return Err(DocumentError::CellIndexOutOfRange { index: to, len: len - length });
            }

            let lifted: Vec<(CellId, Cell)> = (0..length)
                .filter_map(|_| cells.shift_remove_index(from))
                .collect();
            let ids: Vec<CellId> = lifted.iter().map(|(id, _)| *id).collect();
            for (offset, (id, cell)) in lifted.into_iter().enumerate() {
                cells.shift_insert(to + offset, id, cell);
            }

            Ok(ChangeKind::Moved { from, to, cells: ids })
        }

        CellEdit::Metadata { index, metadata: value } => {
            let id = check_index(cells, index)?;
            if let Some(cell) = cells.get_mut(&id) {
                cell.metadata = value;
            }
            Ok(ChangeKind::Metadata { index, cell: id })
        }

        CellEdit::Outputs { index, outputs } => {
            let id = check_index(cells, index)?;
            if let Some(cell) = cells.get_mut(&id) {
                cell.outputs = outputs;
            }
            Ok(ChangeKind::Outputs { index, cell: id })
        }

        CellEdit::Language { index, language } => {
            let id = check_index(cells, index)?;
            if let Some(cell) = cells.get_mut(&id) {
                cell.language = language;
            }
            Ok(ChangeKind::Language { index, cell: id })
        }

        CellEdit::DocumentMetadata { metadata: value } => {
            *metadata = value;
            Ok(ChangeKind::DocumentMetadata)
        }

        CellEdit::Content { index, edits } => {
            let id = check_index(cells, index)?;
            if let Some(cell) = cells.get_mut(&id) {
                cell.source = apply_text_edits(&cell.source, &edits)?;
            }
            Ok(ChangeKind::Content { index, cell: id, edits })
        }
    }
}

// ── Serialization ───────────────────────────────────────────────────────────

/// Wire form of a document: cells as a list, ids optional.
#[derive(Clone, Serialize, Deserialize)]
struct DocumentRepr {
    uri: DocumentUri,
    cells: Vec<Cell>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    version: u64,
}

impl From<DocumentRepr> for Document {
    fn from(repr: DocumentRepr) -> Self {
        let mut doc = Document::new(repr.uri, repr.cells).with_metadata(repr.metadata);
        doc.version = repr.version;
        doc
    }
}

impl From<Document> for DocumentRepr {
    fn from(doc: Document) -> Self {
        Self {
            uri: doc.uri,
            cells: doc.cells.into_values().collect(),
            metadata: doc.metadata,
            version: doc.version,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellKind;

    fn doc(sources: &[&str]) -> Document {
        Document::new("mem://test", sources.iter().map(|s| Cell::code(*s)).collect())
    }

    fn sources(doc: &Document) -> Vec<String> {
        doc.cells().map(|c| c.source.clone()).collect()
    }

    #[test]
    fn test_ids_assigned_and_stable_across_copies() {
        let a = doc(&["x", "y", "x"]);
        let b = doc(&["x", "y", "x"]);
        let ids_a: Vec<_> = a.ids().collect();
        let ids_b: Vec<_> = b.ids().collect();
        assert_eq!(ids_a, ids_b);
        assert_ne!(ids_a[0], ids_a[2], "duplicate content must get distinct ids");
    }

    #[test]
    fn test_insert_and_delete() {
        let mut d = doc(&["a", "b", "c"]);
        let changes = d
            .apply(vec![CellEdit::insert(1, vec![Cell::code("new")])], EditOrigin::User)
            .unwrap();
        assert_eq!(sources(&d), ["a", "new", "b", "c"]);
        assert!(matches!(&changes[0].kind, ChangeKind::Spliced { start: 1, removed, inserted } if removed.is_empty() && inserted.len() == 1));

        let changes = d.apply(vec![CellEdit::delete(0, 2)], EditOrigin::Agent).unwrap();
        assert_eq!(sources(&d), ["b", "c"]);
        match &changes[0].kind {
            ChangeKind::Spliced { removed, .. } => {
                assert_eq!(removed.len(), 2);
                assert_eq!(removed[1].source, "new");
            }
            other => panic!("unexpected change {:?}", other),
        }
        assert_eq!(changes[0].origin, EditOrigin::Agent);
    }

    #[test]
    fn test_id_survives_content_edit() {
        let mut d = doc(&["a\n"]);
        let id = d.cell(0).unwrap().id;
        d.apply(
            vec![CellEdit::Content { index: 0, edits: vec![TextEdit::replace(0, 1, "b\n")] }],
            EditOrigin::User,
        )
        .unwrap();
        assert_eq!(d.cell(0).unwrap().id, id);
        assert_eq!(d.cell(0).unwrap().source, "b\n");
    }

    #[test]
    fn test_move_semantics() {
        let mut d = doc(&["a", "b", "c", "d"]);
        d.apply(vec![CellEdit::Move { from: 0, length: 2, to: 2 }], EditOrigin::User).unwrap();
        assert_eq!(sources(&d), ["c", "d", "a", "b"]);

        let mut d = doc(&["a", "b", "c"]);
        d.apply(vec![CellEdit::Move { from: 2, length: 1, to: 0 }], EditOrigin::User).unwrap();
        assert_eq!(sources(&d), ["c", "a", "b"]);
    }

    #[test]
    fn test_batch_is_atomic() {
        let mut d = doc(&["a", "b"]);
        let before = d.clone();
        let err = d
            .apply(
                vec![CellEdit::delete(0, 1), CellEdit::delete(5, 1)],
                EditOrigin::Engine,
            )
            .unwrap_err();
        assert!(matches!(err, DocumentError::AtomicBatchFailed { op_index: 1, .. }));
        assert_eq!(d, before);
    }

    #[test]
    fn test_duplicate_preassigned_id_rejected() {
        let mut d = doc(&["a"]);
        let id = d.cell(0).unwrap().id;
        let err = d
            .apply(vec![CellEdit::insert(1, vec![Cell::code("z").with_id(id)])], EditOrigin::Engine)
            .unwrap_err();
        assert_eq!(err, DocumentError::DuplicateCell(id));
    }

    #[test]
    fn test_content_bytes_ignore_ids() {
        let a = doc(&["a", "b"]);
        let mut b = doc(&["a", "b"]);
        b.rebind_id(0, CellId::derive(CellKind::Code, "other", 9)).unwrap();
        assert!(a.content_eq(&b));

        let mut c = doc(&["a", "b"]);
        c.apply(vec![CellEdit::Language { index: 1, language: Some("python".into()) }], EditOrigin::User)
            .unwrap();
        assert!(!a.content_eq(&c));
    }

    #[test]
    fn test_rebind_keeps_position() {
        let mut d = doc(&["a", "b", "c"]);
        let new_id = CellId::derive(CellKind::Code, "b", 42);
        d.rebind_id(1, new_id).unwrap();
        assert_eq!(d.index_of(&new_id), Some(1));
        assert_eq!(sources(&d), ["a", "b", "c"]);
    }

    #[test]
    fn test_rebind_unique_avoids_both_documents() {
        let other = doc(&["b", "a"]);
        let mut d = doc(&["a", "b"]);
        assert!(other.contains(&d.cell(0).unwrap().id));

        let fresh = d.rebind_unique(0, &other).unwrap();
        assert!(!other.contains(&fresh));
        assert_eq!(d.index_of(&fresh), Some(0));
        assert_eq!(sources(&d), ["a", "b"]);
    }

    #[test]
    fn test_serde_roundtrip_preserves_ids() {
        let d = doc(&["a", "b"]);
        let json = serde_json::to_string(&d).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn test_deserialize_without_ids() {
        let back: Document = serde_json::from_str(
            r#"{"uri":"mem://x","cells":[{"kind":"code","source":"print(1)"}]}"#,
        )
        .unwrap();
        assert_eq!(back.len(), 1);
        assert!(!back.cell(0).unwrap().id.is_nil());
    }
}
