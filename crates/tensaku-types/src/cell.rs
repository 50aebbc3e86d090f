//! Cell types.
//!
//! A cell is one independently editable content block of a document. Its
//! `source` is the live text buffer; everything else (language, metadata,
//! outputs) is attribute data that never shows up as a content difference.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::CellId;

/// What a cell *is*.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum CellKind {
    /// Executable source.
    #[default]
    Code,
    /// Prose (markdown and friends).
    #[strum(serialize = "markup", serialize = "markdown")]
    Markup,
    /// Raw passthrough content.
    Raw,
}

impl CellKind {
    /// Parse from string (case-insensitive). Accepts "markdown" for Markup.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CellKind::Code => "code",
            CellKind::Markup => "markup",
            CellKind::Raw => "raw",
        }
    }
}

impl std::fmt::Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Execution output attached to a code cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellOutput {
    /// MIME type of the payload.
    pub mime: String,
    /// Payload text.
    pub data: String,
}

/// A single cell.
///
/// `id` is the internal id. A nil id means "not yet observed"; the owning
/// [`Document`](crate::Document) assigns a content-derived id on insertion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default = "CellId::nil")]
    pub id: CellId,
    pub kind: CellKind,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub outputs: Vec<CellOutput>,
}

impl Cell {
    /// Create an unobserved cell (nil id) with the given content.
    pub fn new(kind: CellKind, source: impl Into<String>) -> Self {
        Self {
            id: CellId::nil(),
            kind,
            source: source.into(),
            language: None,
            metadata: serde_json::Map::new(),
            outputs: Vec::new(),
        }
    }

    /// Shorthand for a code cell.
    pub fn code(source: impl Into<String>) -> Self {
        Self::new(CellKind::Code, source)
    }

    /// Shorthand for a markup cell.
    pub fn markup(source: impl Into<String>) -> Self {
        Self::new(CellKind::Markup, source)
    }

    /// Builder: set the language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Builder: set a pre-assigned internal id.
    pub fn with_id(mut self, id: CellId) -> Self {
        self.id = id;
        self
    }

    /// Number of lines in the source.
    pub fn line_count(&self) -> u32 {
        crate::text::line_count(&self.source)
    }

    /// True when kind, source, language, metadata and outputs all match.
    /// The internal id is not compared.
    pub fn same_content(&self, other: &Cell) -> bool {
        self.kind == other.kind
            && self.source == other.source
            && self.language == other.language
            && self.metadata == other.metadata
            && self.outputs == other.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_aliases() {
        assert_eq!(CellKind::from_str("markdown"), Some(CellKind::Markup));
        assert_eq!(CellKind::from_str("CODE"), Some(CellKind::Code));
        assert_eq!(CellKind::from_str("raw"), Some(CellKind::Raw));
        assert_eq!(CellKind::from_str("widget"), None);
    }

    #[test]
    fn test_same_content_ignores_id() {
        let a = Cell::code("x").with_id(CellId::derive(CellKind::Code, "x", 0));
        let b = Cell::code("x").with_id(CellId::derive(CellKind::Code, "x", 1));
        assert!(a.same_content(&b));
        assert!(!a.same_content(&Cell::code("y")));
    }
}
