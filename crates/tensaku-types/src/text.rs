//! Line-based text edits and the line ↔ byte translation beneath them.
//!
//! Cell buffers are addressed by 0-indexed lines with exclusive ends. A line
//! includes its trailing newline, so replacing lines `[1, 2)` of `"a\nb\nc"`
//! replaces the bytes `"b\n"`. This matches how the line diff tokenizes text.

use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, Result};

/// Replace lines `[start_line, end_line)` of a cell buffer with `text`.
///
/// An empty range inserts; empty `text` deletes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub start_line: u32,
    pub end_line: u32,
    pub text: String,
}

impl TextEdit {
    pub fn replace(start_line: u32, end_line: u32, text: impl Into<String>) -> Self {
        Self {
            start_line,
            end_line,
            text: text.into(),
        }
    }

    pub fn insert(line: u32, text: impl Into<String>) -> Self {
        Self::replace(line, line, text)
    }

    pub fn delete(start_line: u32, end_line: u32) -> Self {
        Self::replace(start_line, end_line, "")
    }

    /// Replace the whole buffer, whatever its current length.
    pub fn replace_all(content: &str, text: impl Into<String>) -> Self {
        Self::replace(0, line_count(content), text)
    }

    /// Number of lines this edit touches on either side.
    pub fn touched_lines(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line).max(line_count(&self.text))
    }
}

/// Convert a 0-indexed line number to the byte offset where that line starts.
///
/// `line == line_count(content)` is valid and maps to the end of the content.
pub fn line_to_byte_offset(content: &str, line: u32) -> Result<usize> {
    if line == 0 {
        return Ok(0);
    }

    let mut current_line = 0;
    for (offset, ch) in content.char_indices() {
        if ch == '\n' {
            current_line += 1;
            if current_line == line {
                return Ok(offset + 1);
            }
        }
    }

    let max_line = line_count(content);
    if line == max_line {
        Ok(content.len())
    } else {
        Err(DocumentError::LineOutOfRange {
            requested: line,
            max: max_line,
        })
    }
}

/// Get the byte range for a line range (exclusive end).
pub fn line_range_to_byte_range(content: &str, start_line: u32, end_line: u32) -> Result<(usize, usize)> {
    if end_line < start_line {
        return Err(DocumentError::InvalidEdit(format!(
            "end_line ({}) must be >= start_line ({})",
            end_line, start_line
        )));
    }

    let start = line_to_byte_offset(content, start_line)?;
    let end = line_to_byte_offset(content, end_line)?;
    Ok((start, end))
}

/// The text of lines `[start_line, end_line)`, trailing newlines included.
pub fn slice_lines(content: &str, start_line: u32, end_line: u32) -> Result<&str> {
    let (start, end) = line_range_to_byte_range(content, start_line, end_line)?;
    Ok(&content[start..end])
}

/// Count the number of lines in content. A trailing newline does not open a new line.
pub fn line_count(content: &str) -> u32 {
    if content.is_empty() {
        0
    } else {
        content.lines().count() as u32
    }
}

/// Apply a batch of edits to `content`.
///
/// Edit ranges refer to the content as it was *before* the batch. Edits must
/// not overlap; they are applied bottom-up so earlier ranges stay valid.
pub fn apply_text_edits(content: &str, edits: &[TextEdit]) -> Result<String> {
    let mut resolved = Vec::with_capacity(edits.len());
    for edit in edits {
        let (start, end) = line_range_to_byte_range(content, edit.start_line, edit.end_line)?;
        resolved.push((start, end, edit.text.as_str()));
    }
    resolved.sort_by_key(|&(start, end, _)| (start, end));

    for pair in resolved.windows(2) {
        if pair[0].1 > pair[1].0 {
            return Err(DocumentError::InvalidEdit("overlapping text edits".into()));
        }
    }

    let mut out = content.to_string();
    for &(start, end, text) in resolved.iter().rev() {
        out.replace_range(start..end, text);
    }
    Ok(out)
}
