//! Immutable document text with a line index.

use super::chunk::Chunk;
use std::ops::Range;
use std::sync::Arc;

/// Raw document text plus the byte offset of every line start.
///
/// A new load is always a new `Document`; nothing mutates one in place, so
/// render workers can hold an `Arc<Document>` and slice chunk text without
/// touching engine state.
///
/// Line counting follows `str::lines`: a trailing newline does not start an
/// extra empty line, and empty text has zero lines.
#[derive(Debug, Clone)]
pub struct Document {
    text: Arc<str>,
    /// Byte offset of the first character of each line.
    line_starts: Vec<usize>,
}

impl Document {
    /// Index a document.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunkview::model::Document;
    /// let doc = Document::new("alpha\nbeta\ngamma\n");
    /// assert_eq!(doc.total_lines(), 3);
    /// assert_eq!(doc.line_range_text(1..2), "beta\n");
    /// ```
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text: Arc<str> = text.into();
        let mut line_starts = Vec::new();
        if !text.is_empty() {
            line_starts.push(0);
            for (pos, byte) in text.bytes().enumerate() {
                if byte == b'\n' && pos + 1 < text.len() {
                    line_starts.push(pos + 1);
                }
            }
        }
        Self { text, line_starts }
    }

    /// An empty document with zero lines.
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Number of lines in the document.
    pub fn total_lines(&self) -> usize {
        self.line_starts.len()
    }

    /// Whether the document has no lines.
    pub fn is_empty(&self) -> bool {
        self.line_starts.is_empty()
    }

    /// Full document text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text of the half-open line range `[start, end)`, including line
    /// terminators. Out-of-bounds ranges are clamped.
    pub fn line_range_text(&self, lines: Range<usize>) -> &str {
        let total = self.total_lines();
        let start = lines.start.min(total);
        let end = lines.end.clamp(start, total);
        if start == end {
            return "";
        }
        let from = self.line_starts[start];
        let to = if end < total {
            self.line_starts[end]
        } else {
            self.text.len()
        };
        &self.text[from..to]
    }

    /// Text backing a chunk.
    pub fn chunk_text(&self, chunk: &Chunk) -> &str {
        self.line_range_text(chunk.lines())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_lines() {
        let doc = Document::empty();
        assert_eq!(doc.total_lines(), 0);
        assert!(doc.is_empty());
        assert_eq!(doc.line_range_text(0..10), "");
    }

    #[test]
    fn trailing_newline_does_not_add_a_line() {
        assert_eq!(Document::new("a\nb\n").total_lines(), 2);
        assert_eq!(Document::new("a\nb").total_lines(), 2);
        assert_eq!(Document::new("\n").total_lines(), 1);
    }

    #[test]
    fn blank_lines_are_counted() {
        let doc = Document::new("a\n\n\nb\n");
        assert_eq!(doc.total_lines(), 4);
        assert_eq!(doc.line_range_text(1..3), "\n\n");
    }

    #[test]
    fn line_range_text_slices_whole_lines() {
        let doc = Document::new("zero\none\ntwo\nthree");
        assert_eq!(doc.line_range_text(0..1), "zero\n");
        assert_eq!(doc.line_range_text(1..3), "one\ntwo\n");
        assert_eq!(doc.line_range_text(3..4), "three");
    }

    #[test]
    fn line_range_text_clamps_out_of_bounds() {
        let doc = Document::new("zero\none\n");
        assert_eq!(doc.line_range_text(1..100), "one\n");
        assert_eq!(doc.line_range_text(5..9), "");
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = doc.line_range_text(2..1);
        assert_eq!(reversed, "");
    }

    #[test]
    fn multibyte_text_slices_on_char_boundaries() {
        let doc = Document::new("héllo\nwörld\n");
        assert_eq!(doc.line_range_text(1..2), "wörld\n");
    }
}
