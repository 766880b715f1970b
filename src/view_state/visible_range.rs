//! Visible range calculation result

use std::ops::Range;

/// Line span currently within or near the viewport.
///
/// Recomputed on every scroll/resize event by
/// [`ViewportTracker`](super::viewport::ViewportTracker).
///
/// # Invariants
/// - `start_line + line_count <= total_lines` of the document it was computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VisibleRange {
    /// First line of the range (inclusive).
    pub start_line: usize,
    /// Number of lines in the range.
    pub line_count: usize,
}

impl VisibleRange {
    /// Create new visible range.
    pub fn new(start_line: usize, line_count: usize) -> Self {
        Self {
            start_line,
            line_count,
        }
    }

    /// Build a range from a half-open line span.
    pub fn from_lines(lines: Range<usize>) -> Self {
        Self {
            start_line: lines.start,
            line_count: lines.end.saturating_sub(lines.start),
        }
    }

    /// Last line of the range (exclusive).
    pub fn end_line(&self) -> usize {
        self.start_line + self.line_count
    }

    /// The range as a half-open line span.
    pub fn lines(&self) -> Range<usize> {
        self.start_line..self.end_line()
    }

    /// Number of lines in the range.
    pub fn len(&self) -> usize {
        self.line_count
    }

    /// Check if range is empty.
    pub fn is_empty(&self) -> bool {
        self.line_count == 0
    }

    /// Check if a specific line is inside the range.
    pub fn contains(&self, line: usize) -> bool {
        self.lines().contains(&line)
    }

    /// Middle line of the range, used as the eviction centre.
    pub fn midpoint(&self) -> usize {
        self.start_line + self.line_count / 2
    }

    /// Clamp the range to a document of `total_lines`.
    pub fn clamped(&self, total_lines: usize) -> Self {
        let start = self.start_line.min(total_lines);
        let end = self.end_line().min(total_lines);
        Self::from_lines(start..end)
    }

    /// Whether `other` moved far enough from `self` to warrant a re-render.
    ///
    /// True when either the start line or the line count differs by more
    /// than `threshold` lines.
    pub fn differs_beyond(&self, other: &VisibleRange, threshold: usize) -> bool {
        self.start_line.abs_diff(other.start_line) > threshold
            || self.line_count.abs_diff(other.line_count) > threshold
    }
}
