//! ViewportTracker - scroll offset + viewport size to visible line range

use super::height_index::LineHeightTable;
use super::visible_range::VisibleRange;

/// Default number of extra lines rendered above and below the viewport.
pub const DEFAULT_RENDER_BUFFER: usize = 20;

/// Maps viewport geometry to a [`VisibleRange`] using a [`LineHeightTable`].
///
/// The returned range always extends `render_buffer` lines past both edges
/// of the viewport, unless that would leave the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportTracker {
    render_buffer: usize,
}

impl ViewportTracker {
    /// Create a tracker with the given buffer margin in lines.
    pub fn new(render_buffer: usize) -> Self {
        Self { render_buffer }
    }

    /// Extra lines rendered past each viewport edge.
    pub fn render_buffer(&self) -> usize {
        self.render_buffer
    }

    /// Compute the visible range for a scroll position.
    ///
    /// Negative or non-finite geometry is treated as zero. A scroll offset
    /// past the end of the document pins the range to the final lines.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunkview::view_state::height_index::LineHeightTable;
    /// # use chunkview::view_state::viewport::ViewportTracker;
    /// let heights = LineHeightTable::new(1_000, 10.0);
    /// let tracker = ViewportTracker::new(5);
    ///
    /// // Lines 50..60 are on screen; 5 lines of buffer on each side.
    /// let range = tracker.calculate_visible_range(&heights, 500.0, 100.0);
    /// assert_eq!(range.start_line, 45);
    /// assert_eq!(range.end_line(), 66);
    /// ```
    pub fn calculate_visible_range(
        &self,
        heights: &LineHeightTable,
        scroll_offset: f64,
        viewport_height: f64,
    ) -> VisibleRange {
        let total_lines = heights.len();
        if total_lines == 0 {
            return VisibleRange::default();
        }

        let scroll_offset = sanitize(scroll_offset);
        let viewport_height = sanitize(viewport_height);
        let average = heights.average_line_height();

        let first_visible = heights
            .lower_bound(scroll_offset)
            .unwrap_or(total_lines - 1);
        let start_line = first_visible.saturating_sub(self.render_buffer);

        // `limit >= scroll_offset`, so the end never precedes the first
        // visible line.
        let limit = scroll_offset + viewport_height + self.render_buffer as f64 * average;
        let end_line = heights
            .lower_bound(limit)
            .map_or(total_lines, |line| line + 1);

        VisibleRange::from_lines(start_line..end_line)
    }
}

impl Default for ViewportTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_BUFFER)
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_document_yields_empty_range() {
        let heights = LineHeightTable::new(0, 10.0);
        let range = ViewportTracker::new(20).calculate_visible_range(&heights, 0.0, 500.0);
        assert_eq!(range, VisibleRange::default());
    }

    #[test]
    fn top_of_document_starts_at_zero_with_trailing_buffer() {
        let heights = LineHeightTable::new(1_000, 10.0);
        let range = ViewportTracker::new(20).calculate_visible_range(&heights, 0.0, 200.0);
        assert_eq!(range.start_line, 0);
        // 20 lines on screen + 20 buffer, inclusive of the boundary line.
        assert_eq!(range.end_line(), 41);
    }

    #[test]
    fn middle_of_document_buffers_both_sides() {
        let heights = LineHeightTable::new(1_000, 10.0);
        let range = ViewportTracker::new(20).calculate_visible_range(&heights, 5_000.0, 200.0);
        assert_eq!(range.start_line, 480);
        assert_eq!(range.end_line(), 541);
        assert!(range.contains(500));
        assert!(range.contains(519));
    }

    #[test]
    fn scroll_past_end_pins_to_last_lines() {
        let heights = LineHeightTable::new(100, 10.0);
        let range = ViewportTracker::new(20).calculate_visible_range(&heights, 99_999.0, 200.0);
        assert_eq!(range.start_line, 79);
        assert_eq!(range.end_line(), 100);
    }

    #[test]
    fn viewport_taller_than_document_covers_everything() {
        let heights = LineHeightTable::new(30, 10.0);
        let range = ViewportTracker::new(20).calculate_visible_range(&heights, 0.0, 10_000.0);
        assert_eq!(range, VisibleRange::new(0, 30));
    }

    #[test]
    fn negative_and_nan_geometry_is_treated_as_zero() {
        let heights = LineHeightTable::new(100, 10.0);
        let tracker = ViewportTracker::new(0);
        let range = tracker.calculate_visible_range(&heights, -50.0, f64::NAN);
        assert_eq!(range.start_line, 0);
        assert_eq!(range.end_line(), 1);
    }

    #[test]
    fn scroll_to_exact_document_end_keeps_last_line() {
        let heights = LineHeightTable::new(100, 10.0);
        let range = ViewportTracker::new(0).calculate_visible_range(&heights, 1_000.0, 0.0);
        assert_eq!(range, VisibleRange::from_lines(99..100));
    }

    #[test]
    fn measured_heights_shift_the_range() {
        let mut heights = LineHeightTable::new(1_000, 10.0);
        // The first 100 lines turn out to be twice as tall.
        heights.update(&[20.0; 100], 0);
        let range = ViewportTracker::new(0).calculate_visible_range(&heights, 1_000.0, 100.0);
        assert_eq!(range.start_line, 50);
    }

    proptest! {
        /// The range never leaves the document.
        #[test]
        fn prop_range_stays_within_document(
            total_lines in 0usize..5_000,
            line_height in 0.5f64..40.0,
            scroll in -1_000.0f64..500_000.0,
            viewport in 0.0f64..5_000.0,
            buffer in 0usize..100,
        ) {
            let heights = LineHeightTable::new(total_lines, line_height);
            let range = ViewportTracker::new(buffer)
                .calculate_visible_range(&heights, scroll, viewport);
            prop_assert!(range.end_line() <= total_lines);
            if total_lines > 0 {
                prop_assert!(!range.is_empty());
            }
        }

        /// Lines on screen are always inside the range.
        #[test]
        fn prop_on_screen_lines_are_included(
            total_lines in 1usize..2_000,
            scroll_line in 0usize..2_000,
            screen_lines in 1usize..80,
            buffer in 0usize..40,
        ) {
            let scroll_line = scroll_line.min(total_lines - 1);
            let heights = LineHeightTable::new(total_lines, 10.0);
            let range = ViewportTracker::new(buffer).calculate_visible_range(
                &heights,
                scroll_line as f64 * 10.0,
                screen_lines as f64 * 10.0,
            );
            let last_on_screen = (scroll_line + screen_lines).min(total_lines) - 1;
            prop_assert!(range.contains(scroll_line));
            prop_assert!(range.contains(last_on_screen));
        }
    }
}
