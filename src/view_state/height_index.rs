//! LineHeightTable - per-line height estimates with O(log n) prefix sums
//!
//! Every line starts at a uniform estimate and is overwritten in contiguous
//! spans once real layout measurements arrive. Cumulative offsets are served
//! by a Fenwick tree so viewport lookups stay logarithmic on documents with
//! millions of lines.
//!
//! # Complexity
//!
//! - `height`: O(1)
//! - `prefix_sum` / `offset_of`: O(log n)
//! - `lower_bound`: O(log² n)
//! - `update`: O(k log n) for a span of k lines
//! - `total` / `average_line_height`: O(1)

/// Fallback line height used when a table is empty or configured with a
/// non-positive estimate.
pub const DEFAULT_ESTIMATED_LINE_HEIGHT: f64 = 8.0;

/// Per-line heights backed by a Fenwick tree.
///
/// # Invariants
/// - `heights.len() == tree.len() == total_lines`
/// - `total == sum(heights)`
/// - every stored height is finite and `>= 0`
#[derive(Debug, Clone)]
pub struct LineHeightTable {
    /// Fenwick tree backing storage (0-indexed API via `fenwick::array`).
    tree: Vec<f64>,
    /// Raw per-line heights, kept for O(1) point reads and exact deltas.
    heights: Vec<f64>,
    /// Sum of all heights.
    total: f64,
    /// Height assigned to lines that have never been measured.
    estimated: f64,
}

impl LineHeightTable {
    /// Create a table of `total_lines` entries, all set to `estimated`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunkview::view_state::height_index::LineHeightTable;
    /// let table = LineHeightTable::new(4, 10.0);
    /// assert_eq!(table.len(), 4);
    /// assert_eq!(table.total(), 40.0);
    /// assert_eq!(table.average_line_height(), 10.0);
    /// ```
    pub fn new(total_lines: usize, estimated: f64) -> Self {
        let estimated = sanitize_estimate(estimated);
        let mut table = Self {
            tree: vec![0.0; total_lines],
            heights: vec![estimated; total_lines],
            total: 0.0,
            estimated,
        };
        for index in 0..total_lines {
            fenwick::array::update(&mut table.tree, index, estimated);
        }
        table.total = estimated * total_lines as f64;
        table
    }

    /// Discard all measurements and resize for a new document.
    pub fn reset(&mut self, total_lines: usize) {
        *self = Self::new(total_lines, self.estimated);
    }

    /// Number of lines in the table.
    pub fn len(&self) -> usize {
        self.heights.len()
    }

    /// Returns true if the table has no lines.
    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Height of a single line, or `None` past the end.
    pub fn height(&self, line: usize) -> Option<f64> {
        self.heights.get(line).copied()
    }

    /// The estimate used for unmeasured lines.
    pub fn estimated_line_height(&self) -> f64 {
        self.estimated
    }

    /// Returns the cumulative height up to and including `line`.
    ///
    /// # Panics
    ///
    /// Panics if `line >= len()`.
    pub fn prefix_sum(&self, line: usize) -> f64 {
        assert!(
            line < self.len(),
            "line {} out of bounds (len: {})",
            line,
            self.len()
        );
        fenwick::array::prefix_sum(&self.tree, line).max(0.0)
    }

    /// Offset of the top edge of `line`: the height of every line before it.
    ///
    /// Lines at or past the end map to [`total`](Self::total).
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunkview::view_state::height_index::LineHeightTable;
    /// let table = LineHeightTable::new(3, 5.0);
    /// assert_eq!(table.offset_of(0), 0.0);
    /// assert_eq!(table.offset_of(2), 10.0);
    /// assert_eq!(table.offset_of(99), 15.0);
    /// ```
    pub fn offset_of(&self, line: usize) -> f64 {
        if line == 0 || self.is_empty() {
            0.0
        } else if line >= self.len() {
            self.total
        } else {
            self.prefix_sum(line - 1)
        }
    }

    /// Summed height of the lines in `[start, end)`, clamped to the table.
    pub fn span_height(&self, start: usize, end: usize) -> f64 {
        if end <= start {
            return 0.0;
        }
        (self.offset_of(end) - self.offset_of(start)).max(0.0)
    }

    /// Binary search for the first line where `prefix_sum(line) > value`.
    ///
    /// Returns the line containing the vertical offset `value`.
    ///
    /// # Returns
    ///
    /// - `Some(line)` if some line ends below `value`
    /// - `None` if `value >= total()` or the table is empty
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunkview::view_state::height_index::LineHeightTable;
    /// let mut table = LineHeightTable::new(3, 10.0);
    /// table.update(&[20.0], 1); // [0..10) [10..30) [30..40)
    ///
    /// assert_eq!(table.lower_bound(0.0), Some(0));
    /// assert_eq!(table.lower_bound(10.0), Some(1));
    /// assert_eq!(table.lower_bound(29.5), Some(1));
    /// assert_eq!(table.lower_bound(30.0), Some(2));
    /// assert_eq!(table.lower_bound(40.0), None);
    /// ```
    pub fn lower_bound(&self, value: f64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }

        // Line i covers [prefix_sum(i-1), prefix_sum(i))
        let mut left = 0;
        let mut right = self.len();

        while left < right {
            let mid = left + (right - left) / 2;
            if self.prefix_sum(mid) > value {
                right = mid;
            } else {
                left = mid + 1;
            }
        }

        if left >= self.len() {
            None
        } else {
            Some(left)
        }
    }

    /// Total height of the document.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// `total / len`, the single source of truth for extrapolating
    /// unmeasured regions. Falls back to the estimate for empty tables.
    pub fn average_line_height(&self) -> f64 {
        if self.is_empty() {
            self.estimated
        } else {
            self.total / self.len() as f64
        }
    }

    /// Overwrite lines `[start_line, start_line + heights.len())` with
    /// measured values.
    ///
    /// Entries past the end of the table are dropped; non-finite or negative
    /// measurements leave the existing entry untouched. Returns the number of
    /// lines actually written.
    pub fn update(&mut self, heights: &[f64], start_line: usize) -> usize {
        let mut written = 0;
        for (offset, &measured) in heights.iter().enumerate() {
            let Some(line) = start_line.checked_add(offset) else {
                break;
            };
            if line >= self.len() {
                break;
            }
            if !measured.is_finite() || measured < 0.0 {
                continue;
            }
            let delta = measured - self.heights[line];
            if delta != 0.0 {
                fenwick::array::update(&mut self.tree, line, delta);
                self.total += delta;
                self.heights[line] = measured;
            }
            written += 1;
        }
        if written > 0 {
            // Resync to shed accumulated float drift from incremental deltas.
            self.total = self.heights.iter().sum();
        }
        written
    }
}

impl Default for LineHeightTable {
    fn default() -> Self {
        Self::new(0, DEFAULT_ESTIMATED_LINE_HEIGHT)
    }
}

fn sanitize_estimate(estimated: f64) -> f64 {
    if estimated.is_finite() && estimated > 0.0 {
        estimated
    } else {
        DEFAULT_ESTIMATED_LINE_HEIGHT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_empty_table() {
        let table = LineHeightTable::new(0, 12.0);
        assert_eq!(table.len(), 0);
        assert_eq!(table.total(), 0.0);
        assert!(table.is_empty());
        assert_eq!(table.average_line_height(), 12.0);
        assert_eq!(table.lower_bound(0.0), None);
        assert_eq!(table.offset_of(5), 0.0);
    }

    #[test]
    fn test_uniform_initialization() {
        let table = LineHeightTable::new(5, 4.0);
        assert_eq!(table.total(), 20.0);
        for line in 0..5 {
            assert_eq!(table.height(line), Some(4.0));
            assert_eq!(table.prefix_sum(line), 4.0 * (line + 1) as f64);
        }
        assert_eq!(table.height(5), None);
    }

    #[test]
    fn test_invalid_estimate_falls_back_to_default() {
        for bad in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let table = LineHeightTable::new(2, bad);
            assert_eq!(table.estimated_line_height(), DEFAULT_ESTIMATED_LINE_HEIGHT);
        }
    }

    #[test]
    fn test_update_overwrites_span_and_recomputes_average() {
        let mut table = LineHeightTable::new(4, 10.0);
        let written = table.update(&[20.0, 30.0], 1);

        assert_eq!(written, 2);
        assert_eq!(table.height(1), Some(20.0));
        assert_eq!(table.height(2), Some(30.0));
        assert_eq!(table.total(), 70.0);
        assert_eq!(table.average_line_height(), 17.5);
        assert_eq!(table.offset_of(3), 60.0);
    }

    #[test]
    fn test_update_clamps_past_end() {
        let mut table = LineHeightTable::new(3, 10.0);
        let written = table.update(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(written, 1);
        assert_eq!(table.len(), 3);
        assert_eq!(table.total(), 21.0);

        assert_eq!(table.update(&[1.0], 50), 0);
        assert_eq!(table.update(&[1.0], usize::MAX), 0);
    }

    #[test]
    fn test_update_skips_invalid_measurements() {
        let mut table = LineHeightTable::new(3, 10.0);
        let written = table.update(&[f64::NAN, -1.0, 5.0], 0);
        assert_eq!(written, 1);
        assert_eq!(table.height(0), Some(10.0));
        assert_eq!(table.height(1), Some(10.0));
        assert_eq!(table.height(2), Some(5.0));
    }

    #[test]
    fn test_span_height() {
        let mut table = LineHeightTable::new(5, 2.0);
        table.update(&[10.0], 2);
        assert_eq!(table.span_height(0, 5), 18.0);
        assert_eq!(table.span_height(2, 3), 10.0);
        assert_eq!(table.span_height(3, 3), 0.0);
        assert_eq!(table.span_height(4, 100), 2.0);
    }

    #[test]
    fn test_lower_bound_edge_cases() {
        let table = LineHeightTable::new(3, 5.0);

        assert_eq!(table.lower_bound(0.0), Some(0));
        assert_eq!(table.lower_bound(5.0), Some(1));
        assert_eq!(table.lower_bound(10.0), Some(2));
        assert_eq!(table.lower_bound(15.0), None); // Exactly at total
        assert_eq!(table.lower_bound(-4.0), Some(0));
    }

    #[test]
    fn test_reset_discards_measurements() {
        let mut table = LineHeightTable::new(3, 5.0);
        table.update(&[50.0], 0);
        table.reset(10);
        assert_eq!(table.len(), 10);
        assert_eq!(table.total(), 50.0);
        assert_eq!(table.height(0), Some(5.0));
    }

    proptest! {
        /// offset_of(i) equals the sum of every height before i.
        #[test]
        fn prop_offset_is_cumulative(
            heights in prop::collection::vec(0.0f64..100.0, 1..60),
        ) {
            let mut table = LineHeightTable::new(heights.len(), 1.0);
            table.update(&heights, 0);

            let mut expected = 0.0;
            for (line, &h) in heights.iter().enumerate() {
                prop_assert!(approx_eq(table.offset_of(line), expected));
                expected += h;
            }
            prop_assert!(approx_eq(table.total(), expected));
        }

        /// lower_bound(offset_of(i)) lands on i whenever line i has height.
        #[test]
        fn prop_lower_bound_inverts_offset(
            heights in prop::collection::vec(1u32..50, 1..60),
        ) {
            let heights: Vec<f64> = heights.into_iter().map(f64::from).collect();
            let mut table = LineHeightTable::new(heights.len(), 1.0);
            table.update(&heights, 0);

            for line in 0..table.len() {
                prop_assert_eq!(table.lower_bound(table.offset_of(line)), Some(line));
            }
        }

        /// The average always equals total / len after any update.
        #[test]
        fn prop_average_tracks_updates(
            len in 1usize..80,
            span in prop::collection::vec(0.5f64..40.0, 0..20),
            start in 0usize..100,
        ) {
            let mut table = LineHeightTable::new(len, 8.0);
            table.update(&span, start);
            prop_assert_eq!(table.len(), len);
            prop_assert!(approx_eq(
                table.average_line_height(),
                table.total() / len as f64
            ));
        }
    }
}
