use crate::render::Rect;

/// Contiguous, inclusive range of item indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexWindow {
    pub first: usize,
    pub last: usize,
}

impl IndexWindow {
    pub fn new(first: usize, last: usize) -> Self {
        debug_assert!(first <= last);
        Self { first, last }
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.first && index <= self.last
    }

    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.first..=self.last
    }

    pub fn intersect(&self, other: &IndexWindow) -> Option<IndexWindow> {
        let first = self.first.max(other.first);
        let last = self.last.min(other.last);
        (first <= last).then(|| IndexWindow::new(first, last))
    }

    /// Smallest window covering both, if they overlap or touch.
    pub fn union_contiguous(&self, other: &IndexWindow) -> Option<IndexWindow> {
        if self.first > other.last + 1 || other.first > self.last + 1 {
            return None;
        }
        Some(IndexWindow::new(
            self.first.min(other.first),
            self.last.max(other.last),
        ))
    }

    /// Parts of `self` not covered by `other`: at most one range above and
    /// one below.
    pub fn subtract(&self, other: &IndexWindow) -> Vec<IndexWindow> {
        let Some(overlap) = self.intersect(other) else {
            return vec![*self];
        };
        let mut parts = Vec::with_capacity(2);
        if self.first < overlap.first {
            parts.push(IndexWindow::new(self.first, overlap.first - 1));
        }
        if self.last > overlap.last {
            parts.push(IndexWindow::new(overlap.last + 1, self.last));
        }
        parts
    }
}

/// Scroll position and canvas geometry of the grid.
///
/// All values are derived from the inputs; any setter recomputes the column
/// count and clamps the scroll offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportState {
    scroll_y: u32,
    canvas_width: u32,
    canvas_height: u32,
    cell_width: u32,
    cell_height: u32,
    thumb_width: u32,
    thumb_height: u32,
    columns: usize,
    item_count: usize,
}

impl ViewportState {
    /// `cell_*` is the full pitch of a cell; `thumb_*` the clickable box
    /// inside it, anchored top-left.
    pub fn new(cell_width: u32, cell_height: u32, thumb_width: u32, thumb_height: u32) -> Self {
        let mut state = Self {
            scroll_y: 0,
            canvas_width: 0,
            canvas_height: 0,
            cell_width: cell_width.max(1),
            cell_height: cell_height.max(1),
            thumb_width: thumb_width.min(cell_width),
            thumb_height: thumb_height.min(cell_height),
            columns: 1,
            item_count: 0,
        };
        state.recompute();
        state
    }

    pub fn scroll_y(&self) -> u32 {
        self.scroll_y
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas_width, self.canvas_height)
    }

    pub fn cell_size(&self) -> (u32, u32) {
        (self.cell_width, self.cell_height)
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Sets the canvas size. Returns true if the column count changed.
    pub fn set_canvas_size(&mut self, width: u32, height: u32) -> bool {
        let before = self.columns;
        self.canvas_width = width;
        self.canvas_height = height;
        self.recompute();
        before != self.columns
    }

    pub fn set_item_count(&mut self, count: usize) {
        self.item_count = count;
        self.recompute();
    }

    /// Scrolls to `y`, clamped to the scrollable range. Returns the new offset.
    pub fn scroll_to(&mut self, y: u32) -> u32 {
        self.scroll_y = y.min(self.max_scroll());
        self.scroll_y
    }

    pub fn scroll_by(&mut self, dy: i64) -> u32 {
        let target = (self.scroll_y as i64 + dy).max(0);
        self.scroll_to(target.min(u32::MAX as i64) as u32)
    }

    pub fn row_count(&self) -> usize {
        self.item_count.div_ceil(self.columns)
    }

    pub fn virtual_height(&self) -> u64 {
        self.row_count() as u64 * self.cell_height as u64
    }

    pub fn max_scroll(&self) -> u32 {
        self.virtual_height()
            .saturating_sub(self.canvas_height as u64)
            .min(u32::MAX as u64) as u32
    }

    /// Whole rows that fit in the canvas, at least one.
    pub fn page_rows(&self) -> usize {
        ((self.canvas_height / self.cell_height) as usize).max(1)
    }

    /// Indices whose cells must be valid for the current scroll position.
    ///
    /// Rows `floor(y / cellH) ..= ceil((y + h) / cellH)`, which is every
    /// intersecting row plus one row of slack below. `None` when empty.
    pub fn index_window(&self) -> Option<IndexWindow> {
        compute_index_window(
            self.scroll_y,
            self.canvas_height,
            self.cell_height,
            self.columns,
            self.item_count,
        )
    }

    /// Like [`index_window`](Self::index_window) but widened by `margin_rows`
    /// on both sides, for prefetching.
    pub fn prefetch_window(&self, margin_rows: usize) -> Option<IndexWindow> {
        let window = self.index_window()?;
        let pad = margin_rows * self.columns;
        Some(IndexWindow::new(
            window.first.saturating_sub(pad),
            (window.last + pad).min(self.item_count - 1),
        ))
    }

    /// Cell rectangle of `index` in virtual (unscrolled) coordinates.
    pub fn cell_rect(&self, index: usize) -> Rect {
        let row = index / self.columns;
        let col = index % self.columns;
        Rect::new(
            (col as u32 * self.cell_width) as i32,
            (row as u64 * self.cell_height as u64) as i32,
            self.cell_width,
            self.cell_height,
        )
    }

    /// Thumbnail box of `index` in screen coordinates.
    pub fn screen_thumb_rect(&self, index: usize) -> Rect {
        let cell = self.cell_rect(index);
        Rect::new(
            cell.x,
            cell.y - self.scroll_y as i32,
            self.thumb_width,
            self.thumb_height,
        )
    }

    pub fn screen_rect(&self) -> Rect {
        Rect::new(0, 0, self.canvas_width, self.canvas_height)
    }

    /// Item under the screen point, counting margins as empty space.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.canvas_width || y as u32 >= self.canvas_height {
            return None;
        }
        let col = x as u32 / self.cell_width;
        if col as usize >= self.columns {
            return None;
        }
        let virtual_y = y as u64 + self.scroll_y as u64;
        let row = virtual_y / self.cell_height as u64;
        let index = row as usize * self.columns + col as usize;
        if index >= self.item_count {
            return None;
        }
        let in_x = x as u32 - col * self.cell_width;
        let in_y = (virtual_y - row * self.cell_height as u64) as u32;
        (in_x < self.thumb_width && in_y < self.thumb_height).then_some(index)
    }

    /// Scrolls the minimum amount that brings `index`'s cell fully into view.
    /// Returns true if the offset changed.
    pub fn ensure_visible(&mut self, index: usize) -> bool {
        if index >= self.item_count {
            return false;
        }
        let cell = self.cell_rect(index);
        let top = cell.y.max(0) as u32;
        let bottom = top + self.cell_height;
        let before = self.scroll_y;
        if top < self.scroll_y {
            self.scroll_to(top);
        } else if bottom > self.scroll_y + self.canvas_height {
            self.scroll_to(bottom.saturating_sub(self.canvas_height));
        }
        before != self.scroll_y
    }

    fn recompute(&mut self) {
        self.columns = column_count(self.canvas_width, self.cell_width);
        self.scroll_y = self.scroll_y.min(self.max_scroll());
    }
}

/// `floor(canvas_width / cell_width)`, at least one.
pub fn column_count(canvas_width: u32, cell_width: u32) -> usize {
    ((canvas_width / cell_width.max(1)) as usize).max(1)
}

/// Index window for a scroll offset and canvas height.
pub fn compute_index_window(
    scroll_y: u32,
    canvas_height: u32,
    cell_height: u32,
    columns: usize,
    count: usize,
) -> Option<IndexWindow> {
    if count == 0 {
        return None;
    }
    let cell_h = cell_height.max(1) as u64;
    let columns = columns.max(1);
    let y = scroll_y as u64;
    let first_row = (y / cell_h) as usize;
    let last_row = (y + canvas_height as u64).div_ceil(cell_h) as usize;

    let first = (first_row * columns).min(count - 1);
    let last = ((last_row + 1) * columns - 1).min(count - 1);
    Some(IndexWindow::new(first, last.max(first)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_scenario() {
        // 10 items, 3 columns, 100px cells, 220px canvas scrolled to 150px
        let window = compute_index_window(150, 220, 100, 3, 10).unwrap();
        assert_eq!(window, IndexWindow::new(3, 9));
    }

    #[test]
    fn test_empty_list_has_no_window() {
        assert!(compute_index_window(0, 500, 100, 3, 0).is_none());
    }

    #[test]
    fn test_window_covers_every_visible_cell_with_bounded_slack() {
        for &cols in &[1usize, 3, 7] {
            for &h in &[0u32, 1, 99, 100, 101, 250, 777] {
                for y in (0..2_000u32).step_by(37) {
                    let count = 500;
                    let cell_h = 100u32;
                    let Some(window) = compute_index_window(y, h, cell_h, cols, count) else {
                        panic!("window expected");
                    };
                    for index in 0..count {
                        let row = (index / cols) as u32;
                        let top = row * cell_h;
                        let bottom = top + cell_h;
                        let visible = h > 0 && bottom > y && top < y + h;
                        if visible {
                            assert!(window.contains(index), "y={y} h={h} cols={cols} idx={index}");
                        }
                    }
                    // at most one row of slack past the last intersecting row
                    let last_visible_row = if h == 0 { y / cell_h } else { (y + h - 1) / cell_h };
                    let max_last = ((last_visible_row as usize + 2) * cols - 1).min(count - 1);
                    assert!(window.last <= max_last);
                    assert!(window.first >= ((y / cell_h) as usize * cols).min(count - 1));
                }
            }
        }
    }

    #[test]
    fn test_first_index_clamped_past_end() {
        let window = compute_index_window(10_000, 200, 100, 2, 5).unwrap();
        assert_eq!(window, IndexWindow::new(4, 4));
    }

    #[test]
    fn test_column_count_minimum() {
        assert_eq!(column_count(50, 100), 1);
        assert_eq!(column_count(0, 100), 1);
        assert_eq!(column_count(350, 100), 3);
    }

    #[test]
    fn test_resize_reports_column_change() {
        let mut vp = ViewportState::new(100, 100, 90, 90);
        vp.set_item_count(50);
        assert!(vp.set_canvas_size(300, 200));
        assert!(!vp.set_canvas_size(350, 400));
        assert_eq!(vp.columns(), 3);
    }

    #[test]
    fn test_scroll_clamped() {
        let mut vp = ViewportState::new(100, 100, 90, 90);
        vp.set_canvas_size(300, 200);
        vp.set_item_count(30); // 10 rows, 1000px
        assert_eq!(vp.scroll_to(5_000), 800);
        assert_eq!(vp.scroll_by(-900), 0);
    }

    #[test]
    fn test_hit_test_margins_are_empty() {
        let mut vp = ViewportState::new(100, 100, 90, 90);
        vp.set_canvas_size(300, 300);
        vp.set_item_count(10);
        assert_eq!(vp.hit_test(10, 10), Some(0));
        assert_eq!(vp.hit_test(150, 110), Some(4));
        assert_eq!(vp.hit_test(95, 10), None);
        assert_eq!(vp.hit_test(10, 95), None);
        assert_eq!(vp.hit_test(10, 250), Some(6));
    }

    #[test]
    fn test_hit_test_respects_scroll_and_count() {
        let mut vp = ViewportState::new(100, 100, 90, 90);
        vp.set_canvas_size(300, 200);
        vp.set_item_count(10);
        vp.scroll_to(150);
        // screen y 10 -> virtual 160 -> row 1, 60px into the cell
        assert_eq!(vp.hit_test(10, 10), Some(3));
        // row 3 only has index 9
        assert_eq!(vp.hit_test(110, 170), None);
    }

    #[test]
    fn test_ensure_visible() {
        let mut vp = ViewportState::new(100, 100, 90, 90);
        vp.set_canvas_size(100, 250);
        vp.set_item_count(20);
        assert!(vp.ensure_visible(5));
        assert_eq!(vp.scroll_y(), 350);
        assert!(!vp.ensure_visible(4));
        assert!(vp.ensure_visible(0));
        assert_eq!(vp.scroll_y(), 0);
    }

    #[test]
    fn test_window_subtract_and_union() {
        let a = IndexWindow::new(3, 9);
        let drawn = IndexWindow::new(0, 5);
        assert_eq!(a.subtract(&drawn), vec![IndexWindow::new(6, 9)]);
        assert_eq!(drawn.subtract(&a), vec![IndexWindow::new(0, 2)]);
        assert_eq!(
            IndexWindow::new(0, 9).subtract(&IndexWindow::new(3, 5)),
            vec![IndexWindow::new(0, 2), IndexWindow::new(6, 9)]
        );
        assert_eq!(a.union_contiguous(&drawn), Some(IndexWindow::new(0, 9)));
        assert_eq!(
            IndexWindow::new(0, 2).union_contiguous(&IndexWindow::new(3, 4)),
            Some(IndexWindow::new(0, 4))
        );
        assert_eq!(
            IndexWindow::new(0, 2).union_contiguous(&IndexWindow::new(5, 6)),
            None
        );
    }
}
