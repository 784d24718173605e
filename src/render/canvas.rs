//! Off-screen grid buffer with partial redraw.
//!
//! The buffer holds a band of whole rows starting at `origin_row`, tall
//! enough for the visible rows plus slack. `drawn` is the contiguous index
//! range whose cells are known to be correct; a redraw only paints the part
//! of the new index window outside it. Scrolling past the band moves the
//! already painted rows instead of repainting them.

use std::collections::HashSet;

use image::{Rgba, RgbaImage};
use tracing::{debug, trace};

use super::surface::{PixelBuffer, Rect, Surface};
use crate::config::{GridConfig, Palette};
use crate::layout::{IndexWindow, ViewportState};
use crate::models::{MediaId, MediaList, ThumbnailState};
use crate::ui::selection::SelectionController;

/// Read-only view of the state a cell's pixels depend on.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub list: &'a MediaList,
    pub selection: &'a SelectionController,
}

/// What a redraw painted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedrawReport {
    /// Indices painted, in paint order.
    pub drawn: Vec<usize>,
    /// Painted media whose thumbnail should be requested.
    pub needs_load: Vec<MediaId>,
}

impl RedrawReport {
    pub fn is_empty(&self) -> bool {
        self.drawn.is_empty()
    }
}

enum CellContent<'a> {
    Placeholder,
    Error,
    Bitmap(&'a RgbaImage, f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Geometry {
    canvas_width: u32,
    canvas_height: u32,
    cell_width: u32,
    cell_height: u32,
    columns: usize,
}

impl Geometry {
    fn of(viewport: &ViewportState) -> Self {
        let (canvas_width, canvas_height) = viewport.canvas_size();
        let (cell_width, cell_height) = viewport.cell_size();
        Self {
            canvas_width,
            canvas_height,
            cell_width,
            cell_height,
            columns: viewport.columns(),
        }
    }
}

pub struct CanvasRenderer {
    buffer: PixelBuffer,
    geometry: Geometry,
    thumb_width: u32,
    thumb_height: u32,
    border: u32,
    slack_rows: usize,
    palette: Palette,
    buffer_rows: usize,
    /// Virtual row shown in buffer row 0.
    origin_row: usize,
    drawn: Option<IndexWindow>,
    /// Media whose cell currently shows the loading placeholder.
    placeholders: HashSet<MediaId>,
}

impl CanvasRenderer {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            buffer: PixelBuffer::new(1, 1, config.palette.background),
            geometry: Geometry::default(),
            thumb_width: config.thumb_width,
            thumb_height: config.thumb_height,
            border: config.border,
            slack_rows: config.slack_rows,
            palette: config.palette,
            buffer_rows: 0,
            origin_row: 0,
            drawn: None,
            placeholders: HashSet::new(),
        }
    }

    pub fn drawn_bounds(&self) -> Option<IndexWindow> {
        self.drawn
    }

    pub fn is_drawn(&self, index: usize) -> bool {
        self.drawn.is_some_and(|d| d.contains(index))
    }

    /// True if the cell of `id` was last painted as a loading placeholder.
    pub fn shows_placeholder(&self, id: MediaId) -> bool {
        self.placeholders.contains(&id)
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn origin_row(&self) -> usize {
        self.origin_row
    }

    /// Forget everything painted; the next redraw paints the whole window.
    pub fn invalidate_all(&mut self) {
        self.drawn = None;
        self.placeholders.clear();
        let bounds = self.buffer.bounds();
        self.buffer.fill_rect(bounds, self.palette.background);
    }

    /// Forget cells from `index` onward, e.g. after an insertion or removal.
    pub fn invalidate_from(&mut self, index: usize) {
        self.drawn = match self.drawn {
            Some(d) if d.first >= index => None,
            Some(d) if d.last >= index => Some(IndexWindow::new(d.first, index - 1)),
            other => other,
        };

        let columns = self.geometry.columns.max(1);
        let (row, col) = (index / columns, index % columns);
        let background = self.palette.background;
        let width = self.buffer.size().0;
        let ch = self.geometry.cell_height;

        if row < self.origin_row {
            let bounds = self.buffer.bounds();
            self.buffer.fill_rect(bounds, background);
        } else if row < self.origin_row + self.buffer_rows {
            let y = ((row - self.origin_row) as u32 * ch) as i32;
            let x = (col as u32 * self.geometry.cell_width) as i32;
            self.buffer
                .fill_rect(Rect::new(x, y, width.saturating_sub(x as u32), ch), background);
            let below = y + ch as i32;
            let rest = self.buffer.size().1.saturating_sub(below as u32);
            self.buffer.fill_rect(Rect::new(0, below, width, rest), background);
        }
    }

    /// Brings the buffer up to date with the viewport's index window.
    pub fn redraw(&mut self, viewport: &ViewportState, ctx: RenderContext<'_>) -> RedrawReport {
        let mut report = RedrawReport::default();
        self.sync_geometry(viewport);

        let Some(window) = viewport.index_window() else {
            if self.drawn.is_some() {
                self.invalidate_all();
            }
            return report;
        };
        self.ensure_rows(window);

        let parts = match self.drawn {
            Some(drawn) => window.subtract(&drawn),
            None => vec![window],
        };
        for part in parts {
            for index in part.iter() {
                self.draw_cell(index, ctx, &mut report);
            }
        }

        self.drawn = Some(match self.drawn {
            Some(drawn) => drawn.union_contiguous(&window).unwrap_or(window),
            None => window,
        });
        if !report.is_empty() {
            trace!(
                painted = report.drawn.len(),
                ?window,
                drawn = ?self.drawn,
                "Redrew grid cells"
            );
        }
        report
    }

    /// Repaints specific cells that are already inside the drawn bounds.
    /// Returns their screen rectangles.
    pub fn redraw_cells(
        &mut self,
        indices: &[usize],
        viewport: &ViewportState,
        ctx: RenderContext<'_>,
    ) -> Vec<Rect> {
        let mut report = RedrawReport::default();
        let mut dirty = Vec::new();
        for &index in indices {
            if !self.is_drawn(index) {
                continue;
            }
            self.draw_cell(index, ctx, &mut report);
            dirty.extend(Self::screen_cell_rect(viewport, index));
        }
        dirty
    }

    /// Paints one cross-fade frame of `bitmap` over the placeholder.
    /// Returns false if the cell is not in the buffer.
    pub fn compose_fade(
        &mut self,
        index: usize,
        id: MediaId,
        bitmap: &RgbaImage,
        opacity: f32,
        ctx: RenderContext<'_>,
    ) -> bool {
        let Some(cell) = self.buffer_cell_rect(index) else {
            return false;
        };
        self.paint_cell(cell, id, CellContent::Bitmap(bitmap, opacity), ctx);
        true
    }

    /// Copies one cell from the buffer to the screen. Returns the screen
    /// rectangle touched, if any of the cell is visible.
    pub fn present_cell<S: Surface + ?Sized>(
        &self,
        screen: &mut S,
        viewport: &ViewportState,
        index: usize,
    ) -> Option<Rect> {
        let src = self.buffer_cell_rect(index)?;
        let dest = Self::screen_cell_rect(viewport, index)?;
        let cell = viewport.cell_rect(index);
        let dest_y = cell.y - viewport.scroll_y() as i32;
        screen.blit(&self.buffer, src, cell.x, dest_y);
        Some(dest)
    }

    /// Copies the visible part of the buffer to the screen. Never touches
    /// the media model.
    pub fn repaint<S: Surface + ?Sized>(&self, screen: &mut S, viewport: &ViewportState) {
        let bounds = screen.bounds();
        screen.fill_rect(bounds, self.palette.background);

        let (width, height) = viewport.canvas_size();
        let band_top = self.origin_row as i64 * self.geometry.cell_height as i64;
        let top = viewport.scroll_y() as i64 - band_top;
        let Ok(top) = i32::try_from(top) else {
            return;
        };
        screen.blit(&self.buffer, Rect::new(0, top, width, height), 0, 0);
    }

    fn screen_cell_rect(viewport: &ViewportState, index: usize) -> Option<Rect> {
        let cell = viewport.cell_rect(index);
        cell.translate(0, -(viewport.scroll_y() as i32))
            .intersect(&viewport.screen_rect())
    }

    /// Cell rectangle inside the buffer, if its row is in the band.
    fn buffer_cell_rect(&self, index: usize) -> Option<Rect> {
        let columns = self.geometry.columns.max(1);
        let row = index / columns;
        if row < self.origin_row || row >= self.origin_row + self.buffer_rows {
            return None;
        }
        let col = index % columns;
        Some(Rect::new(
            (col as u32 * self.geometry.cell_width) as i32,
            ((row - self.origin_row) as u32 * self.geometry.cell_height) as i32,
            self.geometry.cell_width,
            self.geometry.cell_height,
        ))
    }

    /// Reallocates the buffer when the canvas or column count changed.
    fn sync_geometry(&mut self, viewport: &ViewportState) {
        let geometry = Geometry::of(viewport);
        if geometry == self.geometry && self.buffer_rows > 0 {
            return;
        }

        let rows = geometry.canvas_height.div_ceil(geometry.cell_height.max(1)) as usize;
        self.buffer_rows = rows + 2 + self.slack_rows;
        self.buffer = PixelBuffer::new(
            geometry.canvas_width.max(1),
            (self.buffer_rows as u32 * geometry.cell_height).max(1),
            self.palette.background,
        );
        self.origin_row = viewport.scroll_y() as usize / geometry.cell_height.max(1) as usize;
        self.drawn = None;
        self.placeholders.clear();

        debug!(
            width = geometry.canvas_width,
            height = geometry.canvas_height,
            columns = geometry.columns,
            buffer_rows = self.buffer_rows,
            "Reallocated grid buffer"
        );
        self.geometry = geometry;
    }

    /// Moves the band so the window's rows fit, keeping painted rows.
    fn ensure_rows(&mut self, window: IndexWindow) {
        let columns = self.geometry.columns.max(1);
        let first_row = window.first / columns;
        let last_row = window.last / columns;
        if first_row >= self.origin_row && last_row < self.origin_row + self.buffer_rows {
            return;
        }

        // Scrolling up keeps the band's lower rows, scrolling down the upper
        let new_origin = if first_row < self.origin_row {
            (last_row + 1).saturating_sub(self.buffer_rows).min(first_row)
        } else {
            first_row
        };

        let ch = self.geometry.cell_height;
        let width = self.buffer.size().0;
        let background = self.palette.background;
        let rows = self.buffer_rows;

        if new_origin > self.origin_row {
            let delta = new_origin - self.origin_row;
            if delta < rows {
                let kept = (rows - delta) as u32 * ch;
                self.buffer.shift_rows(delta as u32 * ch, 0, kept);
                self.buffer.fill_rect(
                    Rect::new(0, kept as i32, width, delta as u32 * ch),
                    background,
                );
            } else {
                let bounds = self.buffer.bounds();
                self.buffer.fill_rect(bounds, background);
            }
        } else {
            let delta = self.origin_row - new_origin;
            if delta < rows {
                let kept = (rows - delta) as u32 * ch;
                self.buffer.shift_rows(0, delta as u32 * ch, kept);
                self.buffer
                    .fill_rect(Rect::new(0, 0, width, delta as u32 * ch), background);
            } else {
                let bounds = self.buffer.bounds();
                self.buffer.fill_rect(bounds, background);
            }
        }

        self.origin_row = new_origin;
        let band = IndexWindow::new(
            new_origin * columns,
            (new_origin + rows) * columns - 1,
        );
        self.drawn = self.drawn.and_then(|d| d.intersect(&band));
        trace!(origin_row = new_origin, drawn = ?self.drawn, "Moved grid buffer band");
    }

    fn draw_cell(&mut self, index: usize, ctx: RenderContext<'_>, report: &mut RedrawReport) {
        let Some(media) = ctx.list.get(index) else {
            return;
        };
        let Some(cell) = self.buffer_cell_rect(index) else {
            return;
        };

        let thumbnail = media.thumbnail();
        let content = match thumbnail.state() {
            ThumbnailState::Loaded(bitmap) | ThumbnailState::Stale(bitmap) => {
                CellContent::Bitmap(bitmap.as_ref(), 1.0)
            }
            ThumbnailState::Errored => CellContent::Error,
            ThumbnailState::Unloaded | ThumbnailState::Loading => CellContent::Placeholder,
        };
        if thumbnail.needs_load() {
            report.needs_load.push(media.id());
        }
        self.paint_cell(cell, media.id(), content, ctx);
        report.drawn.push(index);
    }

    fn paint_cell(
        &mut self,
        cell: Rect,
        id: MediaId,
        content: CellContent<'_>,
        ctx: RenderContext<'_>,
    ) {
        let palette = self.palette;
        self.buffer.fill_rect(cell, palette.background);

        let frame = Rect::new(cell.x, cell.y, self.thumb_width, self.thumb_height);
        let inner = frame.inset(self.border);
        match content {
            CellContent::Placeholder => {
                self.buffer.fill_rect(inner, palette.placeholder);
                self.placeholders.insert(id);
            }
            CellContent::Error => {
                self.buffer.fill_rect(inner, palette.error_placeholder);
                self.placeholders.remove(&id);
            }
            CellContent::Bitmap(bitmap, opacity) => {
                if opacity < 1.0 {
                    self.buffer.fill_rect(inner, palette.placeholder);
                } else {
                    self.placeholders.remove(&id);
                }
                self.buffer.draw_bitmap(bitmap, inner, opacity);
            }
        }

        let chrome: Option<Rgba<u8>> = if ctx.selection.focus() == Some(id) {
            Some(palette.focus_border)
        } else if ctx.selection.is_selected(id) {
            Some(palette.selected_border)
        } else {
            None
        };
        if let Some(color) = chrome {
            self.buffer.stroke_rect(frame, self.border, color);
        }
    }
}

impl std::fmt::Debug for CanvasRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasRenderer")
            .field("geometry", &self.geometry)
            .field("buffer_rows", &self.buffer_rows)
            .field("origin_row", &self.origin_row)
            .field("drawn", &self.drawn)
            .finish()
    }
}
