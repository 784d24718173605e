//! Grid configuration: thumbnail geometry, animation timing and colours.
//!
//! The settings object of the host application feeds these values in; the
//! grid only reads them.

use std::path::PathBuf;
use std::time::Duration;

use image::Rgba;

use crate::error::GridError;
use crate::thumbnails::ThumbnailQueueBuilder;

/// Default thumbnail box width in pixels.
pub const DEFAULT_THUMB_WIDTH: u32 = 150;

/// Default thumbnail box height in pixels.
pub const DEFAULT_THUMB_HEIGHT: u32 = 125;

/// Default gap around each thumbnail box.
pub const DEFAULT_CELL_MARGIN: u32 = 4;

/// Extra rows kept in the off-screen buffer so small scrolls need no redraw.
pub const DEFAULT_SLACK_ROWS: usize = 1;

/// Frames a cross-fade runs for.
pub const DEFAULT_FADE_FRAMES: u8 = 9;

/// Upper bound on fade frames.
pub const MAX_FADE_FRAMES: u8 = 9;

/// One display frame. The animator never ticks faster than this.
pub const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// CPU time a single animation tick may spend.
pub const DEFAULT_TICK_BUDGET: Duration = Duration::from_millis(8);

/// Fades scrolled further than this outside the viewport are finished at once.
pub const DEFAULT_FADE_MARGIN_PX: u32 = 128;

/// Rows beyond the visible window that get thumbnail requests.
pub const DEFAULT_PREFETCH_ROWS: usize = 3;

pub const DEFAULT_WORKERS: usize = 2;

/// Memory budget of the shared bitmap cache.
pub const DEFAULT_CACHE_MEMORY_MB: usize = 192;

/// Colours used for cells that have no bitmap yet, and for selection chrome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Rgba<u8>,
    pub placeholder: Rgba<u8>,
    pub error_placeholder: Rgba<u8>,
    pub selected_border: Rgba<u8>,
    pub focus_border: Rgba<u8>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Rgba([24, 24, 24, 255]),
            placeholder: Rgba([51, 51, 51, 255]),
            error_placeholder: Rgba([96, 32, 32, 255]),
            selected_border: Rgba([204, 204, 204, 255]),
            focus_border: Rgba([64, 140, 255, 255]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    /// Width of the box a thumbnail is fitted into.
    pub thumb_width: u32,
    /// Height of the box a thumbnail is fitted into.
    pub thumb_height: u32,
    /// Gap added to the right and below each box.
    pub cell_margin: u32,
    /// Selection border thickness, drawn inside the box.
    pub border: u32,
    pub slack_rows: usize,
    pub fade_frames: u8,
    pub frame_interval: Duration,
    pub tick_budget: Duration,
    pub fade_margin_px: u32,
    pub prefetch_rows: usize,
    /// Thumbnail worker threads.
    pub workers: usize,
    pub cache_memory_mb: usize,
    /// Directory for persisted thumbnails; `None` keeps them in memory only.
    pub cache_dir: Option<PathBuf>,
    pub palette: Palette,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            thumb_width: DEFAULT_THUMB_WIDTH,
            thumb_height: DEFAULT_THUMB_HEIGHT,
            cell_margin: DEFAULT_CELL_MARGIN,
            border: 2,
            slack_rows: DEFAULT_SLACK_ROWS,
            fade_frames: DEFAULT_FADE_FRAMES,
            frame_interval: MIN_FRAME_INTERVAL,
            tick_budget: DEFAULT_TICK_BUDGET,
            fade_margin_px: DEFAULT_FADE_MARGIN_PX,
            prefetch_rows: DEFAULT_PREFETCH_ROWS,
            workers: DEFAULT_WORKERS,
            cache_memory_mb: DEFAULT_CACHE_MEMORY_MB,
            cache_dir: None,
            palette: Palette::default(),
        }
    }
}

impl GridConfig {
    pub fn with_thumbnail_size(mut self, width: u32, height: u32) -> Self {
        self.thumb_width = width;
        self.thumb_height = height;
        self
    }

    pub fn with_cell_margin(mut self, margin: u32) -> Self {
        self.cell_margin = margin;
        self
    }

    pub fn with_fade_frames(mut self, frames: u8) -> Self {
        self.fade_frames = frames;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_tick_budget(mut self, budget: Duration) -> Self {
        self.tick_budget = budget;
        self
    }

    pub fn with_fade_margin(mut self, margin_px: u32) -> Self {
        self.fade_margin_px = margin_px;
        self
    }

    pub fn with_prefetch_rows(mut self, rows: usize) -> Self {
        self.prefetch_rows = rows;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cache_memory(mut self, megabytes: usize) -> Self {
        self.cache_memory_mb = megabytes;
        self
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Worker pool settings derived from this configuration.
    pub fn queue_builder(&self) -> ThumbnailQueueBuilder {
        let builder = ThumbnailQueueBuilder::new()
            .workers(self.workers)
            .max_memory_mb(self.cache_memory_mb);
        match &self.cache_dir {
            Some(dir) => builder.cache_dir(dir.clone()),
            None => builder,
        }
    }

    /// Full cell width: thumbnail box plus margin.
    pub fn cell_width(&self) -> u32 {
        self.thumb_width + self.cell_margin
    }

    /// Full cell height: thumbnail box plus margin.
    pub fn cell_height(&self) -> u32 {
        self.thumb_height + self.cell_margin
    }

    /// Checks the configuration and normalises the animation interval.
    pub fn validate(mut self) -> Result<Self, GridError> {
        if self.thumb_width == 0 || self.thumb_height == 0 {
            return Err(GridError::InvalidConfig(format!(
                "thumbnail box must be non-empty, got {}x{}",
                self.thumb_width, self.thumb_height
            )));
        }
        if !(1..=MAX_FADE_FRAMES).contains(&self.fade_frames) {
            return Err(GridError::InvalidConfig(format!(
                "fade frames must be within 1..={}, got {}",
                MAX_FADE_FRAMES, self.fade_frames
            )));
        }
        if self.border * 2 >= self.thumb_width.min(self.thumb_height) {
            return Err(GridError::InvalidConfig(format!(
                "border {} leaves no room inside the thumbnail box",
                self.border
            )));
        }
        self.frame_interval = self.frame_interval.max(MIN_FRAME_INTERVAL);
        Ok(self)
    }
}
