//! Headless driver for the thumbnail grid.
//!
//! With image paths as arguments the grid thumbnails those files; without,
//! it runs against generated bitmaps. Either way it scrolls, selects and
//! animates once and logs what the grid reports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use tracing::{info, warn};

use thumbgrid::models::ThumbnailState;
use thumbgrid::thumbnails::cache::default_cache_dir;
use thumbgrid::thumbnails::{ThumbnailGenerator, ThumbnailRequest};
use thumbgrid::{
    GridConfig, GridEvent, Key, MediaId, MediaResult, Modifiers, PixelBuffer, PointerButton,
    SortBy, SortKey, ThumbnailError, ThumbnailGrid, ThumbnailSource,
};

const CANVAS_WIDTH: u32 = 800;
const CANVAS_HEIGHT: u32 = 600;
const SYNTHETIC_COUNT: u64 = 500;

/// Gradient bitmaps derived from the media id.
struct SyntheticSource {
    width: u32,
    height: u32,
}

impl ThumbnailSource for SyntheticSource {
    fn load(&self, request: &ThumbnailRequest) -> Result<RgbaImage, ThumbnailError> {
        let seed = request.id.0;
        let tint = (seed.wrapping_mul(37) % 256) as u8;
        Ok(RgbaImage::from_fn(self.width, self.height, |x, y| {
            let r = (x * 255 / self.width.max(1)) as u8;
            let g = (y * 255 / self.height.max(1)) as u8;
            Rgba([r, g, tint, 255])
        }))
    }
}

fn file_results(paths: &[PathBuf]) -> Vec<MediaResult> {
    paths
        .iter()
        .filter(|path| {
            let supported = ThumbnailGenerator::can_generate(path);
            if !supported {
                warn!(path = %path.display(), "Skipping unsupported file type");
            }
            supported
        })
        .filter_map(|path| match std::fs::metadata(path) {
            Ok(meta) => {
                let id = MediaId::from_hash_bytes(path.to_string_lossy().as_bytes());
                Some(MediaResult::new(id, meta.len()).with_path(path))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                None
            }
        })
        .collect()
}

fn synthetic_results() -> Vec<MediaResult> {
    (0..SYNTHETIC_COUNT)
        .map(|i| MediaResult::new(MediaId(i), 1024 * (i % 97 + 1)).with_import_time(i as i64))
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("thumbgrid=info".parse()?),
        )
        .init();

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let mut config = GridConfig::default();
    if !paths.is_empty() {
        match default_cache_dir() {
            Ok(dir) => config = config.with_cache_dir(dir),
            Err(e) => warn!(error = %e, "No disk cache, thumbnails stay in memory"),
        }
    }

    let (queue, results) = if paths.is_empty() {
        let source = SyntheticSource {
            width: config.thumb_width,
            height: config.thumb_height,
        };
        let queue = config
            .queue_builder()
            .build(Arc::new(source))
            .context("Failed to start thumbnail workers")?;
        (queue, synthetic_results())
    } else {
        let queue = config
            .queue_builder()
            .build_file_backed(config.thumb_width, config.thumb_height)
            .context("Failed to start thumbnail workers")?;
        (queue, file_results(&paths))
    };

    let mut grid = ThumbnailGrid::new(config, queue)?;
    grid.bus().subscribe(|event| {
        if let GridEvent::SelectionChanged { selected, focused } = event {
            info!(selected = selected.len(), ?focused, "Selection changed");
        }
    });

    grid.resize(CANVAS_WIDTH, CANVAS_HEIGHT);
    grid.add_media(results, false);
    grid.sort(SortKey::ascending(SortBy::FileSize));

    let background = grid.config().palette.background;
    let mut screen = PixelBuffer::new(CANVAS_WIDTH, CANVAS_HEIGHT, background);
    drain(&mut grid, &mut screen);

    grid.scroll_by(CANVAS_HEIGHT as i64 / 2);
    grid.pointer_click(10, 10, PointerButton::Primary, Modifiers::empty());
    grid.key_press(Key::Right, Modifiers::SHIFT);
    grid.key_press(Key::Down, Modifiers::SHIFT);
    drain(&mut grid, &mut screen);

    grid.paint(&mut screen);
    let loaded = grid
        .list()
        .iter()
        .filter(|m| matches!(m.thumbnail().state(), ThumbnailState::Loaded(_)))
        .count();
    info!(
        loaded,
        cached = grid.queue().cache().len(),
        status = %grid.status_text(),
        "Done"
    );
    Ok(())
}

/// Handles results until the queue goes quiet, ticking fades as they come.
fn drain(grid: &mut ThumbnailGrid, screen: &mut PixelBuffer) {
    while grid.wait_for_thumbnails(Duration::from_millis(250)) > 0 {
        grid.tick_animation(screen);
    }
    while !grid.animator().is_idle() {
        grid.tick_animation(screen);
    }
}
