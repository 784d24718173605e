//! Where worker threads get thumbnail bitmaps from.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{trace, warn};

use super::cache::CacheKey;
use super::generator::ThumbnailGenerator;
use super::queue::ThumbnailRequest;
use crate::error::ThumbnailError;
use crate::models::MediaId;

/// Produces a bitmap for a request. Called from worker threads.
pub trait ThumbnailSource: Send + Sync + 'static {
    fn load(&self, request: &ThumbnailRequest) -> Result<RgbaImage, ThumbnailError>;

    /// Forget anything persisted for `id` so the next load regenerates it.
    fn invalidate(&self, _id: MediaId) {}
}

/// Decodes source files with the generator, optionally persisting results
/// as JPEG files in a disk cache directory.
pub struct FileThumbnailSource {
    box_width: u32,
    box_height: u32,
    cache_dir: Option<PathBuf>,
}

impl FileThumbnailSource {
    pub fn new(box_width: u32, box_height: u32) -> Self {
        Self {
            box_width,
            box_height,
            cache_dir: None,
        }
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(?dir, error = ?e, "Failed to create cache directory");
        }
        self.cache_dir = Some(dir);
        self
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    fn disk_path(&self, id: MediaId) -> Option<PathBuf> {
        let key = CacheKey::new(id, self.box_width, self.box_height);
        self.cache_dir.as_ref().map(|dir| dir.join(key.disk_filename()))
    }
}

impl ThumbnailSource for FileThumbnailSource {
    fn load(&self, request: &ThumbnailRequest) -> Result<RgbaImage, ThumbnailError> {
        let path = request.path.as_deref().ok_or(ThumbnailError::NoSource)?;
        if !path.exists() {
            return Err(ThumbnailError::Io(format!("{:?} does not exist", path)));
        }

        let disk_path = self.disk_path(request.id);
        if let Some(disk_path) = disk_path.as_deref().filter(|p| p.exists()) {
            match ThumbnailGenerator::load_thumbnail(disk_path) {
                Ok(img) => {
                    trace!(?path, "Disk cache hit");
                    return Ok(img);
                }
                // Corrupt entry, regenerate below
                Err(_) => {
                    let _ = std::fs::remove_file(disk_path);
                }
            }
        }

        let img = ThumbnailGenerator::generate(path, self.box_width, self.box_height)?;

        if let Some(disk_path) = disk_path.as_deref() {
            if let Err(e) = ThumbnailGenerator::save_thumbnail(&img, disk_path) {
                warn!(?disk_path, error = ?e, "Failed to persist thumbnail");
            }
        }
        Ok(img)
    }

    fn invalidate(&self, id: MediaId) {
        if let Some(disk_path) = self.disk_path(id).filter(|p| p.exists()) {
            let _ = std::fs::remove_file(disk_path);
        }
    }
}
