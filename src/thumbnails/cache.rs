//! Thumbnail caching.
//!
//! - Memory cache: LRU of decoded bitmaps keyed by media id, bounded by bytes
//! - Disk cache keys: xxhash of (version + media id + box size), used by
//!   `FileThumbnailSource` to name its JPEG files
//!
//! The memory cache is shared by the worker pool and the UI thread; every
//! access goes through one mutex so insert, lookup and eviction stay atomic.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

use super::Bitmap;
use crate::models::MediaId;

/// Default memory cache size in megabytes.
pub const DEFAULT_MAX_MEMORY_MB: usize = 192;

/// Minimum memory cache size in megabytes.
const MIN_MEMORY_MB: usize = 16;

/// Maximum memory cache size in megabytes.
const MAX_MEMORY_MB: usize = 1024;

const BYTES_PER_PIXEL: usize = 4;

/// Bump when thumbnail generation semantics change.
const THUMB_CACHE_VERSION: u8 = 1;

/// Cache key for disk cache lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: u64,
}

impl CacheKey {
    pub fn new(id: MediaId, box_width: u32, box_height: u32) -> Self {
        let mut data = Vec::with_capacity(17);
        data.push(THUMB_CACHE_VERSION);
        data.extend_from_slice(&id.0.to_le_bytes());
        data.extend_from_slice(&box_width.to_le_bytes());
        data.extend_from_slice(&box_height.to_le_bytes());
        Self {
            hash: xxh3_64(&data),
        }
    }

    /// Get the filename for disk cache storage.
    pub fn disk_filename(&self) -> String {
        format!("{:016x}.jpg", self.hash)
    }
}

/// Get the default disk cache directory path.
pub fn default_cache_dir() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "thumbgrid").context("Failed to determine project directories")?;
    Ok(proj_dirs.cache_dir().join("thumbs"))
}

fn bitmap_bytes(bitmap: &Bitmap) -> usize {
    (bitmap.width() as usize) * (bitmap.height() as usize) * BYTES_PER_PIXEL
}

struct CacheInner {
    entries: LruCache<MediaId, Bitmap>,
    current_bytes: usize,
}

/// In-memory bitmap cache. Cloning shares the same storage.
#[derive(Clone)]
pub struct ThumbnailCache {
    inner: Arc<Mutex<CacheInner>>,
    max_memory_bytes: usize,
}

impl ThumbnailCache {
    pub fn new(max_memory_mb: usize) -> Self {
        let max_memory_mb = max_memory_mb.clamp(MIN_MEMORY_MB, MAX_MEMORY_MB);
        debug!(max_memory_mb, "Initialized thumbnail cache");

        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                current_bytes: 0,
            })),
            max_memory_bytes: max_memory_mb * 1024 * 1024,
        }
    }

    /// Look up a bitmap, marking it most recently used.
    pub fn get(&self, id: MediaId) -> Option<Bitmap> {
        self.inner.lock().entries.get(&id).cloned()
    }

    pub fn contains(&self, id: MediaId) -> bool {
        self.inner.lock().entries.contains(&id)
    }

    /// Store a bitmap. Inserting an id twice replaces the earlier entry.
    pub fn insert(&self, id: MediaId, bitmap: Bitmap) {
        let mut inner = self.inner.lock();
        self.insert_locked(&mut inner, id, bitmap);
    }

    /// Store a bitmap unless `skip` says otherwise. `skip` runs with the
    /// cache locked. Returns whether the bitmap was stored.
    pub fn insert_unless(
        &self,
        id: MediaId,
        bitmap: Bitmap,
        skip: impl FnOnce() -> bool,
    ) -> bool {
        let mut inner = self.inner.lock();
        if skip() {
            return false;
        }
        self.insert_locked(&mut inner, id, bitmap);
        true
    }

    fn insert_locked(&self, inner: &mut CacheInner, id: MediaId, bitmap: Bitmap) {
        let new_size = bitmap_bytes(&bitmap);

        if let Some(old) = inner.entries.pop(&id) {
            inner.current_bytes = inner.current_bytes.saturating_sub(bitmap_bytes(&old));
        }

        // Evict least recently used entries
        while inner.current_bytes + new_size > self.max_memory_bytes {
            match inner.entries.pop_lru() {
                Some((evicted_id, evicted)) => {
                    inner.current_bytes =
                        inner.current_bytes.saturating_sub(bitmap_bytes(&evicted));
                    trace!(%evicted_id, current_bytes = inner.current_bytes, "Evicted thumbnail");
                }
                None => break,
            }
        }

        inner.entries.put(id, bitmap);
        inner.current_bytes += new_size;
    }

    /// Drop a bitmap so the next request regenerates it.
    pub fn remove(&self, id: MediaId) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.pop(&id) {
            Some(old) => {
                inner.current_bytes = inner.current_bytes.saturating_sub(bitmap_bytes(&old));
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.current_bytes = 0;
        debug!("Cleared memory cache");
    }

    /// Get the current memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.inner.lock().current_bytes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the maximum memory limit in bytes.
    pub fn max_memory(&self) -> usize {
        self.max_memory_bytes
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORY_MB)
    }
}
