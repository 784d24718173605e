//! Thumbnail pipeline for the grid.
//!
//! This module provides:
//! - `ThumbnailGenerator` - Decodes and fits source images into the thumbnail box
//! - `ThumbnailCache` - Shared in-memory bitmap cache with LRU eviction
//! - `ThumbnailSource` - Where worker threads get bitmaps from
//! - `ThumbnailQueue` - Bounded worker pool with visible-first ordering

use std::sync::Arc;

use image::RgbaImage;

pub mod cache;
pub mod generator;
pub mod queue;
pub mod source;

pub use cache::{CacheKey, ThumbnailCache};
pub use generator::ThumbnailGenerator;
pub use queue::{
    waterfall_order, RequestStatus, ThumbnailQueue, ThumbnailQueueBuilder, ThumbnailRequest,
    ThumbnailResult,
};
pub use source::{FileThumbnailSource, ThumbnailSource};

/// Decoded thumbnail pixels, shared between workers and the UI thread.
pub type Bitmap = Arc<RgbaImage>;
