//! Virtualized thumbnail grid.
//!
//! Presents a sorted, optionally collected list of media as a scrolling grid
//! of fixed-size thumbnails. Only the visible window is painted; bitmaps are
//! loaded by a background worker pool and cross-faded in as they arrive.

pub mod config;
pub mod error;
pub mod layout;
pub mod models;
pub mod render;
pub mod thumbnails;
pub mod ui;

pub use config::{GridConfig, Palette};
pub use error::{GridError, ThumbnailError};
pub use models::{
    CollectKey, ContentUpdate, ContentUpdateKind, Media, MediaId, MediaList, MediaResult,
    ServiceUpdate, ServiceUpdateKind, SortBy, SortKey, SortOrder,
};
pub use render::{FrameScheduler, PixelBuffer, Rect, Surface};
pub use thumbnails::{ThumbnailQueue, ThumbnailQueueBuilder, ThumbnailSource};
pub use ui::{Action, GridEvent, Key, Modifiers, PointerButton, ThumbnailGrid};
