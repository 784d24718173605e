use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use xxhash_rust::xxh3::xxh3_64;

use crate::error::GridError;
use crate::thumbnails::Bitmap;

/// Stable identity of a media item, as handed out by the data layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaId(pub u64);

impl MediaId {
    /// Derive an identity from raw hash bytes (e.g. a file's sha256).
    pub fn from_hash_bytes(bytes: &[u8]) -> Self {
        Self(xxh3_64(bytes))
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Per-file service state that the grid shows and filters on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationFlags {
    pub inbox: bool,
    pub pending: bool,
    pub petitioned: bool,
}

/// One file record as read from the data layer.
#[derive(Debug, Clone)]
pub struct MediaResult {
    pub id: MediaId,
    pub size: u64,
    pub duration_ms: Option<u32>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub import_time: i64,
    pub path: Option<PathBuf>,
    /// Namespaced tags, namespace -> values.
    pub tags: BTreeMap<String, Vec<String>>,
    pub flags: LocationFlags,
}

impl MediaResult {
    pub fn new(id: MediaId, size: u64) -> Self {
        Self {
            id,
            size,
            duration_ms: None,
            mime: String::from("application/octet-stream"),
            width: 0,
            height: 0,
            import_time: 0,
            path: None,
            tags: BTreeMap::new(),
            flags: LocationFlags::default(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_import_time(mut self, import_time: i64) -> Self {
        self.import_time = import_time;
        self
    }

    pub fn with_tag(mut self, namespace: &str, value: &str) -> Self {
        self.tags
            .entry(namespace.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_inbox(mut self, inbox: bool) -> Self {
        self.flags.inbox = inbox;
        self
    }

    /// Values carried under `namespace`, empty when the namespace is absent.
    pub fn namespace_values(&self, namespace: &str) -> &[String] {
        self.tags.get(namespace).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Load state of a thumbnail.
///
/// `Unloaded -> Loading -> Loaded -> Stale -> Loading`, with `Errored` as a
/// terminal state that is never retried automatically.
#[derive(Debug, Clone)]
pub enum ThumbnailState {
    Unloaded,
    Loading,
    Loaded(Bitmap),
    /// Invalidated; the old bitmap stays on screen until the reload lands.
    Stale(Bitmap),
    Errored,
}

/// The lazily loaded bitmap of one media item.
///
/// Holds the owner's identity rather than a reference to the list; the owner
/// is resolved through `MediaList::index_of`.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    media: MediaId,
    state: ThumbnailState,
}

impl Thumbnail {
    pub fn new(media: MediaId) -> Self {
        Self {
            media,
            state: ThumbnailState::Unloaded,
        }
    }

    pub fn media(&self) -> MediaId {
        self.media
    }

    pub fn state(&self) -> &ThumbnailState {
        &self.state
    }

    /// Bitmap to draw, if any (loaded or stale).
    pub fn bitmap(&self) -> Option<&Bitmap> {
        match &self.state {
            ThumbnailState::Loaded(bitmap) | ThumbnailState::Stale(bitmap) => Some(bitmap),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ThumbnailState::Loaded(_))
    }

    pub fn is_errored(&self) -> bool {
        matches!(self.state, ThumbnailState::Errored)
    }

    /// True when a load request should be issued for this thumbnail.
    pub fn needs_load(&self) -> bool {
        matches!(self.state, ThumbnailState::Unloaded | ThumbnailState::Stale(_))
    }

    pub fn mark_loading(&mut self) {
        self.state = match std::mem::replace(&mut self.state, ThumbnailState::Unloaded) {
            // keep showing the stale bitmap while it reloads
            ThumbnailState::Stale(bitmap) => ThumbnailState::Stale(bitmap),
            ThumbnailState::Loaded(bitmap) => ThumbnailState::Loaded(bitmap),
            _ => ThumbnailState::Loading,
        };
    }

    /// Drops a load that will never be answered. Only `Loading` changes.
    pub fn abandon_load(&mut self) {
        if matches!(self.state, ThumbnailState::Loading) {
            self.state = ThumbnailState::Unloaded;
        }
    }

    pub fn set_loaded(&mut self, bitmap: Bitmap) {
        self.state = ThumbnailState::Loaded(bitmap);
    }

    pub fn set_errored(&mut self) {
        self.state = ThumbnailState::Errored;
    }

    /// Marks the bitmap out of date. Thumbnails with no bitmap go back to
    /// `Unloaded`.
    pub fn invalidate(&mut self) {
        self.state = match std::mem::replace(&mut self.state, ThumbnailState::Unloaded) {
            ThumbnailState::Loaded(bitmap) | ThumbnailState::Stale(bitmap) => {
                ThumbnailState::Stale(bitmap)
            }
            _ => ThumbnailState::Unloaded,
        };
    }
}

/// A single file.
#[derive(Debug, Clone)]
pub struct Singleton {
    result: MediaResult,
    thumbnail: Thumbnail,
}

impl Singleton {
    pub fn new(result: MediaResult) -> Self {
        let thumbnail = Thumbnail::new(result.id);
        Self { result, thumbnail }
    }

    pub fn result(&self) -> &MediaResult {
        &self.result
    }

    pub fn result_mut(&mut self) -> &mut MediaResult {
        &mut self.result
    }
}

/// An ordered group of singletons sharing a collect key.
#[derive(Debug, Clone)]
pub struct Collection {
    id: MediaId,
    key: Vec<(String, String)>,
    members: Vec<Singleton>,
    thumbnail: Thumbnail,
}

impl Collection {
    /// Builds a collection. The identity is derived from the key so it stays
    /// stable while members come and go.
    pub fn new(key: Vec<(String, String)>, members: Vec<Singleton>) -> Result<Self, GridError> {
        if members.is_empty() {
            return Err(GridError::EmptyCollection);
        }
        let id = Self::identity_for(&key);
        Ok(Self {
            id,
            key,
            members,
            thumbnail: Thumbnail::new(id),
        })
    }

    pub fn identity_for(key: &[(String, String)]) -> MediaId {
        let mut data = Vec::with_capacity(64);
        data.extend_from_slice(b"collection\0");
        for (namespace, value) in key {
            data.extend_from_slice(namespace.as_bytes());
            data.push(b':');
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        MediaId(xxh3_64(&data))
    }

    pub fn key(&self) -> &[(String, String)] {
        &self.key
    }

    pub fn members(&self) -> &[Singleton] {
        &self.members
    }

    pub(crate) fn members_mut(&mut self) -> &mut Vec<Singleton> {
        &mut self.members
    }

    pub fn into_members(self) -> Vec<Singleton> {
        self.members
    }

    /// Drops members whose id is in `ids`, returning how many went.
    pub fn remove_members(&mut self, ids: &HashSet<MediaId>) -> usize {
        let before = self.members.len();
        self.members.retain(|m| !ids.contains(&m.result.id));
        before - self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// A displayable unit of the grid.
#[derive(Debug, Clone)]
pub enum Media {
    Singleton(Singleton),
    Collection(Collection),
}

impl Media {
    pub fn from_result(result: MediaResult) -> Self {
        Media::Singleton(Singleton::new(result))
    }

    pub fn id(&self) -> MediaId {
        match self {
            Media::Singleton(s) => s.result.id,
            Media::Collection(c) => c.id,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Media::Collection(_))
    }

    /// Total bytes across all files.
    pub fn size(&self) -> u64 {
        self.flat_results().iter().map(|r| r.size).sum()
    }

    /// Summed duration, `None` when no file has one.
    pub fn duration_ms(&self) -> Option<u64> {
        self.flat_results()
            .iter()
            .filter_map(|r| r.duration_ms)
            .fold(None, |acc, d| Some(acc.unwrap_or(0) + d as u64))
    }

    /// Every file this media stands for, in member order.
    pub fn flat_results(&self) -> Vec<&MediaResult> {
        match self {
            Media::Singleton(s) => vec![&s.result],
            Media::Collection(c) => c.members.iter().map(|m| &m.result).collect(),
        }
    }

    pub fn num_files(&self) -> usize {
        match self {
            Media::Singleton(_) => 1,
            Media::Collection(c) => c.members.len(),
        }
    }

    /// The file whose metadata (and thumbnail) represents this media.
    pub fn representative(&self) -> &MediaResult {
        match self {
            Media::Singleton(s) => &s.result,
            // Collections are never empty.
            Media::Collection(c) => &c.members[0].result,
        }
    }

    /// Newest import time among the files.
    pub fn import_time(&self) -> i64 {
        self.flat_results()
            .iter()
            .map(|r| r.import_time)
            .max()
            .unwrap_or(0)
    }

    pub fn has_inbox(&self) -> bool {
        self.flat_results().iter().any(|r| r.flags.inbox)
    }

    pub fn is_archived(&self) -> bool {
        !self.has_inbox()
    }

    /// Whether `id` names this media or one of its members.
    pub fn contains(&self, id: MediaId) -> bool {
        self.id() == id || self.flat_results().iter().any(|r| r.id == id)
    }

    pub fn thumbnail(&self) -> &Thumbnail {
        match self {
            Media::Singleton(s) => &s.thumbnail,
            Media::Collection(c) => &c.thumbnail,
        }
    }

    pub fn thumbnail_mut(&mut self) -> &mut Thumbnail {
        match self {
            Media::Singleton(s) => &mut s.thumbnail,
            Media::Collection(c) => &mut c.thumbnail,
        }
    }

    /// Abandons pending loads of this media and, for collections, of every
    /// member carried over from an earlier grouping.
    pub fn abandon_loads(&mut self) {
        match self {
            Media::Singleton(s) => s.thumbnail.abandon_load(),
            Media::Collection(c) => {
                c.thumbnail.abandon_load();
                for member in c.members.iter_mut() {
                    member.thumbnail.abandon_load();
                }
            }
        }
    }

    /// Applies `update` to the flags of every file whose id is in `ids`.
    /// Returns true if any file matched.
    pub fn update_flags<F>(&mut self, ids: &HashSet<MediaId>, mut update: F) -> bool
    where
        F: FnMut(&mut LocationFlags),
    {
        let whole = ids.contains(&self.id());
        let mut touched = false;
        match self {
            Media::Singleton(s) => {
                if whole {
                    update(&mut s.result.flags);
                    touched = true;
                }
            }
            Media::Collection(c) => {
                for member in c.members.iter_mut() {
                    if whole || ids.contains(&member.result.id) {
                        update(&mut member.result.flags);
                        touched = true;
                    }
                }
            }
        }
        touched
    }

    /// Applies `update` to every file.
    pub fn update_all_flags<F>(&mut self, mut update: F)
    where
        F: FnMut(&mut LocationFlags),
    {
        match self {
            Media::Singleton(s) => update(&mut s.result.flags),
            Media::Collection(c) => {
                for member in c.members.iter_mut() {
                    update(&mut member.result.flags);
                }
            }
        }
    }

    /// Splits back into singletons.
    pub fn into_singletons(self) -> Vec<Singleton> {
        match self {
            Media::Singleton(s) => vec![s],
            Media::Collection(c) => c.into_members(),
        }
    }
}
