//! The sorted, optionally collected list of media shown by the grid.
//!
//! Lives on the UI thread. Publishes `SortChanged`/`CollectChanged` through
//! the event bus and reports which index ranges a mutation disturbed so the
//! renderer can invalidate only what moved.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::media::{Collection, LocationFlags, Media, MediaId, MediaResult, Singleton};
use super::sort::{CollectKey, SortKey};
use crate::ui::events::{EventBus, GridEvent};

/// What a list mutation did to index positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    /// Nothing moved.
    Unchanged,
    /// Positions from this index onward may differ.
    InvalidatedFrom(usize),
    /// The whole list was rebuilt.
    Replaced,
}

/// Result of a removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// Top-level media that left the list.
    pub removed: Vec<MediaId>,
    /// Collections that lost members but stayed.
    pub shrunk: Vec<MediaId>,
    /// First index whose contents changed.
    pub first_changed: Option<usize>,
}

impl Removal {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.shrunk.is_empty()
    }

    pub fn change(&self) -> ListChange {
        match self.first_changed {
            Some(index) => ListChange::InvalidatedFrom(index),
            None => ListChange::Unchanged,
        }
    }
}

pub struct MediaList {
    items: Vec<Media>,
    positions: HashMap<MediaId, usize>,
    sort: SortKey,
    collect: CollectKey,
    bus: Rc<EventBus>,
}

impl MediaList {
    pub fn new(bus: Rc<EventBus>, sort: SortKey, collect: CollectKey) -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
            sort,
            collect,
            bus,
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds media read from the data layer.
    ///
    /// With `append == false` the list is replaced. Otherwise new results are
    /// merged in at their sorted positions, joining existing collections
    /// where their collect key matches. Results already present, or repeated
    /// within `results`, are skipped; the first occurrence wins.
    pub fn add_media(&mut self, results: Vec<MediaResult>, append: bool) -> ListChange {
        if !append {
            let count = results.len();
            let mut seen = HashSet::with_capacity(count);
            let singletons = results
                .into_iter()
                .filter(|r| seen.insert(r.id))
                .map(Singleton::new)
                .collect();
            self.items = self.group(singletons);
            self.sort_items();
            info!(count, items = self.items.len(), "Replaced media list");
            return ListChange::Replaced;
        }

        let mut known = self.all_file_ids();
        let before: Vec<MediaId> = self.items.iter().map(Media::id).collect();
        let mut first_touched: Option<usize> = None;
        let mut fresh = Vec::new();

        for result in results {
            if !known.insert(result.id) {
                debug!(id = %result.id, "Skipping media already in list");
                continue;
            }
            let singleton = Singleton::new(result);
            if let Some(key) = self.collect.group_values(singleton.result()) {
                let cid = Collection::identity_for(&key);
                if let Some(&index) = self.positions.get(&cid) {
                    if let Media::Collection(c) = &mut self.items[index] {
                        c.members_mut().push(singleton);
                        first_touched = Some(first_touched.map_or(index, |f| f.min(index)));
                        continue;
                    }
                }
            }
            fresh.push(singleton);
        }

        if fresh.is_empty() && first_touched.is_none() {
            return ListChange::Unchanged;
        }

        let added = fresh.len();
        let grouped = self.group(fresh);
        self.items.extend(grouped);
        self.sort_items();

        let first_moved = before
            .iter()
            .zip(self.items.iter())
            .position(|(old, new)| *old != new.id())
            .unwrap_or(before.len());
        let first = first_touched.map_or(first_moved, |t| t.min(first_moved));

        debug!(added, first, "Appended media");
        ListChange::InvalidatedFrom(first)
    }

    /// Re-sorts by `key`. Sorting twice with the same key is a no-op.
    pub fn sort(&mut self, key: SortKey) -> ListChange {
        let before: Vec<MediaId> = self.items.iter().map(Media::id).collect();
        self.sort = key;
        self.sort_items();
        self.bus.publish(GridEvent::SortChanged(self.sort.clone()));

        match before
            .iter()
            .zip(self.items.iter())
            .position(|(old, new)| *old != new.id())
        {
            Some(first) => {
                debug!(sort = %self.sort, first, "Sorted media list");
                ListChange::InvalidatedFrom(first)
            }
            None => ListChange::Unchanged,
        }
    }

    /// Regroups every file under `key`. Identities of collections change, so
    /// callers must clear the selection.
    pub fn collect(&mut self, key: CollectKey) -> ListChange {
        self.collect = key;
        let singletons: Vec<Singleton> = std::mem::take(&mut self.items)
            .into_iter()
            .flat_map(Media::into_singletons)
            .collect();
        self.items = self.group(singletons);
        self.sort_items();
        info!(collect = %self.collect, items = self.items.len(), "Collected media");
        self.bus.publish(GridEvent::CollectChanged(self.collect.clone()));
        ListChange::Replaced
    }

    /// Removes media by id. Ids may name top-level media or files inside a
    /// collection; a collection left empty is removed too.
    pub fn remove_media(&mut self, ids: &[MediaId]) -> Removal {
        let ids: HashSet<MediaId> = ids.iter().copied().collect();
        let mut removal = Removal::default();
        if ids.is_empty() {
            return removal;
        }

        let mut kept = Vec::with_capacity(self.items.len());
        for (index, mut media) in std::mem::take(&mut self.items).into_iter().enumerate() {
            let id = media.id();
            let gone = if ids.contains(&id) {
                true
            } else if let Media::Collection(c) = &mut media {
                if c.remove_members(&ids) > 0 {
                    if c.is_empty() {
                        true
                    } else {
                        removal.shrunk.push(id);
                        removal.first_changed.get_or_insert(index);
                        false
                    }
                } else {
                    false
                }
            } else {
                false
            };

            if gone {
                removal.removed.push(id);
                removal.first_changed.get_or_insert(index);
            } else {
                kept.push(media);
            }
        }
        self.items = kept;
        self.rebuild_positions();

        if !removal.is_empty() {
            debug!(
                removed = removal.removed.len(),
                shrunk = removal.shrunk.len(),
                "Removed media"
            );
        }
        removal
    }

    /// Removes everything.
    pub fn clear(&mut self) -> Vec<MediaId> {
        let removed = self.items.iter().map(Media::id).collect();
        self.items.clear();
        self.positions.clear();
        removed
    }

    /// Applies `update` to the flags of the named files. Returns the indices
    /// of media that changed.
    pub fn update_flags<F>(&mut self, ids: &[MediaId], mut update: F) -> Vec<usize>
    where
        F: FnMut(&mut LocationFlags),
    {
        let ids: HashSet<MediaId> = ids.iter().copied().collect();
        self.items
            .iter_mut()
            .enumerate()
            .filter_map(|(index, media)| media.update_flags(&ids, &mut update).then_some(index))
            .collect()
    }

    /// Resets every thumbnail still waiting on a load, collection members
    /// included, so the next request pass asks for it again.
    pub fn abandon_loads(&mut self) {
        for media in self.items.iter_mut() {
            media.abandon_loads();
        }
    }

    /// Applies `update` to every file in the list.
    pub fn update_all_flags<F>(&mut self, mut update: F)
    where
        F: FnMut(&mut LocationFlags),
    {
        for media in self.items.iter_mut() {
            media.update_all_flags(&mut update);
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Media> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Media> {
        self.items.get_mut(index)
    }

    pub fn index_of(&self, id: MediaId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn media(&self, id: MediaId) -> Option<&Media> {
        self.index_of(id).and_then(|i| self.items.get(i))
    }

    pub fn media_mut(&mut self, id: MediaId) -> Option<&mut Media> {
        let index = self.index_of(id)?;
        self.items.get_mut(index)
    }

    pub fn contains(&self, id: MediaId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Media> {
        self.items.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = MediaId> + '_ {
        self.items.iter().map(Media::id)
    }

    /// Ids of the contiguous slice between `a` and `b`, inclusive, in either
    /// order. Empty if either is missing.
    pub fn ids_between(&self, a: MediaId, b: MediaId) -> Vec<MediaId> {
        match (self.index_of(a), self.index_of(b)) {
            (Some(ia), Some(ib)) => {
                let (lo, hi) = if ia <= ib { (ia, ib) } else { (ib, ia) };
                self.items[lo..=hi].iter().map(Media::id).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Number of files, counting collection members.
    pub fn num_files(&self) -> usize {
        self.items.iter().map(Media::num_files).sum()
    }

    pub fn sort_key(&self) -> &SortKey {
        &self.sort
    }

    pub fn collect_key(&self) -> &CollectKey {
        &self.collect
    }

    /// Hash of the id sequence; changes whenever order or membership does.
    pub fn list_hash(&self) -> u64 {
        let mut data = Vec::with_capacity(self.items.len() * 8);
        for media in &self.items {
            data.extend_from_slice(&media.id().0.to_le_bytes());
        }
        xxh3_64(&data)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn all_file_ids(&self) -> HashSet<MediaId> {
        self.items
            .iter()
            .flat_map(|m| m.flat_results().into_iter().map(|r| r.id))
            .collect()
    }

    fn sort_items(&mut self) {
        let key = &self.sort;
        for media in self.items.iter_mut() {
            if let Media::Collection(c) = media {
                c.members_mut()
                    .sort_by(|a, b| key.compare_results(a.result(), b.result()));
            }
        }
        self.items.sort_by(|a, b| key.compare(a, b));
        self.rebuild_positions();
    }

    fn rebuild_positions(&mut self) {
        self.positions.clear();
        self.positions.reserve(self.items.len());
        for (index, media) in self.items.iter().enumerate() {
            self.positions.insert(media.id(), index);
        }
    }

    /// Groups singletons under the active collect key, preserving first-seen
    /// order of the groups.
    fn group(&self, singletons: Vec<Singleton>) -> Vec<Media> {
        let mut out = Vec::with_capacity(singletons.len());
        let mut groups: Vec<(Vec<(String, String)>, Vec<Singleton>)> = Vec::new();
        let mut group_index: HashMap<Vec<(String, String)>, usize> = HashMap::new();

        for singleton in singletons {
            match self.collect.group_values(singleton.result()) {
                Some(key) => {
                    let slot = *group_index.entry(key.clone()).or_insert_with(|| {
                        groups.push((key, Vec::new()));
                        groups.len() - 1
                    });
                    groups[slot].1.push(singleton);
                }
                None => out.push(Media::Singleton(singleton)),
            }
        }

        for (key, members) in groups {
            match Collection::new(key, members) {
                Ok(collection) => out.push(Media::Collection(collection)),
                Err(e) => warn!(error = %e, "Skipping collection"),
            }
        }
        out
    }
}

impl std::fmt::Debug for MediaList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaList")
            .field("len", &self.items.len())
            .field("sort", &self.sort)
            .field("collect", &self.collect)
            .finish()
    }
}
