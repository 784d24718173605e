//! The thumbnail grid: one object owning the media list, selection,
//! viewport, renderer, fade animator and thumbnail queue.
//!
//! Everything here runs on the UI thread. Worker results come back through
//! [`ThumbnailGrid::process_thumbnail_results`], which the host calls from
//! its idle or timer hook.

use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::actions::{Action, ActionDispatcher, ExternalActions};
use super::events::{EventBus, GridEvent};
use super::keybindings::{
    default_bindings, BindingTable, Direction, Input, Key, Modifiers, PointerButton,
};
use super::selection::{SelectFilter, SelectionController};
use crate::config::GridConfig;
use crate::error::{GridError, ThumbnailError};
use crate::layout::ViewportState;
use crate::models::{
    CollectKey, ContentUpdate, ListChange, Media, MediaId, MediaList, MediaResult, ServiceUpdate,
    SortKey, UpdateOutcome,
};
use crate::render::{
    CanvasRenderer, FadeAnimator, FrameScheduler, ManualScheduler, RedrawReport, RenderContext,
    Surface, TickOutcome,
};
use crate::thumbnails::{
    waterfall_order, Bitmap, RequestStatus, ThumbnailQueue, ThumbnailRequest, ThumbnailResult,
};

/// What happened to a thumbnail result handed to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDisposition {
    /// The media left the list; the bitmap only lives on in the cache.
    Dropped,
    /// The request had been cancelled.
    Cancelled,
    /// Cell now shows the error placeholder.
    Errored,
    /// A cross-fade was registered.
    Faded,
    /// Cell repainted in one step.
    Redrawn,
    /// Stored on the media; painted when the cell is next exposed.
    Deferred,
}

enum Bindings {
    Default,
    Custom(BindingTable),
}

impl Bindings {
    fn table(&self) -> &BindingTable {
        match self {
            Bindings::Default => default_bindings(),
            Bindings::Custom(table) => table,
        }
    }
}

pub struct ThumbnailGrid {
    config: GridConfig,
    bus: Rc<EventBus>,
    list: MediaList,
    selection: SelectionController,
    viewport: ViewportState,
    renderer: CanvasRenderer,
    animator: FadeAnimator,
    queue: ThumbnailQueue,
    scheduler: Rc<dyn FrameScheduler>,
    dispatcher: ActionDispatcher,
    bindings: Bindings,
    last_status: Option<String>,
}

impl ThumbnailGrid {
    pub fn new(config: GridConfig, queue: ThumbnailQueue) -> Result<Self, GridError> {
        let config = config.validate()?;
        let bus = EventBus::new();
        let list = MediaList::new(bus.clone(), SortKey::default(), CollectKey::None);
        let viewport = ViewportState::new(
            config.cell_width(),
            config.cell_height(),
            config.thumb_width,
            config.thumb_height,
        );

        debug!(
            thumb_width = config.thumb_width,
            thumb_height = config.thumb_height,
            "Created thumbnail grid"
        );

        Ok(Self {
            renderer: CanvasRenderer::new(&config),
            animator: FadeAnimator::new(&config),
            selection: SelectionController::new(bus.clone()),
            list,
            viewport,
            queue,
            scheduler: Rc::new(ManualScheduler),
            dispatcher: ActionDispatcher::default(),
            bindings: Bindings::Default,
            last_status: None,
            bus,
            config,
        })
    }

    pub fn with_scheduler(mut self, scheduler: Rc<dyn FrameScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_external_actions(mut self, external: Rc<dyn ExternalActions>) -> Self {
        self.dispatcher = ActionDispatcher::new(external);
        self
    }

    pub fn with_bindings(mut self, bindings: BindingTable) -> Self {
        self.bindings = Bindings::Custom(bindings);
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn list(&self) -> &MediaList {
        &self.list
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn renderer(&self) -> &CanvasRenderer {
        &self.renderer
    }

    pub fn animator(&self) -> &FadeAnimator {
        &self.animator
    }

    pub fn queue(&self) -> &ThumbnailQueue {
        &self.queue
    }

    /// Selected media in list order.
    pub fn selected_ids(&self) -> Vec<MediaId> {
        self.selection.selected_in_order(&self.list)
    }

    /// Files behind the selection, collections expanded, in list order.
    pub fn selected_files(&self) -> Vec<MediaId> {
        self.list
            .iter()
            .filter(|m| self.selection.is_selected(m.id()))
            .flat_map(|m| m.flat_results().into_iter().map(|r| r.id))
            .collect()
    }

    pub fn focused(&self) -> Option<MediaId> {
        self.selection.focus()
    }

    // =========================================================================
    // Model changes
    // =========================================================================

    /// Adds media. `append == false` replaces the view.
    pub fn add_media(&mut self, results: Vec<MediaResult>, append: bool) {
        if !append {
            self.cancel_all_loads();
        }
        let change = self.list.add_media(results, append);
        self.apply_change(change);
        self.selection.prune(&self.list);
        self.refresh();
    }

    pub fn sort(&mut self, key: SortKey) {
        let change = self.list.sort(key);
        self.apply_change(change);
        self.refresh();
    }

    /// Regroups the media. Collection identities change, so the selection
    /// is cleared.
    pub fn collect(&mut self, key: CollectKey) {
        self.cancel_all_loads();
        let change = self.list.collect(key);
        self.selection.clear(&self.list);
        self.apply_change(change);
        self.refresh();
    }

    /// Removes media from this view only.
    pub fn remove_media(&mut self, ids: &[MediaId]) {
        let removal = self.list.remove_media(ids);
        if removal.is_empty() {
            return;
        }
        for id in &removal.removed {
            self.queue.cancel(*id);
        }
        self.animator.cancel(&removal.removed);
        self.apply_change(removal.change());
        self.selection.prune(&self.list);
        self.refresh();
    }

    /// Applies a content update from the data layer. Malformed updates are
    /// logged and ignored.
    pub fn apply_content_update(&mut self, update: ContentUpdate) {
        match self.list.apply_content_update(update) {
            Ok(outcome) => self.apply_outcome(outcome),
            Err(e) => warn!(error = %e, "Ignoring content update"),
        }
    }

    pub fn apply_service_update(&mut self, update: ServiceUpdate) {
        let outcome = self.list.apply_service_update(update);
        self.apply_outcome(outcome);
    }

    fn apply_outcome(&mut self, outcome: UpdateOutcome) {
        for id in &outcome.removed {
            self.queue.cancel(*id);
        }
        self.animator.cancel(&outcome.removed);
        self.apply_change(outcome.change);
        if !outcome.removed.is_empty() {
            self.selection.prune(&self.list);
        }
        self.refresh();
        self.redraw_indices(&outcome.touched);
    }

    fn apply_change(&mut self, change: ListChange) {
        match change {
            ListChange::Unchanged => {}
            ListChange::InvalidatedFrom(index) => self.renderer.invalidate_from(index),
            ListChange::Replaced => {
                self.renderer.invalidate_all();
                self.animator.clear();
            }
        }
        self.viewport.set_item_count(self.list.len());
    }

    fn cancel_all_loads(&mut self) {
        self.queue.cancel_all();
        self.list.abandon_loads();
        self.animator.clear();
    }

    // =========================================================================
    // Viewport
    // =========================================================================

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.viewport.canvas_size() == (width, height) {
            return;
        }
        let columns_changed = self.viewport.set_canvas_size(width, height);
        trace!(width, height, columns_changed, "Grid resized");
        self.refresh();
    }

    pub fn scroll_to(&mut self, y: u32) {
        let before = self.viewport.scroll_y();
        if self.viewport.scroll_to(y) != before {
            self.refresh();
        }
    }

    pub fn scroll_by(&mut self, dy: i64) {
        let before = self.viewport.scroll_y();
        if self.viewport.scroll_by(dy) != before {
            self.refresh();
        }
    }

    // =========================================================================
    // Input
    // =========================================================================

    pub fn pointer_click(&mut self, x: i32, y: i32, button: PointerButton, modifiers: Modifiers) {
        if let Some(action) = self.bindings.table().resolve(modifiers, Input::Button(button)) {
            self.dispatch(action);
            return;
        }
        let hit = self
            .viewport
            .hit_test(x, y)
            .and_then(|index| self.list.get(index))
            .map(Media::id);
        let affected = self.selection.click(&self.list, hit, button, modifiers);
        self.selection_changed(&affected);
    }

    /// Resolves a key press through the bindings. Returns false if unbound.
    pub fn key_press(&mut self, key: Key, modifiers: Modifiers) -> bool {
        match self.bindings.table().resolve(modifiers, Input::Key(key)) {
            Some(action) => {
                self.dispatch(action);
                true
            }
            None => false,
        }
    }

    /// Runs a menu command by name. Unknown names are ignored.
    pub fn run_command(&mut self, command: &str) -> bool {
        let dispatcher = self.dispatcher.clone();
        dispatcher.dispatch_command(self, command)
    }

    pub fn dispatch(&mut self, action: Action) {
        let dispatcher = self.dispatcher.clone();
        dispatcher.dispatch(self, action);
    }

    /// Moves focus and scrolls it into view.
    pub fn navigate(&mut self, direction: Direction, modifiers: Modifiers) {
        let affected = self.selection.navigate(
            &self.list,
            direction,
            modifiers,
            self.viewport.columns(),
            self.viewport.page_rows(),
        );
        if let Some(index) = self.focused().and_then(|id| self.list.index_of(id)) {
            if self.viewport.ensure_visible(index) {
                self.refresh();
            }
        }
        self.selection_changed(&affected);
    }

    pub fn select(&mut self, filter: SelectFilter<'_>) {
        let affected = self.selection.select(&self.list, filter);
        self.selection_changed(&affected);
    }

    pub fn clear_selection(&mut self) {
        let affected = self.selection.clear(&self.list);
        self.selection_changed(&affected);
    }

    fn selection_changed(&mut self, affected: &[MediaId]) {
        if affected.is_empty() {
            return;
        }
        let indices: Vec<usize> = affected
            .iter()
            .filter_map(|id| self.list.index_of(*id))
            .collect();
        self.redraw_indices(&indices);
        self.publish_status();
    }

    // =========================================================================
    // Thumbnails
    // =========================================================================

    /// Drops the bitmaps of `ids` and loads them again. The old bitmap stays
    /// on screen until the new one arrives.
    pub fn refresh_thumbnails(&mut self, ids: &[MediaId]) {
        for id in ids {
            self.queue.invalidate(*id);
            if let Some(media) = self.list.media_mut(*id) {
                media.thumbnail_mut().invalidate();
            }
        }
        debug!(count = ids.len(), "Refreshing thumbnails");
        self.request_thumbnails();
    }

    /// Handles every finished load without blocking. Returns how many
    /// results were handled.
    pub fn process_thumbnail_results(&mut self) -> usize {
        let results = self.queue.poll_results();
        let count = results.len();
        for result in results {
            self.handle_thumbnail_result(result);
        }
        if count > 0 {
            self.request_thumbnails();
        }
        count
    }

    /// Waits up to `timeout` for one result, then drains the rest.
    pub fn wait_for_thumbnails(&mut self, timeout: Duration) -> usize {
        match self.queue.recv_timeout(timeout) {
            Some(result) => {
                self.handle_thumbnail_result(result);
                1 + self.process_thumbnail_results()
            }
            None => 0,
        }
    }

    pub fn handle_thumbnail_result(&mut self, result: ThumbnailResult) -> LoadDisposition {
        let ThumbnailResult { id, outcome, .. } = result;
        let Some(index) = self.list.index_of(id) else {
            trace!(%id, "Thumbnail for media no longer listed");
            return LoadDisposition::Dropped;
        };

        let bitmap = match outcome {
            Ok(bitmap) => bitmap,
            Err(ThumbnailError::Cancelled) => {
                if !self.queue.is_pending(id) {
                    if let Some(media) = self.list.get_mut(index) {
                        media.thumbnail_mut().abandon_load();
                    }
                }
                return LoadDisposition::Cancelled;
            }
            Err(e) => {
                debug!(%id, error = %e, "Showing error placeholder");
                if let Some(media) = self.list.get_mut(index) {
                    media.thumbnail_mut().set_errored();
                }
                self.redraw_indices(&[index]);
                return LoadDisposition::Errored;
            }
        };

        let drawn = self.renderer.is_drawn(index);
        let over_placeholder = drawn && self.renderer.shows_placeholder(id);
        if let Some(media) = self.list.get_mut(index) {
            media.thumbnail_mut().set_loaded(Bitmap::clone(&bitmap));
        }
        if !drawn {
            return LoadDisposition::Deferred;
        }

        if !self.animator.would_fade(&self.viewport, index) {
            // Off screen but inside the buffer band: fix the buffer quietly.
            let ctx = RenderContext {
                list: &self.list,
                selection: &self.selection,
            };
            self.renderer.redraw_cells(&[index], &self.viewport, ctx);
            return LoadDisposition::Deferred;
        }

        if over_placeholder {
            self.animator.register(id, bitmap, self.scheduler.as_ref());
            LoadDisposition::Faded
        } else {
            self.redraw_indices(&[index]);
            LoadDisposition::Redrawn
        }
    }

    /// Requests thumbnails for the visible window and the prefetch margin,
    /// nearest first, and cancels requests that fell out of range.
    fn request_thumbnails(&mut self) {
        let Some(visible) = self.viewport.index_window() else {
            return;
        };
        let Some(outer) = self.viewport.prefetch_window(self.config.prefetch_rows) else {
            return;
        };

        let wanted: HashSet<MediaId> = outer
            .iter()
            .filter_map(|index| self.list.get(index).map(Media::id))
            .collect();
        for id in self.queue.cancel_unless(|id| wanted.contains(&id)) {
            if let Some(media) = self.list.media_mut(id) {
                media.thumbnail_mut().abandon_load();
            }
        }

        let mut cached = Vec::new();
        let mut queued = 0usize;
        for (index, priority) in waterfall_order(visible, outer, self.viewport.columns()) {
            let Some(media) = self.list.get_mut(index) else {
                continue;
            };
            if !media.thumbnail().needs_load() {
                continue;
            }
            let request = ThumbnailRequest::new(media.id(), media.representative().path.clone())
                .with_priority(priority)
                .with_index(index);

            match self.queue.request(request) {
                RequestStatus::Cached(bitmap) => {
                    media.thumbnail_mut().set_loaded(bitmap);
                    cached.push(index);
                }
                RequestStatus::Queued => {
                    media.thumbnail_mut().mark_loading();
                    queued += 1;
                }
                RequestStatus::AlreadyPending => media.thumbnail_mut().mark_loading(),
                RequestStatus::Rejected => {
                    trace!(index, "Thumbnail queue full, retrying later");
                    break;
                }
            }
        }

        if queued > 0 || !cached.is_empty() {
            trace!(queued, cached = cached.len(), ?visible, "Requested thumbnails");
        }
        self.redraw_indices(&cached);
    }

    // =========================================================================
    // Painting
    // =========================================================================

    /// Advances running fades; call when the scheduler fires.
    pub fn tick_animation<S: Surface + ?Sized>(&mut self, screen: &mut S) -> TickOutcome {
        let ctx = RenderContext {
            list: &self.list,
            selection: &self.selection,
        };
        let outcome = self.animator.tick(
            &mut self.renderer,
            &self.viewport,
            ctx,
            screen,
            self.scheduler.as_ref(),
        );
        if let Some(dirty) = outcome.dirty.iter().copied().reduce(|a, b| a.union(&b)) {
            self.bus.publish(GridEvent::RepaintRequested(dirty));
        }
        outcome
    }

    /// Copies the buffer to the screen.
    pub fn paint<S: Surface + ?Sized>(&self, screen: &mut S) {
        self.renderer.repaint(screen, &self.viewport);
    }

    /// Brings the buffer up to date and issues thumbnail requests.
    fn refresh(&mut self) -> RedrawReport {
        let ctx = RenderContext {
            list: &self.list,
            selection: &self.selection,
        };
        let report = self.renderer.redraw(&self.viewport, ctx);

        // Full repaints supersede running fades for those cells
        if !report.is_empty() && !self.animator.is_idle() {
            let ids: Vec<MediaId> = report
                .drawn
                .iter()
                .filter_map(|index| self.list.get(*index).map(Media::id))
                .collect();
            self.animator.cancel(&ids);
        }

        self.request_thumbnails();
        self.bus
            .publish(GridEvent::RepaintRequested(self.viewport.screen_rect()));
        self.publish_status();
        report
    }

    fn redraw_indices(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        let ctx = RenderContext {
            list: &self.list,
            selection: &self.selection,
        };
        let rects = self.renderer.redraw_cells(indices, &self.viewport, ctx);
        if let Some(dirty) = rects.into_iter().reduce(|a, b| a.union(&b)) {
            self.bus.publish(GridEvent::RepaintRequested(dirty));
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// "N files", plus the selected count and size when something is selected.
    pub fn status_text(&self) -> String {
        let total = self.list.num_files();
        let mut text = format!("{} {}", total, plural(total, "file", "files"));

        let (files, bytes) = self
            .list
            .iter()
            .filter(|m| self.selection.is_selected(m.id()))
            .fold((0usize, 0u64), |(files, bytes), m| {
                (files + m.num_files(), bytes + m.size())
            });
        if files > 0 {
            text.push_str(&format!(", {} selected ({})", files, human_size(bytes)));
        }
        text
    }

    fn publish_status(&mut self) {
        let text = self.status_text();
        if self.last_status.as_deref() == Some(text.as_str()) {
            return;
        }
        info!(status = %text, "Grid status");
        self.last_status = Some(text.clone());
        self.bus.publish(GridEvent::StatusTextChanged(text));
    }
}

impl std::fmt::Debug for ThumbnailGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailGrid")
            .field("list", &self.list)
            .field("viewport", &self.viewport)
            .field("renderer", &self.renderer)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}

/// Byte count with a binary unit, one decimal above bytes.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{}B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentUpdateKind, ServiceUpdateKind, SortBy};
    use crate::render::{PixelBuffer, Rect};
    use crate::thumbnails::{ThumbnailQueueBuilder, ThumbnailSource};
    use image::{Rgba, RgbaImage};
    use std::cell::RefCell;
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(5);

    /// Solid white bitmaps; id 13 fails to decode.
    struct TestSource;

    impl ThumbnailSource for TestSource {
        fn load(&self, request: &ThumbnailRequest) -> Result<RgbaImage, ThumbnailError> {
            if request.id == MediaId(13) {
                return Err(ThumbnailError::Decode("corrupt".into()));
            }
            Ok(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])))
        }
    }

    #[derive(Default)]
    struct CountingScheduler {
        armed: RefCell<usize>,
    }

    impl FrameScheduler for CountingScheduler {
        fn schedule_frame(&self, _after: Duration) {
            *self.armed.borrow_mut() += 1;
        }
    }

    #[derive(Default)]
    struct RecordingExternal {
        archived: RefCell<Vec<MediaId>>,
        opened: RefCell<Option<MediaId>>,
    }

    impl ExternalActions for RecordingExternal {
        fn archive(&self, files: &[MediaId]) {
            self.archived.borrow_mut().extend_from_slice(files);
        }

        fn open(&self, media: MediaId) {
            *self.opened.borrow_mut() = Some(media);
        }
    }

    /// 3 columns of 10px cells on a 30x30 canvas.
    fn grid(count: u64) -> (ThumbnailGrid, Rc<RefCell<Vec<GridEvent>>>) {
        let config = GridConfig::default()
            .with_thumbnail_size(8, 8)
            .with_cell_margin(2)
            .with_fade_margin(20)
            .with_prefetch_rows(1);
        let queue = ThumbnailQueueBuilder::new()
            .workers(1)
            .build(Arc::new(TestSource))
            .unwrap();
        let mut grid = ThumbnailGrid::new(config, queue).unwrap();

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        grid.bus()
            .subscribe(move |event| sink.borrow_mut().push(event.clone()));

        grid.sort(SortKey::ascending(SortBy::FileSize));
        grid.resize(30, 30);
        grid.add_media(
            (0..count).map(|i| MediaResult::new(MediaId(i), i * 100)).collect(),
            false,
        );
        (grid, events)
    }

    fn selection_events(events: &Rc<RefCell<Vec<GridEvent>>>) -> usize {
        events
            .borrow()
            .iter()
            .filter(|e| matches!(e, GridEvent::SelectionChanged { .. }))
            .count()
    }

    fn loaded(grid: &ThumbnailGrid, id: u64) -> bool {
        grid.list()
            .media(MediaId(id))
            .is_some_and(|m| m.thumbnail().is_loaded())
    }

    fn white() -> Bitmap {
        Bitmap::new(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn test_add_publishes_status_and_requests_visible_first() {
        let (grid, events) = grid(100);
        assert_eq!(grid.viewport().item_count(), 100);
        assert_eq!(grid.status_text(), "100 files");
        assert!(events
            .borrow()
            .contains(&GridEvent::StatusTextChanged("100 files".into())));

        // Visible rows 0..=3 plus one prefetch row below
        assert_eq!(grid.queue().pending_count(), 15);
        assert!(grid.queue().is_pending(MediaId(0)));
        assert!(!grid.queue().is_pending(MediaId(15)));
    }

    #[test]
    fn test_loads_land_in_model() {
        let (mut grid, _) = grid(6);
        let mut handled = 0;
        while handled < 6 {
            let n = grid.wait_for_thumbnails(WAIT);
            assert!(n > 0, "timed out waiting for thumbnails");
            handled += n;
        }
        assert!(loaded(&grid, 0));
        assert!(loaded(&grid, 5));
        assert!(grid.queue().cache().contains(MediaId(5)));
    }

    #[test]
    fn test_decode_failure_is_not_retried() {
        let (mut grid, _) = grid(20);
        let result =
            ThumbnailResult::new(MediaId(13), Err(ThumbnailError::Decode("corrupt".into())));
        assert_eq!(grid.handle_thumbnail_result(result), LoadDisposition::Errored);
        let media = grid.list().media(MediaId(13)).unwrap();
        assert!(media.thumbnail().is_errored());
        assert!(!media.thumbnail().needs_load());
    }

    #[test]
    fn test_visible_load_fades_in() {
        let (grid, _) = grid(100);
        let scheduler = Rc::new(CountingScheduler::default());
        let mut grid = grid.with_scheduler(scheduler.clone());

        let result = ThumbnailResult::new(MediaId(4), Ok(white()));
        assert_eq!(grid.handle_thumbnail_result(result), LoadDisposition::Faded);
        assert!(grid.animator().is_fading(MediaId(4)));
        assert_eq!(*scheduler.armed.borrow(), 1);

        let mut screen = PixelBuffer::new(30, 30, Rgba([0, 0, 0, 255]));
        let outcome = grid.tick_animation(&mut screen);
        assert_eq!(outcome.dirty, vec![Rect::new(10, 10, 10, 10)]);
    }

    #[test]
    fn test_far_load_is_stored_without_redraw() {
        let (mut grid, events) = grid(300);
        events.borrow_mut().clear();

        // Row 50 is hundreds of pixels below the 20px fade margin
        let result = ThumbnailResult::new(MediaId(150), Ok(white()));
        assert_eq!(grid.handle_thumbnail_result(result), LoadDisposition::Deferred);
        assert!(grid.animator().is_idle());
        assert!(loaded(&grid, 150));
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_result_for_removed_media_is_dropped() {
        let (mut grid, _) = grid(10);
        grid.remove_media(&[MediaId(3)]);
        let result = ThumbnailResult::new(MediaId(3), Ok(white()));
        assert_eq!(grid.handle_thumbnail_result(result), LoadDisposition::Dropped);
    }

    #[test]
    fn test_click_selects_and_updates_status() {
        let (mut grid, events) = grid(10);
        // Cell 4 is at (10, 10); its box covers 8x8
        grid.pointer_click(12, 12, PointerButton::Primary, Modifiers::empty());
        assert_eq!(grid.selected_ids(), vec![MediaId(4)]);
        assert_eq!(grid.focused(), Some(MediaId(4)));
        assert_eq!(grid.status_text(), "10 files, 1 selected (400B)");
        assert!(events
            .borrow()
            .contains(&GridEvent::StatusTextChanged("10 files, 1 selected (400B)".into())));

        // The margin counts as empty space
        grid.pointer_click(19, 12, PointerButton::Primary, Modifiers::empty());
        assert!(grid.selected_ids().is_empty());
    }

    #[test]
    fn test_middle_click_clears_through_bindings() {
        let (mut grid, _) = grid(10);
        grid.run_command("select_all");
        assert_eq!(grid.selected_ids().len(), 10);
        grid.pointer_click(0, 0, PointerButton::Middle, Modifiers::SHIFT);
        assert!(grid.selected_ids().is_empty());
    }

    #[test]
    fn test_removing_focused_selection_notifies_once() {
        let (mut grid, events) = grid(10);
        grid.pointer_click(2, 2, PointerButton::Primary, Modifiers::empty());
        grid.pointer_click(22, 2, PointerButton::Primary, Modifiers::SHIFT);
        assert_eq!(grid.selected_ids(), vec![MediaId(0), MediaId(1), MediaId(2)]);

        let before = selection_events(&events);
        assert!(grid.key_press(Key::Delete, Modifiers::CTRL));
        assert_eq!(selection_events(&events), before + 1);
        assert!(grid.selected_ids().is_empty());
        assert_eq!(grid.focused(), None);
        assert_eq!(grid.list().len(), 7);
        assert_eq!(grid.status_text(), "7 files");
    }

    #[test]
    fn test_keyboard_focus_scrolls_into_view() {
        let (mut grid, _) = grid(100);
        assert!(grid.key_press(Key::End, Modifiers::empty()));
        assert_eq!(grid.focused(), Some(MediaId(99)));
        // 34 rows of 10px, 30px visible
        assert_eq!(grid.viewport().scroll_y(), 310);

        assert!(grid.key_press(Key::Home, Modifiers::empty()));
        assert_eq!(grid.viewport().scroll_y(), 0);
        assert!(!grid.key_press(Key::F(12), Modifiers::empty()));
    }

    #[test]
    fn test_collect_clears_selection() {
        let results = (0..4).map(|i| {
            MediaResult::new(MediaId(i), 10).with_tag("series", if i < 2 { "a" } else { "b" })
        });
        let (mut grid, _) = grid(0);
        grid.add_media(results.collect(), false);
        grid.run_command("select_all");
        assert_eq!(grid.selected_ids().len(), 4);

        grid.collect(CollectKey::by(&["series"]));
        assert_eq!(grid.list().len(), 2);
        assert!(grid.selected_ids().is_empty());
        assert_eq!(grid.status_text(), "4 files");
    }

    #[test]
    fn test_regrouping_with_loads_in_flight_reloads_everything() {
        let results = (0..4).map(|i| {
            MediaResult::new(MediaId(i), 10).with_tag("series", if i < 2 { "a" } else { "b" })
        });
        let (mut grid, _) = grid(0);
        grid.add_media(results.collect(), false);
        assert_eq!(grid.queue().pending_count(), 4);

        grid.collect(CollectKey::by(&["series"]));
        while grid.wait_for_thumbnails(Duration::from_millis(200)) > 0 {}

        grid.collect(CollectKey::None);
        assert_eq!(grid.list().len(), 4);
        while !(0..4).all(|id| loaded(&grid, id)) {
            assert!(
                grid.wait_for_thumbnails(WAIT) > 0,
                "thumbnails left waiting without a request"
            );
        }
        assert_eq!(grid.queue().pending_count(), 0);
    }

    #[test]
    fn test_refresh_while_loading_settles_once() {
        let (mut grid, _) = grid(6);
        grid.refresh_thumbnails(&[MediaId(0), MediaId(1)]);
        assert!(grid.queue().is_pending(MediaId(0)));

        while !(0..6).all(|id| loaded(&grid, id)) {
            assert!(grid.wait_for_thumbnails(WAIT) > 0, "timed out waiting for thumbnails");
        }
        // Superseded results must not leave stray requests behind
        while grid.wait_for_thumbnails(Duration::from_millis(200)) > 0 {}
        assert_eq!(grid.queue().pending_count(), 0);
        assert!(grid.queue().cache().contains(MediaId(0)));
    }

    #[test]
    fn test_malformed_update_is_ignored() {
        let (mut grid, _) = grid(5);
        grid.apply_content_update(ContentUpdate::new(ContentUpdateKind::Add, vec![MediaId(9)]));
        assert_eq!(grid.list().len(), 5);

        grid.apply_content_update(ContentUpdate::new(
            ContentUpdateKind::Delete,
            vec![MediaId(1)],
        ));
        assert_eq!(grid.list().len(), 4);
    }

    #[test]
    fn test_service_reset_empties_view() {
        let (mut grid, _) = grid(5);
        grid.run_command("select_all");
        grid.apply_service_update(ServiceUpdate {
            kind: ServiceUpdateKind::Reset,
        });
        assert!(grid.list().is_empty());
        assert!(grid.selected_ids().is_empty());
        assert_eq!(grid.status_text(), "0 files");
    }

    #[test]
    fn test_external_actions_get_selected_files() {
        let (grid, _) = grid(10);
        let external = Rc::new(RecordingExternal::default());
        let mut grid = grid.with_external_actions(external.clone());

        grid.pointer_click(2, 2, PointerButton::Primary, Modifiers::empty());
        grid.pointer_click(12, 2, PointerButton::Primary, Modifiers::CTRL);
        assert!(grid.run_command("archive"));
        assert_eq!(*external.archived.borrow(), vec![MediaId(0), MediaId(1)]);

        assert!(grid.key_press(Key::Enter, Modifiers::empty()));
        assert_eq!(*external.opened.borrow(), Some(MediaId(1)));

        assert!(!grid.run_command("no_such_command"));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0B");
        assert_eq!(human_size(1023), "1023B");
        assert_eq!(human_size(1536), "1.5KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0MB");
    }
}
