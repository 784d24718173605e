//! Cooperative cross-fade of freshly loaded thumbnails.
//!
//! A fade is registered when a bitmap lands in a cell that was showing the
//! loading placeholder. Each tick advances every pending fade by one frame,
//! composing into the off-screen buffer and copying the cell to the screen.
//! The animator only asks for another frame while fades remain.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::canvas::{CanvasRenderer, RenderContext};
use super::surface::{Rect, Surface};
use crate::config::GridConfig;
use crate::layout::ViewportState;
use crate::models::MediaId;
use crate::thumbnails::Bitmap;

/// Host timer hook. `schedule_frame` asks for one `tick` after `after`.
pub trait FrameScheduler {
    fn schedule_frame(&self, after: Duration);
}

/// Scheduler for hosts that drive ticks themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualScheduler;

impl FrameScheduler for ManualScheduler {
    fn schedule_frame(&self, _after: Duration) {}
}

#[derive(Debug)]
struct PendingFade {
    id: MediaId,
    bitmap: Bitmap,
    frame: u8,
}

/// What one tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Screen rectangles repainted this tick.
    pub dirty: Vec<Rect>,
    /// Fades that reached their final frame or were dropped.
    pub finished: Vec<MediaId>,
    /// Delay before the next tick, if one was scheduled.
    pub rearm: Option<Duration>,
}

#[derive(Debug)]
pub struct FadeAnimator {
    pending: VecDeque<PendingFade>,
    frames: u8,
    interval: Duration,
    budget: Duration,
    margin_px: u32,
    armed: bool,
}

impl FadeAnimator {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            pending: VecDeque::new(),
            frames: config.fade_frames.max(1),
            interval: config.frame_interval,
            budget: config.tick_budget,
            margin_px: config.fade_margin_px,
            armed: false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_fading(&self, id: MediaId) -> bool {
        self.pending.iter().any(|f| f.id == id)
    }

    /// Queues a fade for `id`, arming the scheduler if it was idle.
    /// A second registration for the same id restarts it with the new bitmap.
    pub fn register(&mut self, id: MediaId, bitmap: Bitmap, scheduler: &dyn FrameScheduler) {
        match self.pending.iter_mut().find(|f| f.id == id) {
            Some(fade) => {
                fade.bitmap = bitmap;
                fade.frame = 0;
            }
            None => self.pending.push_back(PendingFade {
                id,
                bitmap,
                frame: 0,
            }),
        }
        trace!(%id, pending = self.pending.len(), "Registered fade");

        if !self.armed {
            self.armed = true;
            scheduler.schedule_frame(self.interval);
        }
    }

    /// Drops fades for `ids` without drawing, e.g. when their cells were
    /// just repainted in full.
    pub fn cancel(&mut self, ids: &[MediaId]) {
        if ids.is_empty() || self.pending.is_empty() {
            return;
        }
        self.pending.retain(|f| !ids.contains(&f.id));
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Advances pending fades by one frame each, stopping early once the tick
    /// budget is spent. At least one fade advances per tick.
    pub fn tick<S: Surface + ?Sized>(
        &mut self,
        renderer: &mut CanvasRenderer,
        viewport: &ViewportState,
        ctx: RenderContext<'_>,
        screen: &mut S,
        scheduler: &dyn FrameScheduler,
    ) -> TickOutcome {
        self.armed = false;
        let mut outcome = TickOutcome::default();
        let deadline = Instant::now() + self.budget;
        let frames = self.frames;

        let mut remaining = self.pending.len();
        let mut advanced = 0usize;
        while remaining > 0 {
            if advanced > 0 && Instant::now() >= deadline {
                trace!(left = remaining, "Fade tick out of budget");
                break;
            }
            remaining -= 1;
            advanced += 1;
            let Some(mut fade) = self.pending.pop_front() else {
                break;
            };

            // Media removed since the fade started
            let Some(index) = ctx.list.index_of(fade.id) else {
                outcome.finished.push(fade.id);
                continue;
            };

            if !self.near_viewport(viewport, index) {
                renderer.compose_fade(index, fade.id, &fade.bitmap, 1.0, ctx);
                debug!(id = %fade.id, index, "Fade scrolled away, finished early");
                outcome.finished.push(fade.id);
                continue;
            }

            fade.frame = (fade.frame + 1).min(frames);
            let opacity = fade.frame as f32 / frames as f32;
            if renderer.compose_fade(index, fade.id, &fade.bitmap, opacity, ctx) {
                outcome
                    .dirty
                    .extend(renderer.present_cell(screen, viewport, index));
            }

            if fade.frame >= frames {
                outcome.finished.push(fade.id);
            } else {
                self.pending.push_back(fade);
            }
        }

        if !self.pending.is_empty() {
            self.armed = true;
            scheduler.schedule_frame(self.interval);
            outcome.rearm = Some(self.interval);
        }
        outcome
    }

    /// True if the cell at `index` lies within the viewport grown by the
    /// fade margin.
    fn near_viewport(&self, viewport: &ViewportState, index: usize) -> bool {
        let cell = viewport.cell_rect(index);
        let top = cell.y as i64;
        let bottom = top + cell.height as i64;
        let scroll = viewport.scroll_y() as i64;
        let (_, height) = viewport.canvas_size();
        let margin = self.margin_px as i64;
        bottom > scroll - margin && top < scroll + height as i64 + margin
    }

    /// Whether a load landing at `index` now would get a fade.
    pub fn would_fade(&self, viewport: &ViewportState, index: usize) -> bool {
        self.near_viewport(viewport, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectKey, MediaList, MediaResult, SortBy, SortKey};
    use crate::render::PixelBuffer;
    use crate::ui::events::recording_bus;
    use crate::ui::selection::SelectionController;
    use image::{Rgba, RgbaImage};
    use std::cell::RefCell;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[derive(Default)]
    struct CountingScheduler {
        requests: RefCell<Vec<Duration>>,
    }

    impl FrameScheduler for CountingScheduler {
        fn schedule_frame(&self, after: Duration) {
            self.requests.borrow_mut().push(after);
        }
    }

    struct Fixture {
        list: MediaList,
        selection: SelectionController,
        viewport: ViewportState,
        renderer: CanvasRenderer,
        animator: FadeAnimator,
        screen: PixelBuffer,
        scheduler: CountingScheduler,
    }

    impl Fixture {
        fn new(config: GridConfig) -> Self {
            let config = config
                .with_thumbnail_size(8, 8)
                .with_cell_margin(2)
                .with_fade_margin(20)
                .validate()
                .unwrap();
            let (bus, _) = recording_bus();
            let mut list = MediaList::new(
                bus.clone(),
                SortKey::ascending(SortBy::FileSize),
                CollectKey::None,
            );
            list.add_media(
                (0..100).map(|i| MediaResult::new(MediaId(i), i)).collect(),
                false,
            );
            let mut viewport = ViewportState::new(10, 10, 8, 8);
            viewport.set_canvas_size(30, 30);
            viewport.set_item_count(list.len());

            let mut fx = Self {
                list,
                selection: SelectionController::new(bus),
                viewport,
                renderer: CanvasRenderer::new(&config),
                animator: FadeAnimator::new(&config),
                screen: PixelBuffer::new(30, 30, config.palette.background),
                scheduler: CountingScheduler::default(),
            };
            let ctx = RenderContext {
                list: &fx.list,
                selection: &fx.selection,
            };
            fx.renderer.redraw(&fx.viewport, ctx);
            fx
        }

        fn register(&mut self, id: u64) {
            let bitmap = Bitmap::new(RgbaImage::from_pixel(4, 4, WHITE));
            self.animator
                .register(MediaId(id), bitmap, &self.scheduler);
        }

        fn tick(&mut self) -> TickOutcome {
            let ctx = RenderContext {
                list: &self.list,
                selection: &self.selection,
            };
            self.animator.tick(
                &mut self.renderer,
                &self.viewport,
                ctx,
                &mut self.screen,
                &self.scheduler,
            )
        }

        fn scheduled(&self) -> usize {
            self.scheduler.requests.borrow().len()
        }
    }

    #[test]
    fn test_fade_runs_bounded_frames() {
        let mut fx = Fixture::new(GridConfig::default().with_fade_frames(3));
        fx.register(0);
        assert_eq!(fx.scheduled(), 1);

        let first = fx.tick();
        assert_eq!(first.dirty, vec![Rect::new(0, 0, 10, 10)]);
        assert!(first.rearm.is_some());
        // Partially blended over the placeholder
        let px = fx.screen.pixel(4, 4).unwrap();
        assert!(px[0] > 51 && px[0] < 255);

        fx.tick();
        let last = fx.tick();
        assert_eq!(last.finished, vec![MediaId(0)]);
        assert_eq!(last.rearm, None);
        assert_eq!(fx.screen.pixel(4, 4), Some(WHITE));
        assert!(fx.animator.is_idle());
        assert_eq!(fx.scheduled(), 3);
    }

    #[test]
    fn test_registration_arms_once() {
        let mut fx = Fixture::new(GridConfig::default());
        fx.register(0);
        fx.register(1);
        fx.register(1);
        assert_eq!(fx.animator.pending_count(), 2);
        assert_eq!(fx.scheduled(), 1);
    }

    #[test]
    fn test_fade_far_outside_viewport_finishes_at_once() {
        let mut fx = Fixture::new(GridConfig::default());
        fx.register(1);
        fx.register(60);

        let outcome = fx.tick();
        assert!(outcome.finished.contains(&MediaId(60)));
        assert_eq!(fx.animator.pending_count(), 1);
        assert!(!fx.animator.would_fade(&fx.viewport, 60));
    }

    #[test]
    fn test_removed_media_fade_dropped() {
        let mut fx = Fixture::new(GridConfig::default());
        fx.register(2);
        fx.list.remove_media(&[MediaId(2)]);

        let outcome = fx.tick();
        assert_eq!(outcome.finished, vec![MediaId(2)]);
        assert!(outcome.dirty.is_empty());
    }

    #[test]
    fn test_exhausted_budget_advances_one_fade_per_tick() {
        let config = GridConfig::default()
            .with_fade_frames(2)
            .with_tick_budget(Duration::ZERO);
        let mut fx = Fixture::new(config);
        for id in 0..3 {
            fx.register(id);
        }

        let outcome = fx.tick();
        assert_eq!(outcome.dirty.len(), 1);
        assert_eq!(fx.animator.pending_count(), 3);

        // Six frames in total, one per tick
        for _ in 0..5 {
            fx.tick();
        }
        assert!(fx.animator.is_idle());
    }

    #[test]
    fn test_cancel_drops_without_drawing() {
        let mut fx = Fixture::new(GridConfig::default());
        fx.register(0);
        fx.animator.cancel(&[MediaId(0)]);
        assert!(fx.animator.is_idle());
        assert_eq!(fx.tick(), TickOutcome::default());
    }
}
