pub mod canvas;
pub mod fade;
pub mod surface;

pub use canvas::{CanvasRenderer, RedrawReport, RenderContext};
pub use fade::{FadeAnimator, FrameScheduler, ManualScheduler, TickOutcome};
pub use surface::{PixelBuffer, Rect, Surface};
