//! Drawing surface abstraction.
//!
//! The renderer and animator only talk to [`Surface`]; each host toolkit
//! implements it for its window. [`PixelBuffer`] is the in-memory
//! implementation used for the off-screen buffer.

use image::{Rgba, RgbaImage};

/// Integer rectangle; `x`/`y` may be negative for partially off-surface areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return None;
        }
        Some(Rect::new(x, y, (right - x) as u32, (bottom - y) as u32))
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, (right - x) as u32, (bottom - y) as u32)
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Shrinks the rectangle by `amount` on every side.
    pub fn inset(&self, amount: u32) -> Rect {
        let w = self.width.saturating_sub(amount * 2);
        let h = self.height.saturating_sub(amount * 2);
        Rect::new(self.x + amount as i32, self.y + amount as i32, w, h)
    }
}

/// A drawable target.
pub trait Surface {
    fn size(&self) -> (u32, u32);

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>);

    /// Draws `bitmap` centred in `dest` (clipped to it) at `opacity`
    /// (0.0..=1.0), blending over what is already there.
    fn draw_bitmap(&mut self, bitmap: &RgbaImage, dest: Rect, opacity: f32);

    /// Copies `src` from `source` to (`dest_x`, `dest_y`).
    fn blit(&mut self, source: &PixelBuffer, src: Rect, dest_x: i32, dest_y: i32);

    fn bounds(&self) -> Rect {
        let (w, h) = self.size();
        Rect::new(0, 0, w, h)
    }

    /// Draws a `thickness` pixel frame just inside `rect`.
    fn stroke_rect(&mut self, rect: Rect, thickness: u32, color: Rgba<u8>) {
        let t = thickness.min(rect.width / 2).min(rect.height / 2);
        if t == 0 {
            return;
        }
        self.fill_rect(Rect::new(rect.x, rect.y, rect.width, t), color);
        self.fill_rect(
            Rect::new(rect.x, rect.bottom() - t as i32, rect.width, t),
            color,
        );
        self.fill_rect(Rect::new(rect.x, rect.y, t, rect.height), color);
        self.fill_rect(
            Rect::new(rect.right() - t as i32, rect.y, t, rect.height),
            color,
        );
    }
}

/// Owned RGBA pixel buffer.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, fill: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, fill),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.image.width() && y < self.image.height() {
            Some(*self.image.get_pixel(x, y))
        } else {
            None
        }
    }

    /// Moves `height` pixel rows starting at `from_y` so they start at `to_y`.
    /// Rows falling outside the buffer are dropped.
    pub fn shift_rows(&mut self, from_y: u32, to_y: u32, height: u32) {
        let buf_h = self.image.height();
        let stride = self.image.width() as usize * 4;
        let height = height
            .min(buf_h.saturating_sub(from_y))
            .min(buf_h.saturating_sub(to_y));
        if height == 0 || from_y == to_y {
            return;
        }
        let raw: &mut [u8] = &mut self.image;
        let src = from_y as usize * stride..(from_y + height) as usize * stride;
        raw.copy_within(src, to_y as usize * stride);
    }
}

impl Surface for PixelBuffer {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        let Some(clip) = rect.intersect(&self.bounds()) else {
            return;
        };
        for y in clip.y..clip.bottom() {
            for x in clip.x..clip.right() {
                self.image.put_pixel(x as u32, y as u32, color);
            }
        }
    }

    fn draw_bitmap(&mut self, bitmap: &RgbaImage, dest: Rect, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity <= 0.0 {
            return;
        }
        let (bw, bh) = bitmap.dimensions();
        // centre inside the destination box
        let origin_x = dest.x + (dest.width as i32 - bw as i32) / 2;
        let origin_y = dest.y + (dest.height as i32 - bh as i32) / 2;
        let placed = Rect::new(origin_x, origin_y, bw, bh);
        let Some(clip) = placed
            .intersect(&dest)
            .and_then(|r| r.intersect(&self.bounds()))
        else {
            return;
        };

        for y in clip.y..clip.bottom() {
            for x in clip.x..clip.right() {
                let src = bitmap.get_pixel((x - origin_x) as u32, (y - origin_y) as u32);
                let alpha = (src[3] as f32 / 255.0) * opacity;
                let dst = self.image.get_pixel_mut(x as u32, y as u32);
                for c in 0..3 {
                    let blended = src[c] as f32 * alpha + dst[c] as f32 * (1.0 - alpha);
                    dst[c] = blended.round().clamp(0.0, 255.0) as u8;
                }
                dst[3] = 255;
            }
        }
    }

    fn blit(&mut self, source: &PixelBuffer, src: Rect, dest_x: i32, dest_y: i32) {
        let dx = dest_x - src.x;
        let dy = dest_y - src.y;
        let Some(src) = src.intersect(&source.bounds()) else {
            return;
        };
        let Some(target) = src.translate(dx, dy).intersect(&self.bounds()) else {
            return;
        };
        for y in target.y..target.bottom() {
            for x in target.x..target.right() {
                let pixel = *source.image.get_pixel((x - dx) as u32, (y - dy) as u32);
                self.image.put_pixel(x as u32, y as u32, pixel);
            }
        }
    }
}
