//! Thumbnail generation using the image crate.
//!
//! Fits source images inside the thumbnail box while preserving aspect ratio,
//! and reads/writes the JPEG files of the optional disk cache.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use tracing::debug;

/// JPEG quality for disk cache entries (0-100).
const JPEG_QUALITY: u8 = 85;

/// Thumbnail generator that creates bitmaps sized for the grid.
pub struct ThumbnailGenerator;

impl ThumbnailGenerator {
    /// Decode `src` and fit it into a `box_width` x `box_height` box.
    pub fn generate(src: &Path, box_width: u32, box_height: u32) -> Result<RgbaImage> {
        let img = Self::load_image(src)?;
        let (src_width, src_height) = img.dimensions();

        let (thumb_width, thumb_height) =
            Self::calculate_dimensions(src_width, src_height, box_width, box_height);

        debug!(
            ?src,
            src_width, src_height, thumb_width, thumb_height, "Generating thumbnail"
        );

        // CatmullRom provides good quality/speed balance for downscaling
        let thumbnail = if (thumb_width, thumb_height) == (src_width, src_height) {
            img
        } else {
            img.resize_exact(thumb_width, thumb_height, FilterType::CatmullRom)
        };
        Ok(thumbnail.to_rgba8())
    }

    /// Load an image from disk, handling various formats.
    fn load_image(path: &Path) -> Result<DynamicImage> {
        image::open(path).with_context(|| format!("Failed to load image: {:?}", path))
    }

    /// Determine image format from file extension.
    pub fn format_from_extension(path: &Path) -> Option<ImageFormat> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::WebP),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            "tiff" | "tif" => Some(ImageFormat::Tiff),
            _ => None,
        }
    }

    /// Check if a source file can be processed as an image.
    pub fn can_generate(path: &Path) -> bool {
        Self::format_from_extension(path).is_some()
    }

    /// Largest size with the source aspect ratio that fits the box.
    ///
    /// Never upscales; never returns a zero dimension.
    pub fn calculate_dimensions(
        src_width: u32,
        src_height: u32,
        box_width: u32,
        box_height: u32,
    ) -> (u32, u32) {
        if src_width == 0 || src_height == 0 {
            return (box_width.max(1), box_height.max(1));
        }
        if src_width <= box_width && src_height <= box_height {
            return (src_width, src_height);
        }

        let scale = f64::min(
            box_width as f64 / src_width as f64,
            box_height as f64 / src_height as f64,
        );
        let width = (src_width as f64 * scale).round() as u32;
        let height = (src_height as f64 * scale).round() as u32;
        (width.clamp(1, box_width.max(1)), height.clamp(1, box_height.max(1)))
    }

    /// Save a thumbnail as JPEG for the disk cache.
    pub fn save_thumbnail(img: &RgbaImage, dst: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create thumbnail directory: {:?}", parent))?;
        }

        let file = File::create(dst)
            .with_context(|| format!("Failed to create thumbnail file: {:?}", dst))?;
        let mut writer = BufWriter::new(file);

        // JPEG has no alpha channel
        let rgb_img = DynamicImage::ImageRgba8(img.clone()).to_rgb8();

        let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
        rgb_img
            .write_with_encoder(encoder)
            .with_context(|| format!("Failed to encode thumbnail: {:?}", dst))?;

        debug!(?dst, "Saved thumbnail");
        Ok(())
    }

    /// Read a disk cache entry back.
    pub fn load_thumbnail(path: &Path) -> Result<RgbaImage> {
        Ok(Self::load_image(path)?.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    #[test]
    fn test_calculate_dimensions_landscape() {
        // 1920x1080 into 150x125 is width-bound
        let (w, h) = ThumbnailGenerator::calculate_dimensions(1920, 1080, 150, 125);
        assert_eq!(w, 150);
        assert!((h as i32 - 84).abs() <= 1);
    }

    #[test]
    fn test_calculate_dimensions_portrait() {
        let (w, h) = ThumbnailGenerator::calculate_dimensions(1000, 2000, 150, 125);
        assert_eq!(h, 125);
        assert!((w as i32 - 63).abs() <= 1);
    }

    #[test]
    fn test_calculate_dimensions_small_source() {
        // Source smaller than the box - don't upscale
        let (w, h) = ThumbnailGenerator::calculate_dimensions(40, 30, 150, 125);
        assert_eq!((w, h), (40, 30));
    }

    #[test]
    fn test_calculate_dimensions_extreme_panorama() {
        let (w, h) = ThumbnailGenerator::calculate_dimensions(100_000, 10, 150, 125);
        assert_eq!(w, 150);
        assert_eq!(h, 1);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ThumbnailGenerator::format_from_extension(Path::new("test.jpg")),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ThumbnailGenerator::format_from_extension(Path::new("test.PNG")),
            Some(ImageFormat::Png)
        );
        assert!(!ThumbnailGenerator::can_generate(Path::new("test.txt")));
    }

    #[test]
    fn test_generate_fits_box() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("wide.png");
        RgbaImage::from_pixel(400, 100, Rgba([10, 200, 30, 255]))
            .save(&src)
            .unwrap();

        let thumb = ThumbnailGenerator::generate(&src, 150, 125).unwrap();
        assert_eq!(thumb.dimensions(), (150, 38));
    }

    #[test]
    fn test_save_and_load_roundtrip_dimensions() {
        let dir = tempdir().unwrap();
        let dst = dir.path().join("nested").join("thumb.jpg");
        let img = RgbaImage::from_pixel(20, 10, Rgba([255, 0, 0, 255]));

        ThumbnailGenerator::save_thumbnail(&img, &dst).unwrap();
        let loaded = ThumbnailGenerator::load_thumbnail(&dst).unwrap();
        assert_eq!(loaded.dimensions(), (20, 10));
    }

    #[test]
    fn test_generate_missing_file_errors() {
        let dir = tempdir().unwrap();
        assert!(ThumbnailGenerator::generate(&dir.path().join("nope.png"), 10, 10).is_err());
    }
}
