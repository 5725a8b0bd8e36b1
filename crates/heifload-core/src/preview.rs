//! Thumbnail previews shown by the interactive item chooser.
//!
//! Previews are built from the thumbnail the codec decodes for an item,
//! packed tightly and scaled down to fit a square of the configured edge.
//! They are advisory: any failure simply means the chooser gets no preview.

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage, RgbaImage};

use crate::codec::{PixelLayout, PixelSource};
use crate::transfer::pack_tight;

/// A small, tightly packed RGB or RGBA picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether pixels are RGBA.
    pub has_alpha: bool,
    /// Tightly packed pixel rows.
    pub pixels: Vec<u8>,
}

impl Preview {
    /// Scale a decoded buffer so that its longest edge is at most `max_edge`.
    ///
    /// Images that already fit are kept at their size. Returns `None` when
    /// `max_edge` is zero or the buffer is unusable.
    pub fn from_pixels<P: PixelSource + ?Sized>(image: &P, max_edge: u32) -> Option<Self> {
        if max_edge == 0 || image.width() == 0 || image.height() == 0 {
            return None;
        }

        let packed = pack_tight(image).ok()?;
        let dynamic = match image.bits_per_pixel() {
            bits if bits == PixelLayout::Rgba.bits_per_pixel() => DynamicImage::ImageRgba8(
                RgbaImage::from_raw(image.width(), image.height(), packed)?,
            ),
            bits if bits == PixelLayout::Rgb.bits_per_pixel() => DynamicImage::ImageRgb8(
                RgbImage::from_raw(image.width(), image.height(), packed)?,
            ),
            _ => return None,
        };

        let (width, height) = fit_dimensions(image.width(), image.height(), max_edge);
        let scaled = if (width, height) == (image.width(), image.height()) {
            dynamic
        } else {
            // Bilinear is plenty for chooser thumbnails
            dynamic.resize_exact(width, height, FilterType::Triangle)
        };

        let has_alpha = scaled.color().has_alpha();
        let pixels = if has_alpha {
            scaled.into_rgba8().into_raw()
        } else {
            scaled.into_rgb8().into_raw()
        };
        Some(Self {
            width,
            height,
            has_alpha,
            pixels,
        })
    }
}

/// Dimensions fitting within `max_edge` while preserving aspect ratio.
/// Never upscales.
fn fit_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width <= max_edge && height <= max_edge {
        return (width, height);
    }

    let ratio = width as f64 / height as f64;

    if width >= height {
        // Landscape or square: constrain by width
        let new_height = (max_edge as f64 / ratio).round() as u32;
        (max_edge, new_height.max(1))
    } else {
        // Portrait: constrain by height
        let new_width = (max_edge as f64 * ratio).round() as u32;
        (new_width.max(1), max_edge)
    }
}
