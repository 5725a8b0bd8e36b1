//! Destination surfaces owned by the host application.
//!
//! A [`Destination`] creates a [`Surface`] sized from a decoded image. The
//! surface accepts whole-rectangle or single-row writes, carries tagged
//! metadata payloads, and becomes a host image only through
//! [`Surface::into_image`]. A surface dropped before that is discarded by the
//! host together with the image it belongs to.

pub mod raster;

use std::path::PathBuf;

use crate::codec::PixelLayout;
use crate::error::{SurfaceError, TransferError};

/// A pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// A rectangle at `(x, y)`.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle covering a whole `width x height` surface.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Whether the rectangle lies inside a `width x height` surface.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }
}

/// Everything the host needs to create a destination for a decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSpec {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Create an RGBA layer instead of RGB.
    pub has_alpha: bool,
    /// Source file the image is tied back to.
    pub filename: Option<PathBuf>,
    /// Name of the layer holding the pixels.
    pub layer_name: String,
}

impl SurfaceSpec {
    /// Pixel layout of the layer.
    pub fn layout(&self) -> PixelLayout {
        PixelLayout::for_alpha(self.has_alpha)
    }
}

/// A host-owned pixel target.
pub trait Surface {
    /// The host image produced once the surface is finished.
    type Image;

    /// Width in pixels.
    fn width(&self) -> u32;
    /// Height in pixels.
    fn height(&self) -> u32;
    /// Whether the layer has alpha.
    fn has_alpha(&self) -> bool;

    /// Write tightly packed rows covering `rect`.
    fn set_rect(&mut self, data: &[u8], rect: Rect) -> Result<(), TransferError>;

    /// Write one full-width, tightly packed row.
    fn set_row(&mut self, row: &[u8], y: u32) -> Result<(), TransferError>;

    /// Attach an opaque payload under `tag`, replacing any previous one.
    fn attach_parasite(&mut self, tag: &str, payload: &[u8]);

    /// Commit buffered writes to canonical storage.
    fn flush(&mut self);

    /// Mark `rect` as changed.
    fn update(&mut self, rect: Rect);

    /// Hand the finished surface over to the host as an image.
    fn into_image(self) -> Self::Image;
}

/// The host side that creates surfaces.
pub trait Destination {
    /// The surface type this host creates.
    type Surface: Surface;

    /// Create an image with one layer sized by `spec`.
    ///
    /// If the layer cannot be attached, the host discards the image before
    /// returning the error.
    fn create_surface(&mut self, spec: &SurfaceSpec) -> Result<Self::Surface, SurfaceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_fits_within() {
        assert!(Rect::full(5, 2).fits_within(5, 2));
        assert!(Rect::new(1, 1, 4, 1).fits_within(5, 2));
        assert!(!Rect::new(1, 0, 5, 1).fits_within(5, 2));
        assert!(!Rect::new(0, u32::MAX, 1, 2).fits_within(5, 2));
    }

    #[test]
    fn test_spec_layout() {
        let spec = SurfaceSpec {
            width: 1,
            height: 1,
            has_alpha: true,
            filename: None,
            layer_name: "image content".to_string(),
        };
        assert_eq!(spec.layout(), PixelLayout::Rgba);
    }
}
