//! In-memory destination backed by plain pixel buffers.
//!
//! Writes land in a shadow buffer and only reach the committed pixels on
//! [`Surface::flush`], the way a host's tile manager buffers drawable
//! writes. Finished images convert to `image::DynamicImage` for encoding or
//! inspection.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use image::{DynamicImage, RgbImage, RgbaImage};
use tracing::debug;

use super::{Destination, Rect, Surface, SurfaceSpec};
use crate::error::{SurfaceError, TransferError};

/// Opacity given to every created layer.
pub const FULL_OPACITY: f64 = 100.0;

/// Counts of the write calls a surface received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Calls to `set_rect`.
    pub rect_writes: usize,
    /// Calls to `set_row`.
    pub row_writes: usize,
    /// Calls to `flush`.
    pub flushes: usize,
}

/// Host stand-in that creates [`RasterSurface`]s.
#[derive(Debug, Default)]
pub struct RasterDestination {
    next_id: u32,
    created: usize,
    attach_failure: Option<String>,
    discarded: Rc<Cell<usize>>,
}

impl RasterDestination {
    /// A destination that accepts every surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// A destination whose layer insertion always fails with `message`.
    pub fn failing_attach(message: impl Into<String>) -> Self {
        Self {
            attach_failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Number of images created, including discarded ones.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Number of images thrown away before being handed over.
    pub fn discarded(&self) -> usize {
        self.discarded.get()
    }
}

impl Destination for RasterDestination {
    type Surface = RasterSurface;

    fn create_surface(&mut self, spec: &SurfaceSpec) -> Result<RasterSurface, SurfaceError> {
        if spec.width == 0 || spec.height == 0 {
            return Err(SurfaceError::InvalidDimensions {
                width: spec.width,
                height: spec.height,
            });
        }

        self.next_id += 1;
        self.created += 1;

        if let Some(message) = &self.attach_failure {
            self.discarded.set(self.discarded.get() + 1);
            return Err(SurfaceError::AttachFailed(message.clone()));
        }

        let len = spec.width as usize * spec.height as usize * spec.layout().bytes_per_pixel();
        debug!(
            image_id = self.next_id,
            width = spec.width,
            height = spec.height,
            has_alpha = spec.has_alpha,
            "Created raster surface"
        );
        Ok(RasterSurface {
            id: self.next_id,
            spec: spec.clone(),
            shadow: vec![0; len],
            committed: vec![0; len],
            parasites: BTreeMap::new(),
            dirty: Vec::new(),
            stats: WriteStats::default(),
            finished: false,
            discarded: Rc::clone(&self.discarded),
        })
    }
}

/// A surface under construction.
#[derive(Debug)]
pub struct RasterSurface {
    id: u32,
    spec: SurfaceSpec,
    shadow: Vec<u8>,
    committed: Vec<u8>,
    parasites: BTreeMap<String, Vec<u8>>,
    dirty: Vec<Rect>,
    stats: WriteStats,
    finished: bool,
    discarded: Rc<Cell<usize>>,
}

impl RasterSurface {
    /// ID of the image being built.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Write counts so far.
    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    /// Pixels written so far, flushed or not.
    pub fn shadow_pixels(&self) -> &[u8] {
        &self.shadow
    }

    /// Pixels committed by the last flush.
    pub fn committed_pixels(&self) -> &[u8] {
        &self.committed
    }

    /// The payload attached under `tag`.
    pub fn parasite(&self, tag: &str) -> Option<&[u8]> {
        self.parasites.get(tag).map(Vec::as_slice)
    }

    fn bytes_per_pixel(&self) -> usize {
        self.spec.layout().bytes_per_pixel()
    }

    fn row_bytes(&self) -> usize {
        self.spec.width as usize * self.bytes_per_pixel()
    }
}

impl Surface for RasterSurface {
    type Image = RasterImage;

    fn width(&self) -> u32 {
        self.spec.width
    }

    fn height(&self) -> u32 {
        self.spec.height
    }

    fn has_alpha(&self) -> bool {
        self.spec.has_alpha
    }

    fn set_rect(&mut self, data: &[u8], rect: Rect) -> Result<(), TransferError> {
        if !rect.fits_within(self.spec.width, self.spec.height) {
            return Err(TransferError::Rejected(format!(
                "rectangle {}x{}+{}+{} lies outside the {}x{} surface",
                rect.width, rect.height, rect.x, rect.y, self.spec.width, self.spec.height
            )));
        }

        let bpp = self.bytes_per_pixel();
        let rect_row = rect.width as usize * bpp;
        let expected = rect_row * rect.height as usize;
        if data.len() != expected {
            return Err(TransferError::Rejected(format!(
                "expected {} bytes for the rectangle, got {}",
                expected,
                data.len()
            )));
        }

        self.stats.rect_writes += 1;
        if rect_row == 0 {
            return Ok(());
        }

        let surface_row = self.row_bytes();
        for (i, row) in data.chunks_exact(rect_row).enumerate() {
            let start = (rect.y as usize + i) * surface_row + rect.x as usize * bpp;
            self.shadow[start..start + rect_row].copy_from_slice(row);
        }
        Ok(())
    }

    fn set_row(&mut self, row: &[u8], y: u32) -> Result<(), TransferError> {
        if y >= self.spec.height {
            return Err(TransferError::Rejected(format!(
                "row {} lies outside the {} row surface",
                y, self.spec.height
            )));
        }

        let row_bytes = self.row_bytes();
        if row.len() != row_bytes {
            return Err(TransferError::Rejected(format!(
                "expected {} bytes for a row, got {}",
                row_bytes,
                row.len()
            )));
        }

        let start = y as usize * row_bytes;
        self.shadow[start..start + row_bytes].copy_from_slice(row);
        self.stats.row_writes += 1;
        Ok(())
    }

    fn attach_parasite(&mut self, tag: &str, payload: &[u8]) {
        self.parasites.insert(tag.to_string(), payload.to_vec());
    }

    fn flush(&mut self) {
        self.committed.copy_from_slice(&self.shadow);
        self.stats.flushes += 1;
    }

    fn update(&mut self, rect: Rect) {
        self.dirty.push(rect);
    }

    fn into_image(mut self) -> RasterImage {
        self.finished = true;
        RasterImage {
            id: self.id,
            width: self.spec.width,
            height: self.spec.height,
            has_alpha: self.spec.has_alpha,
            filename: self.spec.filename.take(),
            layer_name: std::mem::take(&mut self.spec.layer_name),
            opacity: FULL_OPACITY,
            pixels: std::mem::take(&mut self.committed),
            parasites: std::mem::take(&mut self.parasites),
            dirty: std::mem::take(&mut self.dirty),
            stats: self.stats,
        }
    }
}

impl Drop for RasterSurface {
    fn drop(&mut self) {
        if !self.finished {
            debug!(image_id = self.id, "Discarding unfinished raster surface");
            self.discarded.set(self.discarded.get() + 1);
        }
    }
}

/// A finished image with a single layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    /// Image ID, unique per destination.
    pub id: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether the layer is RGBA.
    pub has_alpha: bool,
    /// File the image is tied to.
    pub filename: Option<PathBuf>,
    /// Name of the single layer.
    pub layer_name: String,
    /// Layer opacity in percent.
    pub opacity: f64,
    /// Attached payloads by tag.
    pub parasites: BTreeMap<String, Vec<u8>>,
    /// Regions marked as changed, in order.
    pub dirty: Vec<Rect>,
    /// Write counts of the surface that produced the image.
    pub stats: WriteStats,
    pixels: Vec<u8>,
}

impl RasterImage {
    /// Committed layer pixels, tightly packed RGB or RGBA.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The payload attached under `tag`.
    pub fn parasite(&self, tag: &str) -> Option<&[u8]> {
        self.parasites.get(tag).map(Vec::as_slice)
    }

    /// Convert the layer into an `image::DynamicImage`.
    pub fn to_dynamic_image(&self) -> Option<DynamicImage> {
        if self.has_alpha {
            RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
                .map(DynamicImage::ImageRgba8)
        } else {
            RgbImage::from_raw(self.width, self.height, self.pixels.clone())
                .map(DynamicImage::ImageRgb8)
        }
    }
}
