//! Single-image codec backed by the `image` crate.
//!
//! A still image file (PNG, JPEG) is exposed as a container with exactly one
//! top-level item, which is also the primary item. EXIF data found in the
//! file is offered as one `Exif` metadata block wrapped in the same 4-byte
//! TIFF-offset envelope HEIF containers use, so downstream handling does not
//! care which codec produced it.

use std::io::Cursor;
use std::rc::Rc;

use image::{DynamicImage, GenericImageView, ImageReader};

use super::{ByteSource, HeifCodec, ImageContainer, ImageHandle, ItemId, PixelLayout, PixelSource};
use crate::error::CodecError;

/// Item ID of the single image in a still container.
pub const STILL_ITEM_ID: ItemId = ItemId(1);

const EXIF_BLOCK_ID: ItemId = ItemId(1);

/// Codec for still image formats supported by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct StillImageCodec;

impl StillImageCodec {
    /// Create the codec.
    pub fn new() -> Self {
        Self
    }
}

impl HeifCodec for StillImageCodec {
    type Container = StillContainer;

    fn open(&self, source: &ByteSource) -> Result<StillContainer, CodecError> {
        let bytes = source.to_bytes()?;

        let reader = ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| CodecError::new(format!("Cannot detect image format: {}", e)))?;
        if reader.format().is_none() {
            return Err(CodecError::new("Unsupported file type"));
        }
        let image = reader
            .decode()
            .map_err(|e| CodecError::new(e.to_string()))?;

        Ok(StillContainer {
            image: Rc::new(image),
            exif: extract_exif_block(&bytes).map(Rc::from),
        })
    }
}

/// Wrap the file's TIFF-structured EXIF data in a HEIF-style block: a
/// big-endian offset to the TIFF header (always zero here) followed by the
/// TIFF data itself.
fn extract_exif_block(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let tiff = exif.buf();
    let mut block = Vec::with_capacity(tiff.len() + 4);
    block.extend_from_slice(&0u32.to_be_bytes());
    block.extend_from_slice(tiff);
    Some(block)
}

/// A decoded still image presented as a one-item container.
#[derive(Debug)]
pub struct StillContainer {
    image: Rc<DynamicImage>,
    exif: Option<Rc<[u8]>>,
}

impl ImageContainer for StillContainer {
    type Handle = StillHandle;

    fn top_level_item_ids(&self) -> Vec<ItemId> {
        vec![STILL_ITEM_ID]
    }

    fn primary_item_id(&self) -> Result<ItemId, CodecError> {
        Ok(STILL_ITEM_ID)
    }

    fn handle(&self, item: ItemId) -> Result<StillHandle, CodecError> {
        if item != STILL_ITEM_ID {
            return Err(CodecError::new(format!(
                "Nonexisting item ID referenced: {item}"
            )));
        }
        Ok(StillHandle {
            image: Rc::clone(&self.image),
            exif: self.exif.clone(),
        })
    }
}

/// Handle of the single image in a [`StillContainer`].
#[derive(Debug)]
pub struct StillHandle {
    image: Rc<DynamicImage>,
    exif: Option<Rc<[u8]>>,
}

impl ImageHandle for StillHandle {
    type Image = StillImage;

    fn item_id(&self) -> ItemId {
        STILL_ITEM_ID
    }

    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    fn decode(&self, layout: PixelLayout) -> Result<StillImage, CodecError> {
        let (width, height) = self.image.dimensions();
        let data = match layout {
            PixelLayout::Rgb => self.image.to_rgb8().into_raw(),
            PixelLayout::Rgba => self.image.to_rgba8().into_raw(),
        };
        Ok(StillImage {
            width,
            height,
            layout,
            data,
        })
    }

    fn metadata_block_ids(&self, block_type: &str) -> Vec<ItemId> {
        if block_type == "Exif" && self.exif.is_some() {
            vec![EXIF_BLOCK_ID]
        } else {
            Vec::new()
        }
    }

    fn metadata(&self, block: ItemId) -> Result<Vec<u8>, CodecError> {
        match &self.exif {
            Some(exif) if block == EXIF_BLOCK_ID => Ok(exif.to_vec()),
            _ => Err(CodecError::new(format!(
                "Nonexisting metadata block: {block}"
            ))),
        }
    }
}

/// Tightly packed pixels decoded by the `image` crate.
#[derive(Debug)]
pub struct StillImage {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl PixelSource for StillImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn bits_per_pixel(&self) -> u32 {
        self.layout.bits_per_pixel()
    }

    fn stride(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}
