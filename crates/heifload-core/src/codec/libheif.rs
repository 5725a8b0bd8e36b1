//! HEIF codec backed by libheif through `libheif_rs`.
//!
//! Files are opened straight from disk, in-memory sources through a
//! stream reader that owns the bytes. Pixels are always decoded to
//! interleaved 8-bit RGB or RGBA. libheif pads rows, so the decoded image
//! reports the plane's own stride.

use std::io::Cursor;
use std::sync::LazyLock;

use libheif_rs::{ColorSpace, FourCC, HeifContext, LibHeif, RgbChroma, StreamReader};

use super::{ByteSource, HeifCodec, ImageContainer, ImageHandle, ItemId, PixelLayout, PixelSource};
use crate::error::CodecError;

static LIB_HEIF: LazyLock<LibHeif> = LazyLock::new(LibHeif::new);

fn codec_error(e: libheif_rs::HeifError) -> CodecError {
    CodecError::new(e.to_string())
}

/// Codec for HEIF/HEIC files.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibHeifCodec;

impl LibHeifCodec {
    /// Create the codec, initializing libheif on first use.
    pub fn new() -> Self {
        LazyLock::force(&LIB_HEIF);
        Self
    }
}

impl HeifCodec for LibHeifCodec {
    type Container = LibHeifContainer;

    fn open(&self, source: &ByteSource) -> Result<LibHeifContainer, CodecError> {
        let context = match source {
            ByteSource::File(path) => {
                let name = path.to_str().ok_or_else(|| {
                    CodecError::new(format!("Path is not valid UTF-8: {}", path.display()))
                })?;
                HeifContext::read_from_file(name).map_err(codec_error)?
            }
            ByteSource::Memory(bytes) => {
                let len = bytes.len() as u64;
                let reader = StreamReader::new(Cursor::new(bytes.clone()), len);
                HeifContext::read_from_reader(Box::new(reader)).map_err(codec_error)?
            }
        };
        Ok(LibHeifContainer { context })
    }
}

/// An open HEIF file.
pub struct LibHeifContainer {
    context: HeifContext<'static>,
}

impl ImageContainer for LibHeifContainer {
    type Handle = LibHeifHandle;

    fn top_level_item_ids(&self) -> Vec<ItemId> {
        let mut ids = vec![0; self.context.number_of_top_level_images()];
        let count = self.context.top_level_image_ids(&mut ids);
        ids.truncate(count);
        ids.into_iter().map(ItemId).collect()
    }

    fn primary_item_id(&self) -> Result<ItemId, CodecError> {
        let handle = self.context.primary_image_handle().map_err(codec_error)?;
        Ok(ItemId(handle.item_id()))
    }

    fn handle(&self, item: ItemId) -> Result<LibHeifHandle, CodecError> {
        let handle = self.context.image_handle(item.0).map_err(codec_error)?;
        Ok(LibHeifHandle { item, handle })
    }
}

/// A libheif image handle.
pub struct LibHeifHandle {
    item: ItemId,
    handle: libheif_rs::ImageHandle,
}

impl ImageHandle for LibHeifHandle {
    type Image = LibHeifImage;

    fn item_id(&self) -> ItemId {
        self.item
    }

    fn width(&self) -> u32 {
        self.handle.width()
    }

    fn height(&self) -> u32 {
        self.handle.height()
    }

    fn has_alpha(&self) -> bool {
        self.handle.has_alpha_channel()
    }

    fn decode(&self, layout: PixelLayout) -> Result<LibHeifImage, CodecError> {
        decode_handle(&self.handle, layout)
    }

    fn metadata_block_ids(&self, block_type: &str) -> Vec<ItemId> {
        let Some(filter) = four_cc(block_type) else {
            return Vec::new();
        };
        let count = self.handle.number_of_metadata_blocks(filter).max(0) as usize;
        let mut ids = vec![0; count];
        let found = self.handle.metadata_block_ids(&mut ids, filter);
        ids.truncate(found);
        ids.into_iter().map(ItemId).collect()
    }

    fn metadata(&self, block: ItemId) -> Result<Vec<u8>, CodecError> {
        self.handle.metadata(block.0).map_err(codec_error)
    }

    fn thumbnail(&self, layout: PixelLayout) -> Option<LibHeifImage> {
        let mut ids = vec![0; self.handle.number_of_thumbnails()];
        let found = self.handle.thumbnail_ids(&mut ids);
        let first = *ids.get(..found)?.first()?;
        let thumbnail = self.handle.thumbnail(first).ok()?;
        decode_handle(&thumbnail, layout).ok()
    }
}

/// Type filters are four ASCII bytes, `"Exif"` for example.
fn four_cc(block_type: &str) -> Option<FourCC> {
    let code: [u8; 4] = block_type.as_bytes().try_into().ok()?;
    Some(FourCC(code))
}

fn decode_handle(
    handle: &libheif_rs::ImageHandle,
    layout: PixelLayout,
) -> Result<LibHeifImage, CodecError> {
    let chroma = match layout {
        PixelLayout::Rgb => RgbChroma::Rgb,
        PixelLayout::Rgba => RgbChroma::Rgba,
    };
    let image = LIB_HEIF
        .decode(handle, ColorSpace::Rgb(chroma), None)
        .map_err(codec_error)?;

    let planes = image.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| CodecError::new("Decoded image has no interleaved plane"))?;
    let (width, height) = (plane.width, plane.height);
    let stride = plane.stride;
    let bits_per_pixel = u32::from(plane.storage_bits_per_pixel);

    Ok(LibHeifImage {
        width,
        height,
        stride,
        bits_per_pixel,
        image,
    })
}

/// A decoded libheif image with one interleaved plane.
pub struct LibHeifImage {
    width: u32,
    height: u32,
    stride: usize,
    bits_per_pixel: u32,
    image: libheif_rs::Image,
}

impl PixelSource for LibHeifImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn bits_per_pixel(&self) -> u32 {
        self.bits_per_pixel
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn data(&self) -> &[u8] {
        match self.image.planes().interleaved {
            Some(plane) => plane.data,
            None => &[],
        }
    }
}
