//! Image decoding for a selected item.

use tracing::{debug, warn};

use crate::codec::{ImageContainer, ImageHandle, ItemId, PixelLayout, PixelSource};
use crate::error::LoadError;
use crate::metadata::MetadataBlock;

/// Decoded pixels of one item together with the layout they were requested in.
///
/// Owns the codec image; dropping it releases the buffer.
#[derive(Debug)]
pub struct DecodedImage<I> {
    image: I,
    item: ItemId,
    layout: PixelLayout,
}

impl<I: PixelSource> DecodedImage<I> {
    /// The item that was decoded.
    pub fn item(&self) -> ItemId {
        self.item
    }

    /// The layout the pixels were decoded into.
    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Whether the pixels carry alpha.
    pub fn has_alpha(&self) -> bool {
        self.layout.has_alpha()
    }

    /// The codec image itself.
    pub fn inner(&self) -> &I {
        &self.image
    }
}

impl<I: PixelSource> PixelSource for DecodedImage<I> {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn bits_per_pixel(&self) -> u32 {
        self.image.bits_per_pixel()
    }

    fn stride(&self) -> usize {
        self.image.stride()
    }

    fn data(&self) -> &[u8] {
        self.image.data()
    }
}

/// Resolve an item to an image handle.
pub fn get_handle<C: ImageContainer>(container: &C, item: ItemId) -> Result<C::Handle, LoadError> {
    container
        .handle(item)
        .map_err(|source| LoadError::HandleResolution { item, source })
}

/// Whether the item carries alpha, which decides the requested layout.
pub fn has_alpha<H: ImageHandle>(handle: &H) -> bool {
    handle.has_alpha()
}

/// Decode the item as interleaved RGB, or RGBA when it has alpha.
///
/// The layout is fixed from the handle before decoding starts.
pub fn decode<H: ImageHandle>(handle: &H) -> Result<DecodedImage<H::Image>, LoadError> {
    let layout = PixelLayout::for_alpha(has_alpha(handle));
    let image = handle.decode(layout).map_err(LoadError::Decode)?;
    debug!(
        item = %handle.item_id(),
        width = image.width(),
        height = image.height(),
        stride = image.stride(),
        ?layout,
        "Decoded item"
    );
    Ok(DecodedImage {
        image,
        item: handle.item_id(),
        layout,
    })
}

/// Fetch the first metadata block of `block_type`.
///
/// Missing metadata is a normal outcome. Further blocks of the same type are
/// ignored. A block that is listed but cannot be read counts as missing.
pub fn extract_metadata<H: ImageHandle>(handle: &H, block_type: &str) -> Option<MetadataBlock> {
    let ids = handle.metadata_block_ids(block_type);
    let first = *ids.first()?;
    if ids.len() > 1 {
        debug!(block_type, count = ids.len(), "Using the first of several metadata blocks");
    }

    match handle.metadata(first) {
        Ok(bytes) => Some(MetadataBlock::new(block_type, bytes)),
        Err(e) => {
            warn!(block_type, error = %e, "Could not read metadata block");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::memory::{MemoryCodec, MemoryFile, MemoryItem, Resource};
    use crate::codec::{ByteSource, HeifCodec};
    use crate::metadata::EXIF_BLOCK_TYPE;
    use std::path::PathBuf;

    fn codec_with(item: MemoryItem) -> MemoryCodec {
        MemoryCodec::new().with_file("test.heic", MemoryFile::new().with_item(item))
    }

    fn source() -> ByteSource {
        ByteSource::File(PathBuf::from("test.heic"))
    }

    #[test]
    fn test_alpha_item_decodes_as_rgba() {
        let codec = codec_with(MemoryItem::patterned(1, 3, 2, true));
        let container = codec.open(&source()).unwrap();
        let handle = get_handle(&container, ItemId(1)).unwrap();

        let decoded = decode(&handle).unwrap();
        assert_eq!(decoded.layout(), PixelLayout::Rgba);
        assert_eq!(decoded.bits_per_pixel(), 32);
        assert_eq!(decoded.item(), ItemId(1));
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
    }

    #[test]
    fn test_opaque_item_decodes_as_rgb() {
        let codec = codec_with(MemoryItem::patterned(1, 3, 2, false));
        let container = codec.open(&source()).unwrap();
        let handle = get_handle(&container, ItemId(1)).unwrap();

        let decoded = decode(&handle).unwrap();
        assert!(!decoded.has_alpha());
        assert_eq!(decoded.stride(), 9);
    }

    #[test]
    fn test_unknown_item_is_handle_error() {
        let codec = codec_with(MemoryItem::patterned(1, 1, 1, false));
        let container = codec.open(&source()).unwrap();
        let err = get_handle(&container, ItemId(42)).unwrap_err();
        assert!(matches!(
            err,
            LoadError::HandleResolution {
                item: ItemId(42),
                ..
            }
        ));
    }

    #[test]
    fn test_decode_failure_leaves_nothing_behind() {
        let codec = codec_with(MemoryItem::patterned(1, 1, 1, false).with_decode_error("boom"));
        {
            let container = codec.open(&source()).unwrap();
            let handle = get_handle(&container, ItemId(1)).unwrap();
            let err = decode(&handle).unwrap_err();
            assert_eq!(err.to_string(), "boom");
        }
        assert!(codec.all_released());
        assert_eq!(codec.acquired(Resource::Image), 0);
    }

    #[test]
    fn test_metadata_absent() {
        let codec = codec_with(MemoryItem::patterned(1, 1, 1, false).with_metadata("mime", vec![1]));
        let container = codec.open(&source()).unwrap();
        let handle = get_handle(&container, ItemId(1)).unwrap();
        assert!(extract_metadata(&handle, EXIF_BLOCK_TYPE).is_none());
    }

    #[test]
    fn test_only_first_exif_block_is_used() {
        let codec = codec_with(
            MemoryItem::patterned(1, 1, 1, false)
                .with_metadata(EXIF_BLOCK_TYPE, vec![0, 0, 0, 0, 1])
                .with_metadata(EXIF_BLOCK_TYPE, vec![0, 0, 0, 0, 2]),
        );
        let container = codec.open(&source()).unwrap();
        let handle = get_handle(&container, ItemId(1)).unwrap();

        let block = extract_metadata(&handle, EXIF_BLOCK_TYPE).unwrap();
        assert_eq!(block.bytes(), &[0, 0, 0, 0, 1]);
        assert_eq!(block.block_type(), EXIF_BLOCK_TYPE);
    }
}
