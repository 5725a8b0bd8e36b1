//! Codec seam.
//!
//! The load pipeline never parses container bytes or decodes pixels itself.
//! It talks to a codec through the traits in this module:
//!
//! - [`HeifCodec`] opens a [`ByteSource`] into a container
//! - [`ImageContainer`] enumerates items and resolves image handles
//! - [`ImageHandle`] reports per-item properties, decodes pixels and reads
//!   metadata blocks
//! - [`PixelSource`] is a read-only view of a decoded interleaved buffer
//!
//! Every acquired value is an owned Rust value. Dropping it releases the
//! underlying codec resource, so release happens exactly once on every path.
//!
//! Codecs shipped with the crate:
//!
//! - [`libheif::LibHeifCodec`] reads HEIF files through libheif (feature
//!   `libheif`, on by default)
//! - [`memory::MemoryCodec`] builds containers programmatically
//! - [`still::StillImageCodec`] exposes single-image files the `image` crate
//!   can read

#[cfg(feature = "libheif")]
pub mod libheif;
pub mod memory;
pub mod still;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::CodecError;

/// Opaque identifier of an item inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interleaved RGB pixel layout requested from the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 3 bytes per pixel, R G B.
    Rgb,
    /// 4 bytes per pixel, R G B A.
    Rgba,
}

impl PixelLayout {
    /// The layout to request for an item with or without an alpha channel.
    pub fn for_alpha(has_alpha: bool) -> Self {
        if has_alpha {
            PixelLayout::Rgba
        } else {
            PixelLayout::Rgb
        }
    }

    /// Bytes per interleaved pixel.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }

    /// Bits per interleaved pixel.
    #[inline]
    pub fn bits_per_pixel(self) -> u32 {
        self.bytes_per_pixel() as u32 * 8
    }

    /// Whether the layout carries alpha.
    #[inline]
    pub fn has_alpha(self) -> bool {
        matches!(self, PixelLayout::Rgba)
    }
}

/// Where the encoded container bytes come from.
#[derive(Debug, Clone)]
pub enum ByteSource {
    /// A file on disk.
    File(PathBuf),
    /// Bytes already in memory.
    Memory(Vec<u8>),
}

impl ByteSource {
    /// The file path, if this source is a file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ByteSource::File(path) => Some(path),
            ByteSource::Memory(_) => None,
        }
    }

    /// Read the whole source into memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            ByteSource::File(path) => std::fs::read(path)
                .map_err(|e| CodecError::new(format!("Cannot read {}: {}", path.display(), e))),
            ByteSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

impl fmt::Display for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteSource::File(path) => write!(f, "{}", path.display()),
            ByteSource::Memory(bytes) => write!(f, "<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Read-only view of a decoded interleaved pixel buffer.
///
/// `data()` starts at the first pixel of row 0. Row `y` starts at byte
/// `y * stride()`. The last row only needs to be `width * bytes_per_pixel`
/// long, so the buffer may be shorter than `height * stride()`.
pub trait PixelSource {
    /// Width in pixels.
    fn width(&self) -> u32;
    /// Height in pixels.
    fn height(&self) -> u32;
    /// Storage size of one interleaved pixel, in bits.
    fn bits_per_pixel(&self) -> u32;
    /// Distance in bytes between the starts of two consecutive rows.
    fn stride(&self) -> usize;
    /// The pixel bytes, starting at row 0.
    fn data(&self) -> &[u8];
}

/// A handle to one item of an open container.
pub trait ImageHandle {
    /// The decoded pixel buffer type.
    type Image: PixelSource;

    /// ID of the item this handle refers to.
    fn item_id(&self) -> ItemId;
    /// Width of the item in pixels.
    fn width(&self) -> u32;
    /// Height of the item in pixels.
    fn height(&self) -> u32;
    /// Whether the item carries an alpha channel.
    fn has_alpha(&self) -> bool;

    /// Decode the item into the given interleaved RGB layout.
    fn decode(&self, layout: PixelLayout) -> Result<Self::Image, CodecError>;

    /// IDs of the metadata blocks of the given type, in container order.
    fn metadata_block_ids(&self, block_type: &str) -> Vec<ItemId>;

    /// Raw bytes of one metadata block.
    fn metadata(&self, block: ItemId) -> Result<Vec<u8>, CodecError>;

    /// Decode the item's embedded thumbnail, if it has one.
    fn thumbnail(&self, _layout: PixelLayout) -> Option<Self::Image> {
        None
    }
}

/// An open container.
pub trait ImageContainer {
    /// The image handle type.
    type Handle: ImageHandle;

    /// Top-level item IDs in container order.
    fn top_level_item_ids(&self) -> Vec<ItemId>;

    /// Whether `item` is one of the top-level items.
    fn is_top_level(&self, item: ItemId) -> bool {
        self.top_level_item_ids().contains(&item)
    }

    /// The item the container declares as primary.
    fn primary_item_id(&self) -> Result<ItemId, CodecError>;

    /// Acquire a handle for one item.
    fn handle(&self, item: ItemId) -> Result<Self::Handle, CodecError>;
}

/// Entry point of a codec library.
pub trait HeifCodec {
    /// The open container type.
    type Container: ImageContainer;

    /// Parse the container structure of `source`.
    fn open(&self, source: &ByteSource) -> Result<Self::Container, CodecError>;
}
