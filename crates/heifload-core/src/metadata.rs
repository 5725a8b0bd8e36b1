//! Metadata blocks attached to decoded items.
//!
//! HEIF stores EXIF data in a block whose first 4 bytes are a big-endian
//! offset to the TIFF header. Consumers of the destination's metadata
//! side-channel expect the TIFF data alone, so the envelope is skipped before
//! attaching. The payload bytes are never rewritten.

use exif::{In, Reader, Tag};

/// Metadata block type requested from the codec.
pub const EXIF_BLOCK_TYPE: &str = "Exif";

/// Tag under which the EXIF payload is attached to the destination.
pub const EXIF_PARASITE_TAG: &str = "exif-data";

/// Size of the codec envelope in front of the EXIF payload.
pub const EXIF_HEADER_SKIP: usize = 4;

/// An opaque metadata block as fetched from the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataBlock {
    block_type: String,
    bytes: Vec<u8>,
}

impl MetadataBlock {
    /// Wrap the raw bytes of one block.
    pub fn new(block_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            block_type: block_type.into(),
            bytes,
        }
    }

    /// The block type, `Exif` for example.
    pub fn block_type(&self) -> &str {
        &self.block_type
    }

    /// The whole block, envelope included.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the raw block in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the block is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The bytes after the codec envelope.
    ///
    /// Returns `None` when the block is too short to hold the envelope.
    pub fn payload(&self) -> Option<&[u8]> {
        self.bytes.get(EXIF_HEADER_SKIP..)
    }

    /// A read-only summary of the EXIF payload, for logging.
    pub fn exif_summary(&self) -> Option<ExifSummary> {
        ExifSummary::parse(self.payload()?)
    }
}

/// A few EXIF fields worth reporting when an image is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifSummary {
    /// EXIF orientation tag value (1-8).
    pub orientation: Option<u32>,
    /// Camera manufacturer.
    pub camera_make: Option<String>,
    /// Camera model.
    pub camera_model: Option<String>,
}

impl ExifSummary {
    /// Parse raw TIFF-structured EXIF data. Returns `None` if it does not parse.
    pub fn parse(tiff: &[u8]) -> Option<Self> {
        let exif = Reader::new().read_raw(tiff.to_vec()).ok()?;
        let text = |tag| {
            exif.get_field(tag, In::PRIMARY)
                .map(|f| f.display_value().to_string().trim_matches('"').to_string())
        };
        Some(Self {
            orientation: exif
                .get_field(Tag::Orientation, In::PRIMARY)
                .and_then(|f| f.value.get_uint(0)),
            camera_make: text(Tag::Make),
            camera_model: text(Tag::Model),
        })
    }
}
