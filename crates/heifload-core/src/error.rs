//! Error types for the HEIF load pipeline.
//!
//! Every stage has its own failure variant so the pipeline boundary can turn
//! any of them into exactly one user-visible message. Codec failures carry the
//! codec's own error string and nothing else.

use thiserror::Error;

use crate::codec::ItemId;

/// An error reported by the codec library, carrying its message verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CodecError {
    message: String,
}

impl CodecError {
    /// Wrap a codec error string.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The codec's error string.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while copying decoded pixels into a destination surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The decoded buffer does not hold a whole number of bytes per pixel.
    #[error("Unsupported pixel depth: {bits_per_pixel} bits per pixel")]
    UnsupportedDepth {
        /// Pixel size reported by the codec.
        bits_per_pixel: u32,
    },

    /// The decoded buffer's pixel size differs from the layout that was requested.
    #[error("Pixel layout mismatch: expected {expected} bytes per pixel, got {actual}")]
    LayoutMismatch {
        /// Bytes per pixel of the requested layout.
        expected: usize,
        /// Bytes per pixel of the decoded buffer.
        actual: usize,
    },

    /// A row stride smaller than one tightly packed row.
    #[error("Row stride {stride} is shorter than a {tight} byte row")]
    StrideTooShort {
        /// Stride reported by the codec.
        stride: usize,
        /// Length of one packed row.
        tight: usize,
    },

    /// The pixel buffer ends before the last row does.
    #[error("Pixel buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort {
        /// Bytes needed to reach the end of the last row.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Destination and decoded image disagree on geometry.
    #[error(
        "Destination is {dest_width}x{dest_height} but the decoded image is {width}x{height}"
    )]
    GeometryMismatch {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
        /// Surface width.
        dest_width: u32,
        /// Surface height.
        dest_height: u32,
    },

    /// The destination refused a write.
    #[error("Destination rejected pixel data: {0}")]
    Rejected(String),
}

/// Errors raised by the host while creating a destination surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// Width or height is zero.
    #[error("Invalid surface dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// The layer could not be inserted into its parent image.
    #[error("Failed to insert layer into image: {0}")]
    AttachFailed(String),
}

/// Terminal failures of the load pipeline.
///
/// None of these are retried. `Display` is the message shown to the user.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The byte source is not a readable container.
    #[error("{0}")]
    ContainerOpen(CodecError),

    /// The container holds no top-level images.
    #[error("Input file contains no readable images")]
    EmptyContainer,

    /// The container has no usable primary item pointer.
    #[error("{0}")]
    PrimaryLookup(CodecError),

    /// The selected item could not be turned into an image handle.
    #[error("{source}")]
    HandleResolution {
        /// The item that was selected.
        item: ItemId,
        /// Why no handle could be acquired.
        source: CodecError,
    },

    /// The codec failed to decode the selected item.
    #[error("{0}")]
    Decode(CodecError),

    /// The destination surface could not be created or attached.
    #[error("{0}")]
    SurfaceAttach(SurfaceError),

    /// Copying pixels into the destination failed.
    #[error("{0}")]
    Transfer(#[from] TransferError),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_is_shown_verbatim() {
        let err = LoadError::Decode(CodecError::new("Unsupported codec: hvc1 profile 4"));
        assert_eq!(err.to_string(), "Unsupported codec: hvc1 profile 4");

        let err = LoadError::HandleResolution {
            item: ItemId(7),
            source: CodecError::new("Nonexisting item ID referenced"),
        };
        assert_eq!(err.to_string(), "Nonexisting item ID referenced");
    }

    #[test]
    fn test_empty_container_message() {
        assert_eq!(
            LoadError::EmptyContainer.to_string(),
            "Input file contains no readable images"
        );
    }

    #[test]
    fn test_transfer_error_converts() {
        let err: LoadError = TransferError::StrideTooShort {
            stride: 10,
            tight: 12,
        }
        .into();
        assert!(matches!(err, LoadError::Transfer(_)));
        assert_eq!(err.to_string(), "Row stride 10 is shorter than a 12 byte row");
    }
}
