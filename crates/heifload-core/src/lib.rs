//! Heifload Core - HEIF item selection and pixel transfer
//!
//! This crate turns one image item of a HEIF container into a host image:
//! it picks the item to load, decodes it to interleaved 8-bit RGB or RGBA,
//! copies the rows into a host drawing surface while honouring the decoder's
//! row stride, and attaches the EXIF block as a named metadata parasite.
//!
//! # Module Structure
//!
//! - `codec` - Decoder seam (container, handle, pixel source) and backends
//! - `inspect` - Container inspection, primary item resolution, chooser
//! - `decoder` - Decoding a selected item and reading its metadata blocks
//! - `surface` - Host image and drawing surface seam, raster host
//! - `transfer` - Stride-aware pixel copy and finalization
//! - `metadata` - Metadata blocks and the EXIF envelope
//! - `pipeline` - The complete load run
//! - `config` - Loader settings read from TOML

#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod decoder;
pub mod error;
pub mod inspect;
pub mod metadata;
pub mod pipeline;
pub mod preview;
pub mod surface;
pub mod transfer;

pub use codec::{ByteSource, HeifCodec, ImageContainer, ImageHandle, ItemId, PixelLayout, PixelSource};
pub use config::LoaderConfig;
pub use error::{CodecError, ConfigError, LoadError, SurfaceError, TransferError};
pub use inspect::{Choice, ItemCandidate, ItemChooser};
pub use metadata::{MetadataBlock, EXIF_BLOCK_TYPE, EXIF_PARASITE_TAG};
pub use pipeline::{load, LoadOutcome, LoadedImage, Pipeline, PipelineStage, RunMode};
pub use surface::{Destination, Rect, Surface, SurfaceSpec};
pub use transfer::CopyMode;
