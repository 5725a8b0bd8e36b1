//! Shared fixtures for the load pipeline tests.

#![allow(dead_code)]

use std::path::PathBuf;

use heifload_core::codec::memory::{MemoryCodec, MemoryFile};
use heifload_core::surface::raster::{RasterDestination, RasterImage};
use heifload_core::{
    load, ByteSource, Choice, ItemCandidate, ItemId, LoadError, LoadOutcome, LoaderConfig, RunMode,
};

pub const PATH: &str = "photo.heic";

pub fn source() -> ByteSource {
    ByteSource::File(PathBuf::from(PATH))
}

pub fn codec_with(file: MemoryFile) -> MemoryCodec {
    MemoryCodec::new().with_file(PATH, file)
}

/// A chooser that fails the test if it is ever shown.
pub fn never_shown(_: &[ItemCandidate], _: ItemId) -> Choice {
    panic!("chooser must not be shown")
}

/// Run a load with the default configuration and no chooser.
pub fn run(
    codec: &MemoryCodec,
    dest: &mut RasterDestination,
    mode: RunMode,
) -> Result<LoadOutcome<RasterImage>, LoadError> {
    let mut chooser = never_shown;
    load(
        codec,
        dest,
        &mut chooser,
        &LoaderConfig::default(),
        &source(),
        mode,
    )
}

/// Run a load and unwrap the loaded image.
pub fn run_loaded(codec: &MemoryCodec, dest: &mut RasterDestination) -> RasterImage {
    run(codec, dest, RunMode::NonInteractive)
        .unwrap()
        .into_loaded()
        .unwrap()
        .image
}
