//! Reading HEIF-branded bytes through the libheif codec.

#![cfg(feature = "libheif")]

use heifload_core::codec::libheif::LibHeifCodec;
use heifload_core::surface::raster::RasterDestination;
use heifload_core::{load, ByteSource, Choice, ItemCandidate, ItemId, LoadError, LoaderConfig, RunMode};

fn no_chooser(_: &[ItemCandidate], _: ItemId) -> Choice {
    panic!("chooser must not be shown")
}

/// An ISOBMFF `ftyp` box with major brand `heic` and compatible brands
/// `mif1` and `heic`.
fn ftyp_box() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&24u32.to_be_bytes());
    bytes.extend_from_slice(b"ftyp");
    bytes.extend_from_slice(b"heic");
    bytes.extend_from_slice(&0u32.to_be_bytes());
    bytes.extend_from_slice(b"mif1");
    bytes.extend_from_slice(b"heic");
    bytes
}

fn load_bytes(bytes: Vec<u8>, dest: &mut RasterDestination) -> Result<(), LoadError> {
    let mut chooser = no_chooser;
    load(
        &LibHeifCodec::new(),
        dest,
        &mut chooser,
        &LoaderConfig::default(),
        &ByteSource::Memory(bytes),
        RunMode::Interactive,
    )
    .map(|_| ())
}

#[test]
fn test_heic_brand_reaches_libheif() {
    let mut dest = RasterDestination::new();
    let err = load_bytes(ftyp_box(), &mut dest).unwrap_err();

    // The file is recognised as HEIF and fails on its missing `meta` box,
    // not on the file type.
    match err {
        LoadError::ContainerOpen(codec) => {
            assert!(!codec.message().is_empty());
            assert_ne!(codec.message(), "Unsupported file type");
        }
        other => panic!("expected ContainerOpen, got {other:?}"),
    }
    assert_eq!(dest.created(), 0);
}

#[test]
fn test_truncated_box_is_container_open_error() {
    let mut dest = RasterDestination::new();
    let mut bytes = ftyp_box();
    bytes.truncate(10);

    let err = load_bytes(bytes, &mut dest).unwrap_err();
    assert!(matches!(err, LoadError::ContainerOpen(_)));
    assert_eq!(dest.created(), 0);
}
