//! Loading real image files through the still-image codec.

use heifload_core::codec::still::StillImageCodec;
use heifload_core::surface::raster::RasterDestination;
use heifload_core::{
    load, ByteSource, Choice, CopyMode, ItemCandidate, ItemId, LoadError, LoaderConfig, RunMode,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

fn no_chooser(_: &[ItemCandidate], _: ItemId) -> Choice {
    panic!("chooser must not be shown")
}

fn write_png(image: &DynamicImage) -> tempfile::NamedTempFile {
    let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    image.save_with_format(file.path(), ImageFormat::Png).unwrap();
    file
}

#[test]
fn test_png_file_loads_as_single_item() {
    let mut img = RgbImage::new(7, 3);
    for (x, y, px) in img.enumerate_pixels_mut() {
        *px = Rgb([x as u8 * 30, y as u8 * 80, 200]);
    }
    let expected = img.as_raw().clone();
    let file = write_png(&DynamicImage::ImageRgb8(img));

    let mut dest = RasterDestination::new();
    let mut chooser = no_chooser;
    let loaded = load(
        &StillImageCodec::new(),
        &mut dest,
        &mut chooser,
        &LoaderConfig::default(),
        &ByteSource::File(file.path().to_path_buf()),
        RunMode::Interactive,
    )
    .unwrap()
    .into_loaded()
    .unwrap();

    assert_eq!((loaded.width, loaded.height), (7, 3));
    assert!(!loaded.has_alpha);
    assert_eq!(loaded.copy_mode, CopyMode::Bulk);
    assert!(!loaded.exif_attached);
    assert_eq!(loaded.image.pixels(), expected.as_slice());
    assert_eq!(loaded.image.filename.as_deref(), Some(file.path()));
}

#[test]
fn test_png_with_alpha_round_trips_to_dynamic_image() {
    let img = RgbaImage::from_pixel(2, 2, Rgba([5, 6, 7, 128]));
    let file = write_png(&DynamicImage::ImageRgba8(img.clone()));

    let mut dest = RasterDestination::new();
    let mut chooser = no_chooser;
    let loaded = load(
        &StillImageCodec::new(),
        &mut dest,
        &mut chooser,
        &LoaderConfig::default(),
        &ByteSource::File(file.path().to_path_buf()),
        RunMode::NonInteractive,
    )
    .unwrap()
    .into_loaded()
    .unwrap();

    assert!(loaded.has_alpha);
    let dynamic = loaded.image.to_dynamic_image().unwrap();
    assert_eq!(dynamic.to_rgba8(), img);
}

#[test]
fn test_garbage_bytes_fail_to_open() {
    let mut dest = RasterDestination::new();
    let mut chooser = no_chooser;
    let err = load(
        &StillImageCodec::new(),
        &mut dest,
        &mut chooser,
        &LoaderConfig::default(),
        &ByteSource::Memory(b"definitely not an image".to_vec()),
        RunMode::NonInteractive,
    )
    .unwrap_err();

    assert!(matches!(err, LoadError::ContainerOpen(_)));
    assert_eq!(dest.created(), 0);
}
