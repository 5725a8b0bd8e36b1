//! Buffer transfer from decoded pixels into a destination surface.
//!
//! Decoded buffers may pad every row out to an aligned stride. When they do
//! not, the whole buffer goes to the surface in one rectangle write;
//! otherwise each row is written separately and the padding is skipped. Both
//! paths leave identical pixels in the surface.

use std::path::Path;

use tracing::{debug, warn};

use crate::codec::{PixelLayout, PixelSource};
use crate::error::{LoadError, TransferError};
use crate::metadata::{MetadataBlock, EXIF_PARASITE_TAG};
use crate::surface::{Destination, Rect, Surface, SurfaceSpec};

/// How pixel rows are handed to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// One write covering the whole image.
    Bulk,
    /// One write per row, skipping stride padding.
    RowByRow,
}

/// Validated row layout of a decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowGeometry {
    /// Pixels per row.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Bytes per interleaved pixel, 3 or 4.
    pub bytes_per_pixel: usize,
    /// `width * bytes_per_pixel`.
    pub tight_row_bytes: usize,
    /// Bytes between row starts in the source buffer, padding included.
    pub stride: usize,
}

impl RowGeometry {
    /// Validate the geometry of a decoded buffer.
    ///
    /// # Errors
    ///
    /// - `UnsupportedDepth` when bits per pixel is zero or not a multiple of 8
    /// - `StrideTooShort` when a row does not fit in the stride
    /// - `BufferTooShort` when the buffer ends before the last row
    pub fn of<P: PixelSource + ?Sized>(image: &P) -> Result<Self, TransferError> {
        let bits_per_pixel = image.bits_per_pixel();
        if bits_per_pixel == 0 || bits_per_pixel % 8 != 0 {
            return Err(TransferError::UnsupportedDepth { bits_per_pixel });
        }

        let bytes_per_pixel = (bits_per_pixel / 8) as usize;
        let tight_row_bytes = image.width() as usize * bytes_per_pixel;
        let stride = image.stride();
        if stride < tight_row_bytes {
            return Err(TransferError::StrideTooShort {
                stride,
                tight: tight_row_bytes,
            });
        }

        let geometry = Self {
            width: image.width(),
            height: image.height(),
            bytes_per_pixel,
            tight_row_bytes,
            stride,
        };
        let actual = image.data().len();
        let expected = geometry.required_len();
        if actual < expected {
            return Err(TransferError::BufferTooShort { expected, actual });
        }
        Ok(geometry)
    }

    /// Bytes needed to reach the end of the last row.
    pub fn required_len(&self) -> usize {
        match self.height as usize {
            0 => 0,
            rows => self.stride * (rows - 1) + self.tight_row_bytes,
        }
    }

    /// `Bulk` when rows are contiguous, `RowByRow` when padding is present.
    pub fn copy_mode(&self) -> CopyMode {
        if self.stride == self.tight_row_bytes {
            CopyMode::Bulk
        } else {
            CopyMode::RowByRow
        }
    }

    /// The pixel bytes of each row, without padding.
    pub fn rows<'a>(&self, data: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
        let (stride, tight) = (self.stride, self.tight_row_bytes);
        (0..self.height as usize).map(move |y| &data[y * stride..y * stride + tight])
    }
}

/// Describe the surface that receives `image`.
///
/// Geometry and alpha always come from the decoded buffer itself.
pub fn surface_spec_for<P: PixelSource + ?Sized>(
    image: &P,
    has_alpha: bool,
    filename: Option<&Path>,
    layer_name: &str,
) -> SurfaceSpec {
    SurfaceSpec {
        width: image.width(),
        height: image.height(),
        has_alpha,
        filename: filename.map(Path::to_path_buf),
        layer_name: layer_name.to_string(),
    }
}

/// Ask the host for a surface matching `spec`.
///
/// # Errors
///
/// Any host failure becomes `LoadError::SurfaceAttach`.
pub fn create_destination<D: Destination>(
    destination: &mut D,
    spec: &SurfaceSpec,
) -> Result<D::Surface, LoadError> {
    destination
        .create_surface(spec)
        .map_err(LoadError::SurfaceAttach)
}

/// Copy a decoded buffer into `surface`, choosing the copy mode from the
/// buffer's stride.
///
/// Returns the mode that was used.
pub fn transfer<P, S>(image: &P, surface: &mut S) -> Result<CopyMode, TransferError>
where
    P: PixelSource + ?Sized,
    S: Surface,
{
    let geometry = RowGeometry::of(image)?;
    let mode = geometry.copy_mode();
    copy_rows(image, surface, mode)?;
    debug!(
        width = geometry.width,
        height = geometry.height,
        stride = geometry.stride,
        ?mode,
        "Transferred pixels"
    );
    Ok(mode)
}

/// Copy a decoded buffer into `surface` with an explicit copy mode.
///
/// `Bulk` is only valid for buffers without stride padding.
pub fn copy_rows<P, S>(image: &P, surface: &mut S, mode: CopyMode) -> Result<(), TransferError>
where
    P: PixelSource + ?Sized,
    S: Surface,
{
    let geometry = RowGeometry::of(image)?;
    check_destination(&geometry, surface)?;

    let data = image.data();
    match mode {
        CopyMode::Bulk => {
            if geometry.copy_mode() != CopyMode::Bulk {
                return Err(TransferError::Rejected(format!(
                    "bulk copy needs contiguous rows, stride is {} for {} byte rows",
                    geometry.stride, geometry.tight_row_bytes
                )));
            }
            let len = geometry.tight_row_bytes * geometry.height as usize;
            surface.set_rect(&data[..len], Rect::full(geometry.width, geometry.height))
        }
        CopyMode::RowByRow => {
            for (y, row) in geometry.rows(data).enumerate() {
                surface.set_row(row, y as u32)?;
            }
            Ok(())
        }
    }
}

fn check_destination<S: Surface>(geometry: &RowGeometry, surface: &S) -> Result<(), TransferError> {
    if geometry.width != surface.width() || geometry.height != surface.height() {
        return Err(TransferError::GeometryMismatch {
            width: geometry.width,
            height: geometry.height,
            dest_width: surface.width(),
            dest_height: surface.height(),
        });
    }

    let expected = PixelLayout::for_alpha(surface.has_alpha()).bytes_per_pixel();
    if geometry.bytes_per_pixel != expected {
        return Err(TransferError::LayoutMismatch {
            expected,
            actual: geometry.bytes_per_pixel,
        });
    }
    Ok(())
}

/// Tightly packed copy of a decoded buffer.
pub fn pack_tight<P: PixelSource + ?Sized>(image: &P) -> Result<Vec<u8>, TransferError> {
    let geometry = RowGeometry::of(image)?;
    let mut out = Vec::with_capacity(geometry.tight_row_bytes * geometry.height as usize);
    for row in geometry.rows(image.data()) {
        out.extend_from_slice(row);
    }
    Ok(out)
}

/// Attach an EXIF block to the surface under `"exif-data"`, minus its
/// 4-byte codec envelope.
///
/// Blocks too short to hold the envelope are skipped. Returns whether a
/// payload was attached.
pub fn attach_metadata<S: Surface>(surface: &mut S, block: &MetadataBlock) -> bool {
    match block.payload() {
        Some(payload) => {
            surface.attach_parasite(EXIF_PARASITE_TAG, payload);
            debug!(bytes = payload.len(), "Attached EXIF payload");
            true
        }
        None => {
            warn!(
                bytes = block.len(),
                "EXIF block is shorter than its header, not attaching"
            );
            false
        }
    }
}

/// Commit the surface, mark the whole image as changed and hand it over.
pub fn finalize<S: Surface>(mut surface: S) -> S::Image {
    let full = Rect::full(surface.width(), surface.height());
    surface.flush();
    surface.update(full);
    surface.into_image()
}


#[cfg(test)]
mod tests {
    use super::test_support::Buffer;
    use super::*;
    use crate::surface::raster::{RasterDestination, RasterSurface};

    fn surface_for(buffer: &Buffer, has_alpha: bool) -> (RasterDestination, RasterSurface) {
        let mut dest = RasterDestination::new();
        let spec = surface_spec_for(buffer, has_alpha, None, "image content");
        let surface = create_destination(&mut dest, &spec).unwrap();
        (dest, surface)
    }

    #[test]
    fn test_tight_buffer_uses_bulk_copy() {
        let buffer = Buffer::padded(4, 3, 3, 0, 0);
        let (_dest, mut surface) = surface_for(&buffer, false);

        assert_eq!(transfer(&buffer, &mut surface).unwrap(), CopyMode::Bulk);
        assert_eq!(surface.stats().rect_writes, 1);
        assert_eq!(surface.stats().row_writes, 0);
        assert_eq!(surface.shadow_pixels(), buffer.data.as_slice());
    }

    #[test]
    fn test_padded_buffer_scenario() {
        // width 5, 32 bpp, stride 24, height 2: rows at 0 and 24, 20 bytes each
        let buffer = Buffer::padded(5, 2, 4, 4, 0xEE);
        assert_eq!(buffer.stride, 24);
        let (_dest, mut surface) = surface_for(&buffer, true);

        assert_eq!(transfer(&buffer, &mut surface).unwrap(), CopyMode::RowByRow);
        assert_eq!(surface.stats().row_writes, 2);

        let pixels = surface.shadow_pixels();
        assert_eq!(pixels.len(), 40);
        assert_eq!(&pixels[..20], &buffer.data[0..20]);
        assert_eq!(&pixels[20..], &buffer.data[24..44]);
        assert!(!pixels.contains(&0xEE));
    }

    #[test]
    fn test_last_row_may_omit_padding() {
        let mut buffer = Buffer::padded(2, 2, 3, 2, 0xEE);
        buffer.data.truncate(buffer.stride + 6);
        let (_dest, mut surface) = surface_for(&buffer, false);
        assert_eq!(transfer(&buffer, &mut surface).unwrap(), CopyMode::RowByRow);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let mut buffer = Buffer::padded(2, 2, 3, 0, 0);
        buffer.data.pop();
        let (_dest, mut surface) = surface_for(&buffer, false);
        assert_eq!(
            transfer(&buffer, &mut surface).unwrap_err(),
            TransferError::BufferTooShort {
                expected: 12,
                actual: 11
            }
        );
        assert_eq!(surface.stats().rect_writes, 0);
    }

    #[test]
    fn test_stride_shorter_than_row_is_rejected() {
        let mut buffer = Buffer::padded(4, 1, 3, 0, 0);
        buffer.stride = 8;
        assert_eq!(
            RowGeometry::of(&buffer).unwrap_err(),
            TransferError::StrideTooShort {
                stride: 8,
                tight: 12
            }
        );
    }

    #[test]
    fn test_fractional_depth_is_rejected() {
        let mut buffer = Buffer::padded(1, 1, 3, 0, 0);
        buffer.bits_per_pixel = 30;
        assert!(matches!(
            RowGeometry::of(&buffer),
            Err(TransferError::UnsupportedDepth { bits_per_pixel: 30 })
        ));
    }

    #[test]
    fn test_layout_must_match_surface() {
        let buffer = Buffer::padded(2, 2, 3, 0, 0);
        let (_dest, mut surface) = surface_for(&buffer, true);
        assert_eq!(
            transfer(&buffer, &mut surface).unwrap_err(),
            TransferError::LayoutMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_geometry_must_match_surface() {
        let buffer = Buffer::padded(2, 2, 3, 0, 0);
        let other = Buffer::padded(3, 2, 3, 0, 0);
        let (_dest, mut surface) = surface_for(&other, false);
        assert!(matches!(
            transfer(&buffer, &mut surface),
            Err(TransferError::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn test_forced_bulk_on_padded_buffer_is_rejected() {
        let buffer = Buffer::padded(2, 2, 3, 2, 0);
        let (_dest, mut surface) = surface_for(&buffer, false);
        assert!(copy_rows(&buffer, &mut surface, CopyMode::Bulk).is_err());
    }

    #[test]
    fn test_pack_tight_strips_padding() {
        let buffer = Buffer::padded(1, 3, 3, 5, 0xEE);
        let packed = pack_tight(&buffer).unwrap();
        assert_eq!(packed, vec![0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_attach_metadata_skips_header() {
        let buffer = Buffer::padded(1, 1, 3, 0, 0);
        let (_dest, mut surface) = surface_for(&buffer, false);
        let block = MetadataBlock::new("Exif", vec![0, 0, 0, 6, b'M', b'M', 0, 42]);

        assert!(attach_metadata(&mut surface, &block));
        assert_eq!(
            surface.parasite(EXIF_PARASITE_TAG),
            Some(&[b'M', b'M', 0, 42][..])
        );
    }

    #[test]
    fn test_attach_metadata_ignores_short_block() {
        let buffer = Buffer::padded(1, 1, 3, 0, 0);
        let (_dest, mut surface) = surface_for(&buffer, false);
        let block = MetadataBlock::new("Exif", vec![0, 0]);

        assert!(!attach_metadata(&mut surface, &block));
        assert_eq!(surface.parasite(EXIF_PARASITE_TAG), None);
    }

    #[test]
    fn test_finalize_flushes_and_marks_full_rect() {
        let buffer = Buffer::padded(3, 2, 3, 0, 0);
        let (dest, mut surface) = surface_for(&buffer, false);
        transfer(&buffer, &mut surface).unwrap();

        let image = finalize(surface);
        assert_eq!(image.pixels(), buffer.data.as_slice());
        assert_eq!(image.dirty, vec![Rect::full(3, 2)]);
        assert_eq!(image.stats.flushes, 1);
        assert_eq!(dest.discarded(), 0);
    }
}
