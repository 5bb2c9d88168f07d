//! Foreground and background layer construction.
//!
//! Neither layer is cropped or resized here; both keep the original's
//! dimensions and fitting to a viewport happens at draw time.

use crate::blur::gaussian_blur;
use crate::raster::{Mask, Raster};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompositeError {
    #[error("mask is {mask:?} but the image is {image:?}")]
    DimensionMismatch { image: (u32, u32), mask: (u32, u32) },
}

/// Original colors with the mask as alpha.
pub fn build_foreground(original: &Raster, mask: &Mask) -> Result<Raster, CompositeError> {
    if original.dimensions() != mask.dimensions() {
        return Err(CompositeError::DimensionMismatch {
            image: original.dimensions(),
            mask: mask.dimensions(),
        });
    }

    let _span = tracing::debug_span!("build_foreground").entered();

    Ok(original.with_alpha(mask.values()))
}

/// Fully opaque, blurred copy of the original.
pub fn build_background(original: &Raster, blur_radius: u32) -> Raster {
    let _span = tracing::debug_span!("build_background", blur_radius).entered();
    gaussian_blur(&original.opaque(), blur_radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo() -> Raster {
        Raster::from_fn(5, 4, |x, y| [x as u8 * 50, y as u8 * 60, 33, 77]).unwrap()
    }

    #[test]
    fn foreground_takes_colors_from_original_and_alpha_from_mask() {
        let original = photo();
        let mask = Mask::from_fn(5, 4, |x, y| (x * 40 + y * 7) as u8).unwrap();
        let foreground = build_foreground(&original, &mask).unwrap();

        for y in 0..4 {
            for x in 0..5 {
                let px = foreground.pixel(x, y);
                let orig = original.pixel(x, y);
                assert_eq!(px[..3], orig[..3]);
                assert_eq!(px[3], mask.get(x, y));
            }
        }
    }

    #[test]
    fn foreground_rejects_mismatched_mask() {
        let mask = Mask::opaque(4, 5).unwrap();
        assert_eq!(
            build_foreground(&photo(), &mask),
            Err(CompositeError::DimensionMismatch {
                image: (5, 4),
                mask: (4, 5)
            })
        );
    }

    #[test]
    fn background_is_opaque_and_same_size() {
        let background = build_background(&photo(), 3);
        assert_eq!(background.dimensions(), (5, 4));
        assert!(background.as_bytes().chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn background_without_blur_is_opaque_original() {
        assert_eq!(build_background(&photo(), 0), photo().opaque());
    }
}
