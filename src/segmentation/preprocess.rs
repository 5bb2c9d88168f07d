use crate::raster::{Mask, Raster, RasterError};
use image::{imageops, Luma};

/// Resample `raster` to `(width, height)` if it is not already that size.
///
/// The background-removal service may answer at a different resolution than
/// it was sent; the foreground must line up with the original pixel for pixel.
pub fn fit_to(raster: Raster, width: u32, height: u32) -> Result<Raster, RasterError> {
    if raster.dimensions() == (width, height) {
        return Ok(raster);
    }
    if width == 0 || height == 0 {
        return Err(RasterError::EmptyDimensions { width, height });
    }

    let _span = tracing::debug_span!("fit_cutout").entered();
    tracing::debug!(
        "Resampling cutout from {:?} to {}x{}",
        raster.dimensions(),
        width,
        height
    );

    let resized = imageops::resize(
        raster.as_image(),
        width,
        height,
        imageops::FilterType::Lanczos3,
    );
    Raster::from_image(resized)
}

/// Resample a mask with the same filter, keeping it aligned to a new size.
pub fn fit_mask(mask: &Mask, width: u32, height: u32) -> Option<Mask> {
    if mask.dimensions() == (width, height) {
        return Some(mask.clone());
    }

    let gray = image::GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([mask.get(x, y)])
    });
    let resized = imageops::resize(&gray, width, height, imageops::FilterType::Lanczos3);
    Mask::new(width, height, resized.into_raw()).ok()
}

/// Convert a mask to an opaque grayscale raster for visualization
pub fn mask_to_raster(mask: &Mask) -> Result<Raster, RasterError> {
    Raster::from_fn(mask.width(), mask.height(), |x, y| {
        let value = mask.get(x, y);
        [value, value, value, u8::MAX]
    })
}
