use super::types::{Cutout, SegmentationError, SubjectSegmenter};
use crate::raster::{Mask, Raster, RasterError};

/// Center-weighted radial cutout.
///
/// Keeps every pixel whose center lies within `radius_fraction * width` of
/// the image center and drops the rest. This is not real segmentation: it
/// stands in where no matting model or service is available, and it is
/// deterministic, offline, and a single pass over the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalSegmenter {
    radius_fraction: f64,
}

impl LocalSegmenter {
    pub const DEFAULT_RADIUS_FRACTION: f64 = 0.3;

    pub fn new() -> Self {
        Self {
            radius_fraction: Self::DEFAULT_RADIUS_FRACTION,
        }
    }

    pub fn with_radius_fraction(radius_fraction: f64) -> Self {
        Self {
            radius_fraction: radius_fraction.max(0.0),
        }
    }

    pub fn radius_fraction(&self) -> f64 {
        self.radius_fraction
    }

    /// Build the radial mask for an image of the given size.
    pub fn mask(&self, width: u32, height: u32) -> Result<Mask, RasterError> {
        radial_mask(width, height, self.radius_fraction)
    }
}

impl Default for LocalSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SubjectSegmenter for LocalSegmenter {
    async fn segment(&self, original: &Raster, _encoded: &[u8]) -> Result<Cutout, SegmentationError> {
        let (width, height) = original.dimensions();
        let fraction = self.radius_fraction;

        let mask = tokio::task::spawn_blocking(move || {
            let _span = tracing::debug_span!("radial_mask", width, height).entered();
            radial_mask(width, height, fraction)
        })
        .await
        .map_err(|err| SegmentationError::Internal(err.to_string()))??;

        tracing::debug!("Radial mask keeps {:.1}% of pixels", mask.coverage() * 100.0);
        Ok(Cutout::Mask(mask))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

fn radial_mask(width: u32, height: u32, fraction: f64) -> Result<Mask, RasterError> {
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let radius = fraction * width as f64;
    let radius_sq = radius * radius;

    Mask::from_fn(width, height, |x, y| {
        let dx = x as f64 + 0.5 - cx;
        let dy = y as f64 + 0.5 - cy;
        if dx * dx + dy * dy <= radius_sq {
            u8::MAX
        } else {
            0
        }
    })
}
