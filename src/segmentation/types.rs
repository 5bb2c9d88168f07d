use crate::codec::DecodeError;
use crate::raster::{Mask, Raster, RasterError};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Failure of the remote background-removal call.
#[derive(Error, Debug)]
pub enum RemoteSegmentationError {
    #[error("no API key configured for the background-removal service")]
    MissingCredential,
    #[error("request to background-removal service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("background-removal service answered with HTTP {0}")]
    Status(u16),
    #[error("background-removal service did not answer within {0:?}")]
    Timeout(Duration),
    #[error("background-removal service returned an unreadable image: {0}")]
    Decode(#[from] DecodeError),
    #[error("decoding worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error(transparent)]
    Remote(#[from] RemoteSegmentationError),
    #[error("cutout is {actual:?}, expected {expected:?}")]
    Dimensions {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("segmentation failed: {0}")]
    Internal(String),
}

impl From<RasterError> for SegmentationError {
    fn from(err: RasterError) -> Self {
        SegmentationError::Internal(err.to_string())
    }
}

/// What a segmenter hands back for an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cutout {
    /// Alpha to apply to the original colors.
    Mask(Mask),
    /// A raster that already carries the subject's alpha, sized like the original.
    Matted(Raster),
}

/// Matted foreground plus the original it was cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationResult {
    foreground: Raster,
    original: Raster,
}

impl SegmentationResult {
    pub fn new(foreground: Raster, original: Raster) -> Result<Self, SegmentationError> {
        if foreground.dimensions() != original.dimensions() {
            return Err(SegmentationError::Dimensions {
                expected: original.dimensions(),
                actual: foreground.dimensions(),
            });
        }
        Ok(Self {
            foreground,
            original,
        })
    }

    /// Caller guarantees matching dimensions.
    pub(crate) fn from_parts(foreground: Raster, original: Raster) -> Self {
        debug_assert_eq!(foreground.dimensions(), original.dimensions());
        Self {
            foreground,
            original,
        }
    }

    pub fn foreground(&self) -> &Raster {
        &self.foreground
    }

    pub fn original(&self) -> &Raster {
        &self.original
    }

    /// Split into the foreground and the opaque, unblurred backdrop.
    pub fn into_layers(self) -> (Raster, Raster) {
        let backdrop = self.original.opaque();
        (self.foreground, backdrop)
    }
}

/// Trait for subject/background classifiers
/// Allows swapping between the remote service and the local heuristic
pub trait SubjectSegmenter: Send + Sync {
    /// Classify the pixels of `original`.
    ///
    /// `encoded` holds the bytes `original` was decoded from, for
    /// segmenters that ship the image elsewhere.
    fn segment(
        &self,
        original: &Raster,
        encoded: &[u8],
    ) -> impl Future<Output = Result<Cutout, SegmentationError>> + Send;

    /// Short label used in logs
    fn name(&self) -> &'static str;
}

/// Transport to an external background-removal service.
pub trait MattingService: Send + Sync {
    /// Exchange encoded image bytes for an alpha-matted encoded image.
    fn remove_background(
        &self,
        image: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, RemoteSegmentationError>> + Send;
}
