mod local;
pub mod preprocess;
mod remote;
pub mod types;

pub use local::LocalSegmenter;
pub use remote::{HttpMattingService, RemoteSegmenter, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
pub use types::{
    Cutout, MattingService, RemoteSegmentationError, SegmentationError, SegmentationResult,
    SubjectSegmenter,
};

use crate::composite;
use crate::config::ProcessingConfig;
use crate::raster::Raster;

/// Segmenter picked from a [`ProcessingConfig`].
#[derive(Debug, Clone)]
pub enum Segmenter {
    Local(LocalSegmenter),
    Remote(RemoteSegmenter<HttpMattingService>),
}

impl Segmenter {
    /// Remote when the config names a service, local otherwise.
    ///
    /// A service client that cannot be built leaves the local heuristic in
    /// charge rather than failing.
    pub fn from_config(config: &ProcessingConfig) -> Self {
        let Some(remote) = &config.remote else {
            tracing::info!("No background-removal service configured, using local heuristic");
            return Segmenter::Local(LocalSegmenter::new());
        };

        match HttpMattingService::new(remote.endpoint.clone(), remote.api_key.clone()) {
            Ok(service) => {
                tracing::info!("Using background-removal service at {}", service.endpoint());
                let fallback = config.local_fallback.then(LocalSegmenter::new);
                Segmenter::Remote(
                    RemoteSegmenter::new(service)
                        .with_timeout(remote.timeout())
                        .with_fallback(fallback),
                )
            }
            Err(err) => {
                tracing::warn!("Cannot reach background-removal service ({}), using local heuristic", err);
                Segmenter::Local(LocalSegmenter::new())
            }
        }
    }
}

impl SubjectSegmenter for Segmenter {
    async fn segment(&self, original: &Raster, encoded: &[u8]) -> Result<Cutout, SegmentationError> {
        match self {
            Segmenter::Local(local) => local.segment(original, encoded).await,
            Segmenter::Remote(remote) => remote.segment(original, encoded).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Segmenter::Local(local) => local.name(),
            Segmenter::Remote(remote) => remote.name(),
        }
    }
}

/// Segment `original` and cut out its foreground. Never fails.
///
/// Any segmentation error leaves the whole frame opaque: the run still
/// produces layers, just without a cutout.
pub async fn segment<S: SubjectSegmenter>(
    segmenter: &S,
    original: Raster,
    encoded: &[u8],
) -> SegmentationResult {
    let outcome = segmenter
        .segment(&original, encoded)
        .await
        .and_then(|cutout| apply_cutout(&original, cutout));

    let foreground = match outcome {
        Ok(foreground) => foreground,
        Err(err) => {
            tracing::warn!(
                "{} segmentation failed ({}), keeping the full frame",
                segmenter.name(),
                err
            );
            original.opaque()
        }
    };

    SegmentationResult::from_parts(foreground, original)
}

fn apply_cutout(original: &Raster, cutout: Cutout) -> Result<Raster, SegmentationError> {
    let (width, height) = original.dimensions();
    match cutout {
        Cutout::Mask(mask) => {
            let mask = preprocess::fit_mask(&mask, width, height).ok_or(
                SegmentationError::Dimensions {
                    expected: (width, height),
                    actual: mask.dimensions(),
                },
            )?;
            composite::build_foreground(original, &mask)
                .map_err(|err| SegmentationError::Internal(err.to_string()))
        }
        Cutout::Matted(matted) if matted.dimensions() == (width, height) => Ok(matted),
        Cutout::Matted(matted) => Err(SegmentationError::Dimensions {
            expected: (width, height),
            actual: matted.dimensions(),
        }),
    }
}
