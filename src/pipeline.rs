//! One decode → segment → composite run per input image.
//!
//! ```text
//! Idle ─▶ Decoding ─▶ Segmenting ─▶ Compositing ─▶ Ready
//!            └──────────────┴──────────────┴─────▶ Failed
//! ```
//!
//! Transitions only move forward and each pipeline runs once. Only an invalid
//! config, a decode failure or a broken worker ends in `Failed`; segmentation
//! problems are absorbed and the run still reaches `Ready` with a cruder cutout.
//!
//! CPU-heavy stages run on tokio's blocking pool so the host's event loop
//! keeps turning, and every stage boundary checks the cancellation token.

use crate::codec::{self, DecodeError};
use crate::composite;
use crate::config::{ConfigError, ProcessingConfig};
use crate::raster::Raster;
use crate::segmentation::{self, Segmenter, SubjectSegmenter};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Decoding,
    Segmenting,
    Compositing,
    Ready,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Ready | PipelineState::Failed)
    }

    /// Whether `next` is a legal step from `self`.
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Idle, Decoding) | (Decoding, Segmenting) | (Segmenting, Compositing) => true,
            (Compositing, Ready) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("{stage} stage failed: {message}")]
    Stage { stage: &'static str, message: String },
    #[error("pipeline run was cancelled")]
    Cancelled,
}

/// The two layers a finished run hands to the presentation layer.
///
/// Both share the original image's dimensions. They are read-only; a new
/// image needs a new run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallaxLayers {
    foreground: Raster,
    background: Raster,
}

impl ParallaxLayers {
    pub fn foreground(&self) -> &Raster {
        &self.foreground
    }

    pub fn background(&self) -> &Raster {
        &self.background
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.foreground.dimensions()
    }

    pub fn into_parts(self) -> (Raster, Raster) {
        (self.foreground, self.background)
    }
}

pub struct RenderPipeline<S = Segmenter> {
    segmenter: S,
    config: ProcessingConfig,
    state: watch::Sender<PipelineState>,
    cancel: CancellationToken,
}

impl RenderPipeline<Segmenter> {
    /// Pipeline whose segmenter is chosen by `config`.
    pub fn new(config: ProcessingConfig) -> Self {
        let segmenter = Segmenter::from_config(&config);
        Self::with_segmenter(config, segmenter)
    }
}

impl<S: SubjectSegmenter> RenderPipeline<S> {
    pub fn with_segmenter(config: ProcessingConfig, segmenter: S) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            segmenter,
            config,
            state,
            cancel: CancellationToken::new(),
        }
    }

    /// Abandon the run when `token` is cancelled, e.g. on widget teardown.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Watch state changes, e.g. to show a loading affordance until `Ready`.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Run the pipeline on `bytes`, consuming it.
    pub async fn run(self, bytes: Vec<u8>) -> Result<ParallaxLayers, PipelineError> {
        let started = Instant::now();
        tracing::info!(
            "Starting pipeline run: {} bytes, {} segmentation",
            bytes.len(),
            self.segmenter.name()
        );

        let result = self.execute(bytes.into()).await;

        match &result {
            Ok(layers) => {
                self.advance(PipelineState::Ready);
                let (width, height) = layers.dimensions();
                tracing::info!(
                    "Pipeline ready: {}x{} in {:.1}ms",
                    width,
                    height,
                    started.elapsed().as_secs_f64() * 1000.0
                );
            }
            Err(PipelineError::Cancelled) => {
                tracing::info!("Pipeline run cancelled in {:?} state", self.state());
            }
            Err(err) => {
                self.advance(PipelineState::Failed);
                tracing::error!("Pipeline run failed: {}", err);
            }
        }

        result
    }

    async fn execute(&self, bytes: Arc<[u8]>) -> Result<ParallaxLayers, PipelineError> {
        self.config.validate()?;

        self.advance(PipelineState::Decoding);
        let input = Arc::clone(&bytes);
        let original = self
            .blocking("decode", move || codec::decode(&input))
            .await??;
        tracing::info!(
            "Decoded {}x{} {:?} image",
            original.width(),
            original.height(),
            codec::guess_format(&bytes)
        );

        self.advance(PipelineState::Segmenting);
        let segmented = self
            .cancellable(segmentation::segment(&self.segmenter, original, &bytes))
            .await?;

        self.advance(PipelineState::Compositing);
        let radius = self.config.effective_blur_radius();
        let layers = self
            .blocking("composite", move || {
                let (foreground, backdrop) = segmented.into_layers();
                let background = composite::build_background(&backdrop, radius);
                ParallaxLayers {
                    foreground,
                    background,
                }
            })
            .await?;

        if layers.foreground.dimensions() != layers.background.dimensions() {
            return Err(PipelineError::Stage {
                stage: "composite",
                message: "layer dimensions differ".into(),
            });
        }

        Ok(layers)
    }

    fn advance(&self, next: PipelineState) {
        let moved = self.state.send_if_modified(|state| {
            if state.can_advance_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });

        if moved {
            tracing::debug!("Pipeline state: {:?}", next);
        } else {
            tracing::debug!("Ignoring pipeline transition to {:?} from {:?}", next, self.state());
        }
    }

    /// Await `future` unless the run is cancelled first.
    async fn cancellable<F: Future>(&self, future: F) -> Result<F::Output, PipelineError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PipelineError::Cancelled),
            output = future => Ok(output),
        }
    }

    /// Run `work` on the blocking pool. A cancelled run drops the result.
    async fn blocking<T, F>(&self, stage: &'static str, work: F) -> Result<T, PipelineError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::task::spawn_blocking(move || {
            let _span = tracing::debug_span!("blocking", stage).entered();
            work()
        });

        self.cancellable(task)
            .await?
            .map_err(|err| PipelineError::Stage {
                stage,
                message: err.to_string(),
            })
    }
}
