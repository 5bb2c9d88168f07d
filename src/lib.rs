//! Parallax portrait layering.
//!
//! Splits a photograph into a matted foreground layer and a defocused
//! background layer so a host can interpose an overlay (a clock, a widget)
//! between them:
//!
//! ```text
//! bytes ──decode──▶ Raster ──segment──▶ foreground (alpha = mask)
//!                      └──────blur─────▶ background (opaque)
//! ```
//!
//! The presentation layer draws background → overlay → foreground, each
//! cover-fitted to its viewport with [`viewport::blit`].

pub mod blur;
pub mod codec;
pub mod composite;
pub mod config;
pub mod pipeline;
pub mod raster;
pub mod segmentation;
pub mod viewport;

pub use blur::{gaussian_blur, BlurKernel};
pub use codec::{decode, encode, DecodeError, EncodeError, EncodeFormat};
pub use composite::{build_background, build_foreground, CompositeError};
pub use config::{ConfigError, ProcessingConfig, RemoteConfig};
pub use pipeline::{ParallaxLayers, PipelineError, PipelineState, RenderPipeline};
pub use raster::{Mask, Raster, RasterError};
pub use segmentation::{
    Cutout, HttpMattingService, LocalSegmenter, MattingService, RemoteSegmentationError,
    RemoteSegmenter, SegmentationError, SegmentationResult, Segmenter, SubjectSegmenter,
};
pub use viewport::{blit, compose_scene, compute_transform, draw, LayerOpacity, ViewportTransform};
