mod directory;

pub use directory::DirectorySink;

use anyhow::Result;
use parallax::{ParallaxLayers, Raster};

/// Trait for destinations of finished layers
pub trait LayerSink {
    /// Write both layers, plus a composite with `overlay` interposed when the
    /// sink renders one
    fn write_layers(&mut self, layers: &ParallaxLayers, overlay: Option<&Raster>) -> Result<()>;

    /// Viewport the composite is rendered at, if any
    fn viewport(&self) -> Option<(u32, u32)>;
}
