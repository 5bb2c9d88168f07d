use super::LayerSink;
use anyhow::{Context, Result};
use parallax::segmentation::preprocess;
use parallax::viewport::{self, LayerOpacity};
use parallax::{codec, EncodeFormat, ParallaxLayers, Raster};
use std::path::{Path, PathBuf};

/// Writes layers as PNG files into a directory.
///
/// - `foreground.png`, `background.png` at the original size
/// - `composite.png` at the viewport size, when one is set
/// - `matte.png`, the foreground alpha as grayscale, when enabled
pub struct DirectorySink {
    dir: PathBuf,
    viewport: Option<(u32, u32)>,
    show_matte: bool,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P, viewport: Option<(u32, u32)>, show_matte: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tracing::info!("Writing layers to {}", dir.display());

        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        Ok(Self {
            dir,
            viewport,
            show_matte,
        })
    }

    fn write_png(&self, name: &str, raster: &Raster) -> Result<()> {
        let path = self.dir.join(name);
        let bytes = codec::encode(raster, EncodeFormat::Png)
            .with_context(|| format!("Failed to encode {}", name))?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl LayerSink for DirectorySink {
    fn write_layers(&mut self, layers: &ParallaxLayers, overlay: Option<&Raster>) -> Result<()> {
        self.write_png("foreground.png", layers.foreground())?;
        self.write_png("background.png", layers.background())?;

        if self.show_matte {
            let matte = preprocess::mask_to_raster(&layers.foreground().alpha_mask())
                .context("Failed to visualize matte")?;
            self.write_png("matte.png", &matte)?;
        }

        if let Some(size) = self.viewport {
            let scene = viewport::compose_scene(layers, overlay, size, LayerOpacity::default())
                .context("Viewport must be non-empty")?;
            let scene = Raster::from_image(scene).context("Viewport must be non-empty")?;
            self.write_png("composite.png", &scene)?;
        }

        Ok(())
    }

    fn viewport(&self) -> Option<(u32, u32)> {
        self.viewport
    }
}
