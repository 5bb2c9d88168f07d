mod output;
mod source;

use anyhow::{Context, Result};
use clap::Parser;
use output::{DirectorySink, LayerSink};
use parallax::{codec, ProcessingConfig, RemoteConfig, RenderPipeline};
use source::{FileSource, ImageSource};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Photograph to split into layers
    input: PathBuf,

    /// Directory the layer PNGs are written to
    #[arg(short, long, default_value = "parallax-out")]
    out: PathBuf,

    /// Viewport width for the composite preview
    #[arg(long, requires = "viewport_height")]
    viewport_width: Option<u32>,

    /// Viewport height for the composite preview
    #[arg(long, requires = "viewport_width")]
    viewport_height: Option<u32>,

    /// Image drawn between the background and foreground in the composite
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// TOML processing config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Background-removal service endpoint
    /// Setting this or an API key enables remote segmentation
    #[arg(long)]
    endpoint: Option<String>,

    /// Background-removal service API key
    #[arg(long, env = "PARALLAX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Fail over to a full-opacity foreground instead of the local heuristic
    #[arg(long)]
    no_fallback: bool,

    /// Use the cheaper preview blur radius
    #[arg(long)]
    preview: bool,

    /// Override the background blur radius
    #[arg(long)]
    blur_radius: Option<u32>,

    /// Also write the foreground matte as a grayscale image
    #[arg(long)]
    show_matte: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn viewport(&self) -> Option<(u32, u32)> {
        self.viewport_width.zip(self.viewport_height)
    }

    /// Config file (or defaults) with command-line overrides applied.
    fn processing_config(&self) -> Result<ProcessingConfig> {
        let mut config = match &self.config {
            Some(path) => ProcessingConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ProcessingConfig::default(),
        };

        if self.endpoint.is_some() || self.api_key.is_some() {
            let remote = config.remote.get_or_insert_with(RemoteConfig::default);
            if let Some(endpoint) = &self.endpoint {
                remote.endpoint = endpoint.clone();
            }
            if let Some(api_key) = &self.api_key {
                remote.api_key = Some(api_key.clone());
            }
        }
        if self.no_fallback {
            config.local_fallback = false;
        }
        if self.preview {
            config.preview = true;
        }
        if let Some(radius) = self.blur_radius {
            config.background_blur_radius = radius;
        }

        config.validate().context("Invalid processing config")?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Parallax starting");

    let config = args.processing_config()?;
    tracing::info!(
        "Background blur radius: {}{}",
        config.effective_blur_radius(),
        if config.preview { " (preview)" } else { "" }
    );

    let mut source = FileSource::new(&args.input);
    tracing::info!("Input: {}", source.describe());
    let bytes = source.read_image()?;

    let overlay = match &args.overlay {
        Some(path) => {
            let bytes = FileSource::new(path).read_image()?;
            let overlay = codec::decode(&bytes)
                .with_context(|| format!("Failed to decode overlay {}", path.display()))?;
            Some(overlay)
        }
        None => None,
    };

    let mut sink = DirectorySink::new(&args.out, args.viewport(), args.show_matte)
        .context("Failed to initialize output directory")?;
    if let Some((width, height)) = sink.viewport() {
        tracing::info!("Viewport: {}x{}", width, height);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling run");
                cancel.cancel();
            }
        }
    });

    let pipeline = RenderPipeline::new(config).with_cancellation(cancel);

    let mut states = pipeline.subscribe();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            tracing::debug!("State: {:?}", state);
            if state.is_terminal() {
                break;
            }
        }
    });

    let layers = pipeline.run(bytes).await.context("Failed to build layers")?;

    sink.write_layers(&layers, overlay.as_ref())
        .context("Failed to write layers")?;

    tracing::info!("Done");
    Ok(())
}
