//! Processing configuration.
//!
//! Everything a pipeline run needs is passed in explicitly through
//! [`ProcessingConfig`]; nothing is read from globals. The struct
//! deserializes from TOML with every field optional:
//!
//! ```toml
//! local_fallback = true
//! background_blur_radius = 20
//! preview_blur_radius = 4
//!
//! [remote]
//! endpoint = "https://api.remove.bg/v1.0/removebg"
//! api_key = "..."
//! timeout_secs = 20
//! ```

use crate::segmentation::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Upper bound on blur radii; kernels past this are slow without looking different.
pub const MAX_BLUR_RADIUS: u32 = 256;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Background-removal service; `None` means local segmentation only.
    pub remote: Option<RemoteConfig>,
    /// Use the local heuristic when the remote service fails.
    pub local_fallback: bool,
    /// Render the background with the cheaper preview radius.
    pub preview: bool,
    pub preview_blur_radius: u32,
    pub background_blur_radius: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            remote: None,
            local_fallback: true,
            preview: false,
            preview_blur_radius: 4,
            background_blur_radius: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProcessingConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ProcessingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, radius) in [
            ("preview_blur_radius", self.preview_blur_radius),
            ("background_blur_radius", self.background_blur_radius),
        ] {
            if radius > MAX_BLUR_RADIUS {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be at most {MAX_BLUR_RADIUS}, got {radius}"
                )));
            }
        }

        if let Some(remote) = &self.remote {
            if remote.endpoint.trim().is_empty() {
                return Err(ConfigError::Invalid("remote.endpoint is empty".into()));
            }
            if remote.timeout_secs == 0 {
                return Err(ConfigError::Invalid("remote.timeout_secs must be > 0".into()));
            }
        }

        Ok(())
    }

    /// Blur radius for the background layer of this run.
    pub fn effective_blur_radius(&self) -> u32 {
        if self.preview {
            self.preview_blur_radius
        } else {
            self.background_blur_radius
        }
    }
}
