use super::local::LocalSegmenter;
use super::preprocess;
use super::types::{
    Cutout, MattingService, RemoteSegmentationError, SegmentationError, SubjectSegmenter,
};
use crate::codec::{self, DecodeError};
use crate::raster::Raster;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Background-removal service reached over HTTP.
///
/// Sends the image as the multipart file field `image_file` with `size=auto`
/// and the key in `X-Api-Key`; only an HTTP 200 counts as success. Cloning is
/// cheap and clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpMattingService {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpMattingService {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, RemoteSegmentationError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("parallax/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl MattingService for HttpMattingService {
    async fn remove_background(&self, image: Vec<u8>) -> Result<Vec<u8>, RemoteSegmentationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(RemoteSegmentationError::MissingCredential)?;

        let form = Form::new()
            .part("image_file", Part::bytes(image).file_name("image"))
            .text("size", "auto");

        tracing::debug!("POST {}", self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Api-Key", api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RemoteSegmentationError::Status(status.as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Segmenter backed by a [`MattingService`].
///
/// The service's answer becomes the foreground directly. When the call fails
/// and a fallback is set, the local heuristic answers instead.
#[derive(Debug, Clone)]
pub struct RemoteSegmenter<S> {
    service: S,
    timeout: Duration,
    fallback: Option<LocalSegmenter>,
}

impl<S: MattingService> RemoteSegmenter<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            timeout: DEFAULT_TIMEOUT,
            fallback: Some(LocalSegmenter::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set or clear the local fallback.
    pub fn with_fallback(mut self, fallback: Option<LocalSegmenter>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Ask the service for a matted version of `encoded`, sized like `original`.
    pub async fn fetch_matted(
        &self,
        original: &Raster,
        encoded: &[u8],
    ) -> Result<Raster, RemoteSegmentationError> {
        let response = tokio::time::timeout(
            self.timeout,
            self.service.remove_background(encoded.to_vec()),
        )
        .await
        .map_err(|_| RemoteSegmentationError::Timeout(self.timeout))??;

        tracing::debug!("Background-removal service returned {} bytes", response.len());

        let (width, height) = original.dimensions();
        let matted = tokio::task::spawn_blocking(move || {
            let raster = codec::decode(&response)?;
            Ok::<_, DecodeError>(preprocess::fit_to(raster, width, height)?)
        })
        .await??;

        Ok(matted)
    }
}

impl<S: MattingService> SubjectSegmenter for RemoteSegmenter<S> {
    async fn segment(&self, original: &Raster, encoded: &[u8]) -> Result<Cutout, SegmentationError> {
        match self.fetch_matted(original, encoded).await {
            Ok(matted) => Ok(Cutout::Matted(matted)),
            Err(err) => match &self.fallback {
                Some(local) => {
                    tracing::warn!("Remote segmentation failed ({}), using local heuristic", err);
                    local.segment(original, encoded).await
                }
                None => Err(err.into()),
            },
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
