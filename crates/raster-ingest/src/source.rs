//! Fetching raw container bytes from local paths and HTTP endpoints.
//!
//! Fetchers only move bytes. Every payload, including an HTTP 200 body,
//! still goes through [`FormatValidator`](crate::format::FormatValidator)
//! before decoding.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use heatmap_common::{SourceError, SourceLocator};
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::config::IngestConfig;

/// Retrieves the bytes behind a [`SourceLocator`].
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, locator: &SourceLocator) -> Result<Bytes, SourceError>;
}

/// Reads local files.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher;

impl FileFetcher {
    pub async fn read(&self, path: &Path) -> Result<Bytes, SourceError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| SourceError::unavailable(path.display().to_string(), e.to_string()))?;
        debug!(path = %path.display(), bytes = data.len(), "Read local raster");
        Ok(Bytes::from(data))
    }
}

#[async_trait]
impl SourceFetcher for FileFetcher {
    async fn fetch(&self, locator: &SourceLocator) -> Result<Bytes, SourceError> {
        match locator {
            SourceLocator::Path(path) => self.read(path).await,
            SourceLocator::Url(url) => Err(SourceError::unavailable(
                url.clone(),
                "file fetcher cannot read remote locators",
            )),
        }
    }
}

/// Single GET per fetch, bounded by a request timeout. No retries.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(30)))
            .build()
            .map_err(|e| SourceError::unavailable("http client", e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self, SourceError> {
        Self::new(config.http_timeout())
    }

    /// Share an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, url: &str) -> Result<Bytes, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Source returned an error status");
            return Err(SourceError::HttpStatus {
                locator: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| request_error(url, e))?;
        debug!(bytes = body.len(), "Fetched remote raster");
        Ok(body)
    }
}

fn request_error(url: &str, error: reqwest::Error) -> SourceError {
    if error.is_timeout() {
        SourceError::Timeout {
            locator: url.to_string(),
        }
    } else {
        SourceError::unavailable(url, error.to_string())
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, locator: &SourceLocator) -> Result<Bytes, SourceError> {
        match locator {
            SourceLocator::Url(url) => self.get(url).await,
            SourceLocator::Path(path) => Err(SourceError::unavailable(
                path.display().to_string(),
                "http fetcher cannot read local paths",
            )),
        }
    }
}

/// Dispatches on the locator kind.
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    file: FileFetcher,
    http: HttpFetcher,
}

impl DefaultFetcher {
    pub fn new(config: &IngestConfig) -> Result<Self, SourceError> {
        Ok(Self {
            file: FileFetcher,
            http: HttpFetcher::from_config(config)?,
        })
    }
}

#[async_trait]
impl SourceFetcher for DefaultFetcher {
    async fn fetch(&self, locator: &SourceLocator) -> Result<Bytes, SourceError> {
        if locator.is_remote() {
            self.http.fetch(locator).await
        } else {
            self.file.fetch(locator).await
        }
    }
}
