//! Content server access.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use tracing::debug;
use url::Url;

use fogwalker_core::{ContentEnvelope, ContentVariant, FogwalkerError, Result};

/// Raw delivery bytes as received from the server.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Where content panels get their content from.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Buffered fetch. Server-side failures arrive as an envelope with
    /// `success: false`; only transport failures are errors.
    async fn fetch(&self, variant: ContentVariant) -> Result<ContentEnvelope>;

    /// Opens a streaming delivery.
    async fn open_stream(&self, variant: ContentVariant) -> Result<ByteStream>;
}

/// Deadline for a buffered fetch.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP source against a content server.
#[derive(Clone)]
pub struct HttpContentSource {
    base_url: Url,
    http_client: Client,
    fetch_timeout: Duration,
}

impl HttpContentSource {
    /// Creates a source for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| FogwalkerError::Transport(format!("Invalid server URL {base_url}: {e}")))?;

        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FogwalkerError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            http_client,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        })
    }

    /// Sets the deadline for buffered fetches. Streams are bounded only by
    /// the connect timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn content_url(&self, variant: ContentVariant, stream: bool) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("content/{variant}"))
            .map_err(|e| FogwalkerError::Transport(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("stream", if stream { "true" } else { "false" });
        Ok(url)
    }
}

fn transport(e: reqwest::Error) -> FogwalkerError {
    if e.is_timeout() {
        FogwalkerError::Timeout(e.to_string())
    } else {
        FogwalkerError::Transport(e.to_string())
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch(&self, variant: ContentVariant) -> Result<ContentEnvelope> {
        let url = self.content_url(variant, false)?;
        debug!(%url, "Fetching content");

        let response = self
            .http_client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        serde_json::from_slice(&body).map_err(|e| {
            FogwalkerError::Transport(format!("Unexpected response (HTTP {status}): {e}"))
        })
    }

    async fn open_stream(&self, variant: ContentVariant) -> Result<ByteStream> {
        let url = self.content_url(variant, true)?;
        debug!(%url, "Opening content stream");

        let response = self.http_client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FogwalkerError::Transport(format!(
                "Stream request failed: HTTP {status}"
            )));
        }

        Ok(response.bytes_stream().map(|r| r.map_err(transport)).boxed())
    }
}
