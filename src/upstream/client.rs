//! Bounded, timed-out image fetching.
//!
//! # Responsibilities
//! - Consult the cache before any network activity
//! - Issue a single outbound GET with an identifying user agent
//! - Enforce the content-type allowlist and the payload size ceiling
//! - Populate the cache on success
//!
//! There is no retry loop: one inbound request maps to at most one upstream
//! attempt. Concurrent cache misses for the same URL each fetch
//! independently; the last writer wins.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;

use crate::cache::{CachedImage, ImageCache};
use crate::config::UpstreamConfig;
use crate::observability::metrics;
use crate::upstream::types::{is_allowed_content_type, CacheStatus, FetchError, FetchResult};

/// Cache-aware upstream image fetcher.
pub struct ImageFetcher {
    /// Shared HTTP client with timeout and user agent baked in.
    client: reqwest::Client,
    /// Cache consulted before and populated after each fetch.
    cache: Arc<ImageCache>,
    /// Payload size ceiling in bytes.
    max_payload_bytes: u64,
    /// Timeout in seconds, kept for error reporting.
    timeout_secs: u64,
}

impl ImageFetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: &UpstreamConfig, cache: Arc<ImageCache>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .expect("Failed to build upstream HTTP client");

        Self {
            client,
            cache,
            max_payload_bytes: config.max_payload_bytes,
            timeout_secs: config.timeout_secs,
        }
    }

    /// Fetch `url`, serving from the cache when possible.
    ///
    /// This is the sole producer of the cache-hit diagnostic: a `Hit` means
    /// no network activity happened for this request.
    pub async fn fetch(&self, url: &str) -> FetchResult<(CachedImage, CacheStatus)> {
        let key = ImageCache::key_for(url);

        if let Some(image) = self.cache.get(&key) {
            tracing::debug!(url = %url, size = image.size_bytes, "Cache hit");
            return Ok((image, CacheStatus::Hit));
        }

        let (payload, content_type) = self.fetch_from_origin(url).await.inspect_err(|e| {
            metrics::record_upstream_failure(e.kind());
        })?;

        let image = self.cache.insert(&key, payload, content_type);
        tracing::debug!(url = %url, size = image.size_bytes, "Cached upstream image");
        Ok((image, CacheStatus::Miss))
    }

    /// Perform the actual bounded upstream GET, returning the payload and
    /// its declared content type.
    async fn fetch_from_origin(&self, url: &str) -> FetchResult<(bytes::Bytes, String)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
            .unwrap_or_default();

        if !is_allowed_content_type(&content_type) {
            return Err(FetchError::InvalidContentType(content_type));
        }

        // Fail fast on the declared length before reading the body.
        if let Some(declared) = response.content_length() {
            if declared > self.max_payload_bytes {
                return Err(FetchError::PayloadTooLarge {
                    size: declared,
                    limit: self.max_payload_bytes,
                });
            }
        }

        // Re-check against the bytes actually read; the header may have
        // been absent or understated.
        let mut payload = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.classify_transport_error(e))?;
            let total = payload.len() as u64 + chunk.len() as u64;
            if total > self.max_payload_bytes {
                return Err(FetchError::PayloadTooLarge {
                    size: total,
                    limit: self.max_payload_bytes,
                });
            }
            payload.extend_from_slice(&chunk);
        }

        Ok((payload.freeze(), content_type))
    }

    fn classify_transport_error(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout_secs)
        } else {
            FetchError::Unreachable(error.to_string())
        }
    }
}
