//! Fetch pipeline types and error definitions.

use thiserror::Error;

/// Content types the proxy will accept from an origin server.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

/// Check a declared content type (parameters already stripped) against the
/// allowlist.
pub fn is_allowed_content_type(content_type: &str) -> bool {
    ALLOWED_CONTENT_TYPES.contains(&content_type)
}

/// Whether a request was answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Header value for the `X-Cache` diagnostic.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Errors that can occur while fetching an image from an origin server.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection or transport failure before a response arrived.
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    /// The fetch exceeded the hard timeout.
    #[error("Upstream timed out after {0} seconds")]
    Timeout(u64),

    /// The origin answered with a non-2xx status.
    #[error("Upstream returned status {0}")]
    UpstreamStatus(u16),

    /// The declared content type is not an allowed image type.
    #[error("Invalid content type: {0:?}")]
    InvalidContentType(String),

    /// Declared or actual payload size exceeded the ceiling.
    #[error("Image too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },
}

impl FetchError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Unreachable(_) => "unreachable",
            FetchError::Timeout(_) => "timeout",
            FetchError::UpstreamStatus(_) => "upstream_status",
            FetchError::InvalidContentType(_) => "invalid_content_type",
            FetchError::PayloadTooLarge { .. } => "payload_too_large",
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowlist_membership() {
        assert!(is_allowed_content_type("image/png"));
        assert!(is_allowed_content_type("image/svg+xml"));
        assert!(!is_allowed_content_type("text/html"));
        assert!(!is_allowed_content_type("application/octet-stream"));
        // Matching is exact; parameters must be stripped by the caller
        assert!(!is_allowed_content_type("image/png; charset=utf-8"));
    }

    #[test]
    fn test_error_display() {
        let err = FetchError::Timeout(10);
        assert_eq!(err.to_string(), "Upstream timed out after 10 seconds");

        let err = FetchError::InvalidContentType("text/html".into());
        assert!(err.to_string().contains("Invalid content type"));

        let err = FetchError::PayloadTooLarge {
            size: 11_000_000,
            limit: 10_485_760,
        };
        assert!(err.to_string().contains("11000000"));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_cache_status_header_values() {
        assert_eq!(CacheStatus::Hit.as_str(), "HIT");
        assert_eq!(CacheStatus::Miss.as_str(), "MISS");
    }
}
