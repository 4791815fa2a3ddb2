//! Response assembly.
//!
//! # Responsibilities
//! - Render the JSON error envelope used by every failure path
//! - Shape success responses with diagnostic headers
//!
//! Error bodies follow one envelope: `{error, requestId}` plus optional
//! fields (rate-limit metadata on 429, cache statistics on 500).

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;

use crate::cache::{CacheStats, CachedImage};
use crate::upstream::CacheStatus;

/// JSON error envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_stats: Option<CacheStats>,
}

/// Render a client error (missing parameter, invalid/blocked URL).
pub fn client_error(message: &str, request_id: &str) -> Response {
    envelope(StatusCode::BAD_REQUEST, ErrorBody {
        error: message.to_string(),
        request_id: request_id.to_string(),
        limit: None,
        window_seconds: None,
        cache_stats: None,
    })
}

/// Render a rate-limit denial with the active policy attached.
pub fn rate_limited(request_id: &str, limit: u32, window: Duration) -> Response {
    envelope(StatusCode::TOO_MANY_REQUESTS, ErrorBody {
        error: "Rate limit exceeded".to_string(),
        request_id: request_id.to_string(),
        limit: Some(limit),
        window_seconds: Some(window.as_secs()),
        cache_stats: None,
    })
}

/// Render an upstream/fetch failure with cache statistics for diagnosis.
pub fn fetch_failure(message: &str, request_id: &str, stats: CacheStats) -> Response {
    envelope(StatusCode::INTERNAL_SERVER_ERROR, ErrorBody {
        error: message.to_string(),
        request_id: request_id.to_string(),
        limit: None,
        window_seconds: None,
        cache_stats: Some(stats),
    })
}

fn envelope(status: StatusCode, body: ErrorBody) -> Response {
    let mut response = Json(body).into_response();
    *response.status_mut() = status;
    response
}

/// Shape a successful image response with diagnostic headers.
pub fn image(
    image: CachedImage,
    request_id: &str,
    cache_status: CacheStatus,
    elapsed: Duration,
    ttl: Duration,
) -> Response {
    let built = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, image.content_type.as_str())
        .header(header::CONTENT_LENGTH, image.size_bytes)
        .header(
            header::CACHE_CONTROL,
            format!("public, max-age={}", ttl.as_secs()),
        )
        .header("x-request-id", request_id)
        .header("x-cache", cache_status.as_str())
        .header("x-response-time", format!("{}ms", elapsed.as_millis()))
        .body(Body::from(image.payload));

    match built {
        Ok(response) => response,
        // Header values are validated upstream; this path would indicate a
        // programming error, not bad input.
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serialization_skips_absent_fields() {
        let body = ErrorBody {
            error: "Missing 'url' query parameter".into(),
            request_id: "rid-1".into(),
            limit: None,
            window_seconds: None,
            cache_stats: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "Missing 'url' query parameter");
        assert_eq!(json["requestId"], "rid-1");
        assert!(json.get("limit").is_none());
        assert!(json.get("cacheStats").is_none());
    }

    #[test]
    fn test_rate_limit_envelope_carries_policy() {
        let body = ErrorBody {
            error: "Rate limit exceeded".into(),
            request_id: "rid-2".into(),
            limit: Some(100),
            window_seconds: Some(60),
            cache_stats: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["limit"], 100);
        assert_eq!(json["windowSeconds"], 60);
    }
}
