//! Inbound request identity.
//!
//! # Responsibilities
//! - Generate a unique correlation ID per request (UUID v4)
//! - Derive the rate-limit client key from forwarding headers

use axum::http::HeaderMap;
use uuid::Uuid;

/// Bucket shared by every request with no identifying headers.
///
/// Behind a correctly configured reverse proxy the derived key is per-IP.
/// Behind a proxy that strips or never sets the forwarding headers, all
/// clients collapse into this one bucket and rate limiting degrades to a
/// shared global limit.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Generate a fresh correlation identifier.
pub fn request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Derive the client key used to bucket rate-limit state.
///
/// Prefers the first entry of `x-forwarded-for`, then `x-real-ip`, then
/// the shared [`UNKNOWN_CLIENT`] bucket. Values are taken as written; the
/// headers are spoofable by direct callers.
pub fn client_key(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    UNKNOWN_CLIENT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let h = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1, 10.0.0.2")]);
        assert_eq!(client_key(&h), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let h = headers(&[("x-real-ip", "198.51.100.9")]);
        assert_eq!(client_key(&h), "198.51.100.9");
    }

    #[test]
    fn test_forwarded_for_wins_over_real_ip() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("x-real-ip", "198.51.100.9"),
        ]);
        assert_eq!(client_key(&h), "203.0.113.7");
    }

    #[test]
    fn test_unknown_bucket_when_unidentified() {
        assert_eq!(client_key(&HeaderMap::new()), UNKNOWN_CLIENT);
        let h = headers(&[("x-forwarded-for", "  ")]);
        assert_eq!(client_key(&h), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(request_id(), request_id());
    }
}
