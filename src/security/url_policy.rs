//! Target URL admission policy.
//!
//! # Responsibilities
//! - Reject anything that is not an absolute http(s) URL
//! - Reject hostnames pointing at loopback and private networks
//!
//! The check is lexical: it inspects the hostname string as written, not a
//! DNS-resolved address. It is a defense-in-depth layer against SSRF, not a
//! complete guarantee; deployments needing stronger protection must pair it
//! with network-level egress controls.

use url::Url;

/// Hostname prefixes that resolve lexically into blocked address space.
///
/// `172.16.` covers only the first /16 of the 172.16.0.0/12 private block.
const BLOCKED_HOST_PREFIXES: &[&str] = &["127.", "10.", "172.16.", "192.168."];

/// Hostnames blocked by exact match.
const BLOCKED_HOSTS: &[&str] = &["localhost", "0.0.0.0"];

/// Check that a raw string parses as an absolute http(s) URL with a host.
///
/// Malformed input is treated as inadmissible; no error propagates.
pub fn is_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Check whether a raw URL string is admissible as a fetch target.
///
/// Combines [`is_http_url`] with the blocked-host policy.
pub fn is_allowed(raw: &str) -> bool {
    let parsed = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return false,
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    let host = match parsed.host_str() {
        Some(host) => host.to_ascii_lowercase(),
        None => return false,
    };

    if BLOCKED_HOSTS.contains(&host.as_str()) {
        return false;
    }

    if BLOCKED_HOST_PREFIXES.iter().any(|p| host.starts_with(p)) {
        return false;
    }

    true
}
