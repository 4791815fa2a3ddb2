//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the image proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream fetch settings (timeout, size ceiling, user agent).
    pub upstream: UpstreamConfig,

    /// In-memory image cache settings.
    pub cache: CacheConfig,

    /// Per-client rate limiting settings.
    pub rate_limit: RateLimitConfig,

    /// Security hardening settings.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Admit loopback and private-range targets. An escape hatch for tests
    /// and local development against a local origin; leave off in
    /// production.
    pub allow_private_targets: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allow_private_targets: false,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Hard timeout for the whole upstream request in seconds.
    pub timeout_secs: u64,

    /// Maximum accepted payload size in bytes. Enforced against the
    /// declared Content-Length and again against the bytes actually read.
    pub max_payload_bytes: u64,

    /// User-Agent header sent on outbound requests.
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_payload_bytes: 10 * 1024 * 1024, // 10MB
            user_agent: "image-proxy/0.1".to_string(),
        }
    }
}

/// Image cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live for cached images in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum admitted requests per client key per window.
    pub max_requests: u32,

    /// Fixed window duration in seconds.
    pub window_secs: u64,

    /// Interval between sweeps of stale client entries in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 60,
            sweep_interval_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let config = ProxyConfig::default();
        assert_eq!(config.upstream.timeout_secs, 10);
        assert_eq!(config.upstream.max_payload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.sweep_interval_secs, 300);
        assert!(!config.security.allow_private_targets);
    }

    #[test]
    fn test_minimal_toml_roundtrip() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [rate_limit]
            max_requests = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.rate_limit.max_requests, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.upstream.timeout_secs, 10);
    }
}
