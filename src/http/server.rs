//! HTTP server setup and the proxy request handler.
//!
//! # Responsibilities
//! - Create the Axum router and wire up middleware (CORS, tracing, timeout)
//! - Own the shared service objects (cache, limiter, fetcher) via AppState
//! - Orchestrate each request: rate limit → validate → fetch → respond
//! - Serve with graceful shutdown
//!
//! # Request state machine
//! ```text
//! OPTIONS preflight ──────────────▶ 204 + CORS headers (layer short-circuit)
//! GET ?url=...
//!   ├─ rate limit denied ─────────▶ 429 + limit/window metadata
//!   ├─ url missing/empty ─────────▶ 400 + envelope
//!   ├─ url blocked by policy ─────▶ 400 + envelope
//!   ├─ fetch failed ──────────────▶ 500 + envelope + cache stats
//!   └─ served ────────────────────▶ 200 + bytes + diagnostic headers
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::cache::ImageCache;
use crate::config::ProxyConfig;
use crate::http::{request, response};
use crate::lifecycle;
use crate::observability::metrics;
use crate::security::rate_limit::{spawn_sweeper, RateLimiter};
use crate::security::url_policy;
use crate::upstream::ImageFetcher;

/// Application state injected into handlers.
///
/// All shared mutable state lives here, constructed once at startup;
/// nothing is global.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ImageCache>,
    pub limiter: Arc<RateLimiter>,
    pub fetcher: Arc<ImageFetcher>,
    pub rate_limit_enabled: bool,
    pub allow_private_targets: bool,
}

/// HTTP server for the image proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        // Initialize service objects
        let cache = Arc::new(ImageCache::new(Duration::from_secs(config.cache.ttl_secs)));
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let fetcher = Arc::new(ImageFetcher::new(&config.upstream, cache.clone()));

        let state = AppState {
            cache,
            limiter: limiter.clone(),
            fetcher,
            rate_limit_enabled: config.rate_limit.enabled,
            allow_private_targets: config.security.allow_private_targets,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            limiter,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        // The outer timeout is a backstop above the upstream client's own
        // timeout, which fires first under normal operation.
        let backstop = Duration::from_secs(config.upstream.timeout_secs + 5);

        Router::new()
            .route("/", get(proxy_handler).options(preflight_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(backstop))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        // Spawn background reclamation of stale rate-limit entries
        if self.config.rate_limit.enabled {
            spawn_sweeper(
                self.limiter.clone(),
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                shutdown.resubscribe(),
            );
        }

        // Serve with graceful shutdown
        axum::serve(listener, self.router)
            .with_graceful_shutdown(lifecycle::wait_for_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Main proxy handler.
///
/// Extracts the client identity and target URL, applies rate limiting and
/// URL policy, then serves the image from cache or upstream.
async fn proxy_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    let request_id = request::request_id();
    let client = request::client_key(&headers);

    if state.rate_limit_enabled && !state.limiter.admit(&client) {
        tracing::warn!(request_id = %request_id, client = %client, "Rate limit exceeded");
        metrics::record_rate_limited("window_limit");
        metrics::record_request(429, "none", start_time);
        return response::rate_limited(&request_id, state.limiter.limit(), state.limiter.window());
    }

    let target = match params.get("url").map(|s| s.trim()) {
        Some(url) if !url.is_empty() => url,
        _ => {
            tracing::debug!(request_id = %request_id, "Missing target URL");
            metrics::record_request(400, "none", start_time);
            return response::client_error("Missing 'url' query parameter", &request_id);
        }
    };

    // With private targets allowed (test/dev), only well-formedness is
    // enforced; the blocked-host policy applies otherwise.
    let admissible = if state.allow_private_targets {
        url_policy::is_http_url(target)
    } else {
        url_policy::is_allowed(target)
    };
    if !admissible {
        tracing::warn!(request_id = %request_id, url = %target, "Blocked target URL");
        metrics::record_request(400, "none", start_time);
        return response::client_error("Invalid or blocked URL", &request_id);
    }

    match state.fetcher.fetch(target).await {
        Ok((image, cache_status)) => {
            let elapsed = start_time.elapsed();
            metrics::record_request(200, cache_status.as_str(), start_time);
            tracing::info!(
                request_id = %request_id,
                url = %target,
                cache = cache_status.as_str(),
                size = image.size_bytes,
                elapsed_ms = elapsed.as_millis() as u64,
                "Image served"
            );
            response::image(image, &request_id, cache_status, elapsed, state.cache.ttl())
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, url = %target, error = %e, "Fetch failed");
            metrics::record_request(500, "none", start_time);
            response::fetch_failure(&e.to_string(), &request_id, state.cache.stats())
        }
    }
}

/// Answer bare OPTIONS probes; the CORS layer attaches the header set and
/// intercepts real preflights before this runs.
async fn preflight_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}
