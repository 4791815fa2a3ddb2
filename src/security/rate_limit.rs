//! Per-client fixed-window rate limiting.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
// tokio's Instant honors the paused test clock; outside a runtime it
// behaves like std::time::Instant.
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Counter state for one client key within the current window.
#[derive(Debug)]
struct WindowEntry {
    /// Admitted requests so far in this window.
    count: u32,
    /// Start of the next window; the counter resets once `now` passes it.
    reset_at: Instant,
}

/// Fixed-window request limiter keyed by client identifier.
///
/// Windows are fixed, not sliding: a new window starts only when the
/// previous one has fully elapsed. The check-then-increment in [`admit`]
/// is atomic per key because the dashmap entry guard holds the shard lock
/// for the duration of the update.
///
/// [`admit`]: RateLimiter::admit
pub struct RateLimiter {
    entries: DashMap<String, WindowEntry>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter from configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            limit: config.max_requests,
            window: Duration::from_secs(config.window_secs),
        }
    }

    /// Check and record one request for `client_key`.
    ///
    /// Returns `true` if the request is admitted. The counter never exceeds
    /// the configured limit while this returns `true`.
    pub fn admit(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(client_key.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                reset_at: now + self.window,
            });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }

        if entry.count < self.limit {
            entry.count += 1;
            true
        } else {
            false
        }
    }

    /// Configured per-window admission limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Configured window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of client keys currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }

    /// Remove entries whose window has already elapsed.
    ///
    /// Correctness does not depend on this; `admit` resets stale windows
    /// lazily. The sweep only bounds memory growth from one-off clients.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.reset_at);
        before - self.entries.len()
    }
}

/// Spawn the periodic sweeper for stale rate-limit entries.
///
/// Runs independently of request handling and exits on the shutdown signal.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so the initial sweep
        // happens one full interval after startup.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = limiter.sweep();
                    if removed > 0 {
                        tracing::debug!(
                            removed,
                            tracked = limiter.tracked_clients(),
                            "Swept stale rate-limit entries"
                        );
                    }
                    metrics::record_tracked_clients(limiter.tracked_clients());
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate-limit sweeper stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            max_requests,
            window_secs,
            sweep_interval_secs: 300,
        })
    }

    #[test]
    fn test_admits_up_to_limit_then_denies() {
        let rl = limiter(3, 60);
        assert!(rl.admit("1.2.3.4"));
        assert!(rl.admit("1.2.3.4"));
        assert!(rl.admit("1.2.3.4"));
        assert!(!rl.admit("1.2.3.4"));
        assert!(!rl.admit("1.2.3.4"));
    }

    #[test]
    fn test_keys_are_independent() {
        let rl = limiter(1, 60);
        assert!(rl.admit("1.2.3.4"));
        assert!(!rl.admit("1.2.3.4"));
        assert!(rl.admit("5.6.7.8"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_elapse() {
        let rl = limiter(2, 1);
        assert!(rl.admit("c"));
        assert!(rl.admit("c"));
        assert!(!rl.admit("c"));

        tokio::time::advance(Duration::from_millis(1100)).await;

        // Fresh window, fresh count
        assert!(rl.admit("c"));
        assert!(rl.admit("c"));
        assert!(!rl.admit("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_elapsed_windows() {
        let rl = limiter(5, 1);
        rl.admit("old");
        tokio::time::advance(Duration::from_millis(1100)).await;
        rl.admit("fresh");

        assert_eq!(rl.tracked_clients(), 2);
        let removed = rl.sweep();
        assert_eq!(removed, 1);
        assert_eq!(rl.tracked_clients(), 1);
    }
}
