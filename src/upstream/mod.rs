//! Upstream fetch pipeline.
//!
//! # Data Flow
//! ```text
//! target URL
//!     → cache lookup (hit → return, no network)
//!     → single GET with timeout + user agent
//!     → status check (non-2xx → error, never passed through)
//!     → content-type allowlist
//!     → size ceiling (declared header, then actual bytes)
//!     → cache store
//! ```

pub mod client;
pub mod types;

pub use client::ImageFetcher;
pub use types::{CacheStatus, FetchError};
