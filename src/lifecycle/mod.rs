//! Process lifecycle: startup ordering and coordinated shutdown.
//!
//! Startup happens in `main.rs`: tracing, config, listener, metrics,
//! server — in that order. This module owns the other end.

pub mod shutdown;

pub use shutdown::{wait_for_shutdown, Shutdown};
