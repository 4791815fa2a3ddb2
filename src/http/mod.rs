//! HTTP serving subsystem.

pub mod request;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
