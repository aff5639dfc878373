//! HTTP endpoint handlers for the daemon.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page
//! - `/health`: Plain-text statistics and timer state
//! - `/status`: JSON status
//! - `/metrics`: Prometheus metrics endpoint
//! - `/start`, `/stop`: Trimmer control (POST)

pub mod control;
pub mod health;
pub mod metrics;
pub mod root;
pub mod status;

// Re-export handlers
pub use control::{start_handler, stop_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
pub use status::status_handler;
