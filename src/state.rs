//! Application state management for the daemon.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and signal listeners.

use bgtrim::{SweepStats, Trimmer};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::metrics::TrimmerMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: TrimmerMetrics,
    pub trimmer: Trimmer,
    pub stats: Arc<SweepStats>,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
