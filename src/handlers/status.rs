//! JSON status endpoint.

use axum::{extract::State, Json};
use bgtrim::{SweepStatsSnapshot, TrimmerSnapshot};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::state::SharedState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub dry_run: bool,
    pub target_uid: u32,
    pub trimmer: TrimmerSnapshot,
    pub stats: SweepStatsSnapshot,
    pub top_killed: Vec<(String, u64)>,
}

/// Handler for the /status endpoint.
#[instrument(skip(state))]
pub async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    debug!("Processing /status request");
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        dry_run: state.config.dry_run.unwrap_or(false),
        target_uid: state.config.effective_target_uid(),
        trimmer: state.trimmer.snapshot(),
        stats: state.stats.snapshot(),
        top_killed: state.stats.top_killed(10),
    })
}
