//! `POST /start` and `POST /stop`: the screen-off and screen-on triggers.
//!
//! Both only enqueue a command on the trimmer worker and answer `202 Accepted`.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, instrument};

use crate::state::SharedState;

#[instrument(skip(state))]
pub async fn start_handler(State(state): State<SharedState>) -> impl IntoResponse {
    info!("start requested over HTTP");
    state.trimmer.start();
    (StatusCode::ACCEPTED, "start queued\n")
}

#[instrument(skip(state))]
pub async fn stop_handler(State(state): State<SharedState>) -> impl IntoResponse {
    info!("stop requested over HTTP");
    state.trimmer.stop();
    (StatusCode::ACCEPTED, "stop queued\n")
}
