//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with the trimmer state and all available endpoints.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

fn timer_label(armed: bool) -> &'static str {
    if armed {
        "armed"
    } else {
        "idle"
    }
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let snapshot = state.trimmer.snapshot();
    let mode = if state.config.dry_run.unwrap_or(false) {
        "dry run"
    } else {
        "live"
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>bgtrim</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 800px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
        }}
        h1 {{ color: #333; border-bottom: 3px solid #2e7d32; padding-bottom: 15px; }}
        .info {{
            background: #e9ecef;
            padding: 15px;
            border-radius: 4px;
            display: flex;
            justify-content: space-around;
            flex-wrap: wrap;
        }}
        .info-item {{ margin: 10px; }}
        .info-label {{ font-weight: 600; color: #555; display: block; font-size: 0.9em; }}
        .info-value {{ font-size: 1.2em; color: #2e7d32; }}
        .endpoint-list {{ list-style: none; padding: 0; }}
        .endpoint-list li {{
            margin: 15px 0;
            padding: 12px;
            background: #f8f9fa;
            border-left: 4px solid #2e7d32;
        }}
        .endpoint-desc {{ color: #666; margin-top: 5px; }}
        .footer {{ margin-top: 40px; color: #666; font-size: 0.9em; text-align: center; }}
    </style>
</head>
<body>
<div class="container">
    <h1>bgtrim</h1>
    <p>Alarm-aware background process trimmer</p>

    <div class="info">
        <div class="info-item"><span class="info-label">Version</span><span class="info-value">{version}</span></div>
        <div class="info-item"><span class="info-label">Uptime</span><span class="info-value">{uptime}</span></div>
        <div class="info-item"><span class="info-label">Mode</span><span class="info-value">{mode}</span></div>
        <div class="info-item"><span class="info-label">Sweep task</span><span class="info-value">{sweep}</span></div>
        <div class="info-item"><span class="info-label">Cancel task</span><span class="info-value">{cancel}</span></div>
    </div>

    <h2>Available Endpoints</h2>
    <ul class="endpoint-list">
        <li><a href="/health">/health</a><div class="endpoint-desc">Trimmer statistics and timer state (text)</div></li>
        <li><a href="/status">/status</a><div class="endpoint-desc">Trimmer state and counters (JSON)</div></li>
        <li><a href="/metrics">/metrics</a><div class="endpoint-desc">Prometheus-compatible metrics endpoint</div></li>
        <li><code>POST /start</code><div class="endpoint-desc">Screen off: arm the sweep and cancel tasks</div></li>
        <li><code>POST /stop</code><div class="endpoint-desc">Screen on: disarm both tasks</div></li>
    </ul>

    <div class="footer"><p>{footer}</p></div>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        mode = mode,
        sweep = timer_label(snapshot.sweep_task.is_armed()),
        cancel = timer_label(snapshot.cancel_task.is_armed()),
        footer = FOOTER_TEXT
    );

    Html(html)
}
