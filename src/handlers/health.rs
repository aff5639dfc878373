//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! trimmer statistics and the state of both deferred tasks as plain text.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use bgtrim::{TimerState, TrimmerSnapshot};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str =
    "bgtrim: alarm-aware background process trimmer. Control: POST /start, POST /stop";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let snapshot = state.trimmer.snapshot();
    let message = if state.config.dry_run.unwrap_or(false) {
        "OK (dry run)"
    } else {
        "OK"
    };

    let uptime_str = format_uptime(state.start_time.elapsed().as_secs());
    let table = state.stats.render_table();
    let timers = render_timers(&snapshot);

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\nUptime: {uptime_str}\n\n{timers}\n{table}\n{FOOTER_TEXT}"),
    )
}

pub fn format_uptime(uptime_seconds: u64) -> String {
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    }
}

fn describe(timer: &TimerState) -> String {
    match timer {
        TimerState::Unarmed => "unarmed".to_string(),
        TimerState::Armed { delay_ms, due_at } => format!(
            "armed, {} ms, due {}",
            delay_ms,
            due_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        TimerState::Fired { at } => format!("fired at {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
    }
}

/// Renders both deferred tasks and the last plan as a plain-text block.
fn render_timers(snapshot: &TrimmerSnapshot) -> String {
    let mut out = String::new();
    writeln!(out, "TIMERS").ok();
    writeln!(out, "======").ok();
    writeln!(out).ok();
    writeln!(out, "{:12} : {}", "sweep task", describe(&snapshot.sweep_task)).ok();
    writeln!(out, "{:12} : {}", "cancel task", describe(&snapshot.cancel_task)).ok();

    if let Some(plan) = &snapshot.last_plan {
        writeln!(out).ok();
        let alarm = if plan.time_until_alarm_ms == 0 {
            "none".to_string()
        } else {
            format!("in {} ms", plan.time_until_alarm_ms)
        };
        writeln!(out, "{:12} : {}", "next alarm", alarm).ok();
        writeln!(out, "{:12} : {}", "sleep mode", plan.sleep_mode).ok();
    }
    out
}
