//! bgtrim - alarm-aware background process trimmer daemon.
//!
//! Arms the trimmer on launch (or on `POST /start` / SIGUSR1), disarms it on
//! `POST /stop` / SIGUSR2, and serves status and Prometheus metrics over HTTP.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod startup_checks;
mod state;
mod wiring;

use anyhow::{anyhow, Context};
use axum::{
    routing::{get, post},
    Router,
};
use bgtrim::{SweepStats, Trimmer};
use clap::Parser;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_plan, command_protected, command_sweep};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT,
};
use handlers::{
    health_handler, metrics_handler, root_handler, start_handler, status_handler, stop_handler,
};
use metrics::TrimmerMetrics;
use state::{AppState, SharedState};

/// Effective log level: CLI, then config file, then info.
fn resolve_log_level(config: &Config, args: &Args) -> Option<Level> {
    let level = args.log_level.clone().or_else(|| {
        config
            .log_level
            .as_deref()
            .and_then(|s| <LogLevel as clap::ValueEnum>::from_str(s, true).ok())
    });
    match level.unwrap_or(LogLevel::Info) {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    }
}

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config, args: &Args) {
    let Some(log_level) = resolve_log_level(config, args) else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {}", log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Spawns the trimmer and assembles the shared state.
fn build_state(config: Config) -> anyhow::Result<SharedState> {
    let stats = Arc::new(SweepStats::new());
    let collaborators = wiring::collaborators(&config, Arc::clone(&stats))
        .map_err(|e| anyhow!("Failed to set up trimmer collaborators: {}", e))?;

    let trimmer = Trimmer::spawn(
        collaborators,
        config.protected.clone(),
        config.timings.to_timings(),
        Arc::clone(&stats),
    );

    let registry = Registry::new();
    let metrics = TrimmerMetrics::new(&registry).context("Failed to register metrics")?;

    Ok(Arc::new(AppState {
        registry,
        metrics,
        trimmer,
        stats,
        config: Arc::new(config),
        start_time: Instant::now(),
    }))
}

/// Maps SIGUSR1 to start() and SIGUSR2 to stop() until SIGINT/SIGTERM arrives.
async fn signal_loop(state: SharedState) -> anyhow::Result<()> {
    let mut usr1 =
        signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;
    let mut usr2 =
        signal(SignalKind::user_defined2()).context("Failed to install SIGUSR2 handler")?;
    let mut term = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut int = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    loop {
        tokio::select! {
            _ = usr1.recv() => {
                info!("Received SIGUSR1, starting trimmer");
                state.trimmer.start();
            }
            _ = usr2.recv() => {
                info!("Received SIGUSR2, stopping trimmer");
                state.trimmer.stop();
            }
            _ = int.recv() => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
                return Ok(());
            }
            _ = term.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
                return Ok(());
            }
        }
    }
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    if let Err(e) = startup_checks::validate_requirements(&config) {
        error!("Startup requirements not met: {}", e);
        return Err(e.into());
    }

    let enable_http = config.enable_http.unwrap_or(true);
    let start_on_launch = config.start_on_launch.unwrap_or(true);
    let bind_ip_str = config
        .bind
        .clone()
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let port = config.port.unwrap_or(DEFAULT_PORT);

    info!(
        target_uid = config.effective_target_uid(),
        dry_run = config.dry_run.unwrap_or(false),
        signal = config.signal.as_deref().unwrap_or(config::DEFAULT_SIGNAL_NAME),
        extra_rules = !config.protected.is_empty(),
        "bgtrim v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let state = build_state(config)?;
    if start_on_launch {
        state.trimmer.start();
    }

    if enable_http {
        let addr: SocketAddr = format!("{}:{}", bind_ip_str, port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", bind_ip_str, port))?;

        let app = Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .route("/metrics", get(metrics_handler))
            .route("/start", post(start_handler))
            .route("/stop", post(stop_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("bgtrim listening on http://{}:{}", bind_ip_str, port);

        let server = axum::serve(listener, app);
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            result = signal_loop(state.clone()) => result?,
        }
    } else {
        info!("HTTP server disabled, control via SIGUSR1/SIGUSR2");
        signal_loop(state.clone()).await?;
    }

    match Arc::try_unwrap(state) {
        Ok(state) => state.trimmer.shutdown().await,
        // Open connections still hold the state; the runtime drops them on exit.
        Err(state) => {
            warn!("HTTP connections still open, stopping trimmer without waiting");
            state.trimmer.stop();
        }
    }

    info!("bgtrim stopped gracefully");
    Ok(())
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    if let Some(command) = &args.command {
        // Generating a config file does not need a valid one
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return command_config(output.clone(), format.clone(), *commented);
        }

        let config = resolve_config(&args)?;
        setup_logging(&config, &args);

        return match command {
            Commands::Check => command_check(&config),
            Commands::Protected { names } => command_protected(&config.protected, names),
            Commands::Plan { format } => {
                let config = load_validated_config(&args)?;
                command_plan(&config, format.clone())
            }
            Commands::Sweep { execute, verbose } => {
                let config = load_validated_config(&args)?;
                command_sweep(&config, *execute, *verbose)
            }
            Commands::Config { .. } => Ok(()),
        };
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config, &args);

    run_daemon(config).await?;
    Ok(())
}
