//! Configuration management for bgtrim.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use bgtrim::{parse_entries, AlarmEntry, ProtectionPolicy, TrimmerTimings};
use nix::unistd::geteuid;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::cli::{Args, ConfigFormat};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9287;
pub const DEFAULT_SIGNAL_NAME: &str = "TERM";
/// Upper bound for every configured timing (30 days).
pub const MAX_TIMING_MS: u64 = 30 * 24 * 3_600_000;

/// Trimmer timing overrides in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_immediate_delay_ms", alias = "immediate-delay-ms")]
    pub immediate_delay_ms: u64,
    #[serde(default = "default_idle_delay_ms", alias = "idle-delay-ms")]
    pub idle_delay_ms: u64,
    #[serde(default = "default_imminent_threshold_ms", alias = "imminent-threshold-ms")]
    pub imminent_threshold_ms: u64,
    #[serde(default = "default_cancel_lead_ms", alias = "cancel-lead-ms")]
    pub cancel_lead_ms: u64,
}

fn default_immediate_delay_ms() -> u64 {
    100
}
fn default_idle_delay_ms() -> u64 {
    3_600_000
}
fn default_imminent_threshold_ms() -> u64 {
    3_600_000
}
fn default_cancel_lead_ms() -> u64 {
    900_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            immediate_delay_ms: default_immediate_delay_ms(),
            idle_delay_ms: default_idle_delay_ms(),
            imminent_threshold_ms: default_imminent_threshold_ms(),
            cancel_lead_ms: default_cancel_lead_ms(),
        }
    }
}

impl TimingConfig {
    pub fn to_timings(&self) -> TrimmerTimings {
        TrimmerTimings {
            immediate_delay: Duration::from_millis(self.immediate_delay_ms),
            idle_delay: Duration::from_millis(self.idle_delay_ms),
            imminent_threshold: Duration::from_millis(self.imminent_threshold_ms),
            cancel_lead: Duration::from_millis(self.cancel_lead_ms),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,
    #[serde(alias = "enable-http")]
    pub enable_http: Option<bool>,

    // Trimmer behaviour
    #[serde(alias = "start-on-launch")]
    pub start_on_launch: Option<bool>,
    #[serde(alias = "dry-run")]
    pub dry_run: Option<bool>,
    pub signal: Option<String>,
    /// Only sweep processes owned by this uid; defaults to the effective uid.
    #[serde(alias = "target-uid")]
    pub target_uid: Option<u32>,
    /// Allow sweeping root-owned processes.
    #[serde(alias = "allow-root-target")]
    pub allow_root_target: Option<bool>,
    #[serde(alias = "max-processes")]
    pub max_processes: Option<usize>,
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,

    // Logging
    pub log_level: Option<String>,

    // Collaborator sources
    #[serde(alias = "settings-file")]
    pub settings_file: Option<PathBuf>,
    #[serde(alias = "alarm-file")]
    pub alarm_file: Option<PathBuf>,
    #[serde(default)]
    pub alarms: Vec<AlarmEntry>,

    // Extra protection rules on top of the fixed ones
    #[serde(default)]
    pub protected: ProtectionPolicy,

    #[serde(default)]
    pub timings: TimingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            enable_http: Some(true),
            start_on_launch: Some(true),
            dry_run: Some(false),
            signal: Some(DEFAULT_SIGNAL_NAME.to_string()),
            target_uid: None,
            allow_root_target: Some(false),
            max_processes: None,
            proc_root: None,
            log_level: Some("info".into()),
            settings_file: None,
            alarm_file: None,
            alarms: Vec::new(),
            protected: ProtectionPolicy::default(),
            timings: TimingConfig::default(),
        }
    }
}

impl Config {
    /// Uid whose processes get swept.
    pub fn effective_target_uid(&self) -> u32 {
        self.target_uid.unwrap_or_else(|| geteuid().as_raw())
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(signal) = cfg.signal.as_deref() {
        bgtrim::parse_signal(signal)?;
    }

    let t = &cfg.timings;
    if t.immediate_delay_ms == 0 {
        return Err("timings.immediate_delay_ms must be greater than 0".into());
    }
    if t.idle_delay_ms == 0 {
        return Err("timings.idle_delay_ms must be greater than 0".into());
    }
    if t.imminent_threshold_ms == 0 {
        return Err("timings.imminent_threshold_ms must be greater than 0".into());
    }
    for (name, value) in [
        ("immediate_delay_ms", t.immediate_delay_ms),
        ("idle_delay_ms", t.idle_delay_ms),
        ("imminent_threshold_ms", t.imminent_threshold_ms),
        ("cancel_lead_ms", t.cancel_lead_ms),
    ] {
        if value > MAX_TIMING_MS {
            return Err(format!(
                "timings.{} must not exceed {} ms (30 days), got {}",
                name, MAX_TIMING_MS, value
            )
            .into());
        }
    }
    if t.immediate_delay_ms > t.idle_delay_ms {
        return Err("timings.immediate_delay_ms must not exceed timings.idle_delay_ms".into());
    }

    if cfg.effective_target_uid() == 0 && !cfg.allow_root_target.unwrap_or(false) {
        return Err("target uid resolves to root (0); set target_uid to a regular user \
            or allow_root_target: true"
            .into());
    }

    if cfg.max_processes == Some(0) {
        return Err("max_processes must be greater than 0 when set".into());
    }

    if cfg.enable_http.unwrap_or(true) {
        let bind = cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    parse_entries(&cfg.alarms)?;

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if args.disable_http {
        config.enable_http = Some(false);
    }
    if args.no_start_on_launch {
        config.start_on_launch = Some(false);
    }
    if args.dry_run {
        config.dry_run = Some(true);
    }
    if let Some(signal) = &args.signal {
        config.signal = Some(signal.clone());
    }
    if args.target_uid.is_some() {
        config.target_uid = args.target_uid;
    }
    if let Some(path) = &args.settings_file {
        config.settings_file = Some(path.clone());
    }
    if let Some(path) = &args.alarm_file {
        config.alarm_file = Some(path.clone());
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            let defaults = [
                "/etc/bgtrim/bgtrim.yaml",
                "/etc/bgtrim/bgtrim.yml",
                "/etc/bgtrim/bgtrim.json",
                "./bgtrim.yaml",
                "./bgtrim.yml",
                "./bgtrim.json",
            ];
            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, &path)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config text; the format follows the file extension (YAML default).
pub fn parse_config(content: &str, path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Renders a config in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}
