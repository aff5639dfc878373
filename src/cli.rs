//! CLI arguments and subcommands for bgtrim.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "bgtrim",
    about = "Alarm-aware background process trimmer",
    long_about = "Alarm-aware background process trimmer.\n\n\
                  Sweeps the background processes of the active user: almost immediately \
                  in sleep mode or when the next alarm is less than an hour away, otherwise \
                  after an hour. Pending sweeps are cancelled 15 minutes before the next alarm.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (default: config file value, then info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Log what would be killed instead of signalling processes
    #[arg(long)]
    pub dry_run: bool,

    /// Signal sent to swept processes (e.g. TERM, KILL, 15)
    #[arg(long)]
    pub signal: Option<String>,

    /// Only sweep processes owned by this uid (default: effective uid)
    #[arg(long)]
    pub target_uid: Option<u32>,

    /// Settings file holding sleep_mode_enabled
    #[arg(long)]
    pub settings_file: Option<PathBuf>,

    /// Alarm file, re-read on every start
    #[arg(long)]
    pub alarm_file: Option<PathBuf>,

    /// Do not arm the trimmer when the daemon starts
    #[arg(long)]
    pub no_start_on_launch: bool,

    /// Disable the HTTP status/control server
    #[arg(long)]
    pub disable_http: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check,

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Show what start() would arm right now
    Plan {
        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Run one sweep now (dry run unless --execute)
    Sweep {
        /// Actually signal the processes
        #[arg(long)]
        execute: bool,

        /// Also list protected processes
        #[arg(long)]
        verbose: bool,
    },

    /// Show protection rules, optionally testing package names
    Protected {
        /// Package names to test against the rules
        names: Vec<String>,
    },
}
