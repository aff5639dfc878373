//! CLI command implementations for bgtrim.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: System and configuration validation
//! - `config`: Configuration file generation
//! - `plan`: What start() would arm right now
//! - `sweep`: One-off sweep (dry run by default)
//! - `protected`: Protection rules and name tests

pub mod check;
pub mod config;
pub mod plan;
pub mod protected;
pub mod sweep;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use plan::command_plan;
pub use protected::command_protected;
pub use sweep::command_sweep;
