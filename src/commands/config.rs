//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("bgtrim.yaml"));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# bgtrim Configuration
# =====================
#
# Server Configuration
# --------------------
# bind: "127.0.0.1"            # Bind IP for the status/control server
# port: 9287                   # HTTP port
# enable_http: true            # Serve /, /health, /status, /metrics, /start, /stop
#
# Trimmer Behaviour
# -----------------
# start_on_launch: true        # Arm the trimmer as soon as the daemon starts
# dry_run: false               # Log instead of signalling processes
# signal: "TERM"               # Signal sent to swept processes (name or number)
# target_uid: null             # Uid whose processes are swept (null = effective uid)
# allow_root_target: false     # Required to sweep uid 0
# max_processes: null          # Scan at most N /proc entries
# proc_root: null              # Alternative proc filesystem root
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# Collaborator Sources
# --------------------
# settings_file: null          # Holds sleep_mode_enabled (null = ~/.config/bgtrim/settings.yaml)
# alarm_file: null             # Extra alarms, re-read on every start
# alarms:                      # Inline alarms
#   - id: wake
#     kind: daily              # daily or once
#     time: "07:00"            # local time for daily alarms
#     days: [Mon, Tue, Wed, Thu, Fri]   # empty = every day
#   - kind: once
#     at: "2026-12-24T06:30:00+01:00"
#
# Protection Rules
# ----------------
# Always protected: "android", "com.android.*", anything containing
# "launcher" or "ims". Extra rules:
# protected:
#   names: []                  # exact package names
#   prefixes: []               # name prefixes
#   substrings: []             # substrings
#
# Timings (milliseconds)
# ----------------------
# timings:
#   immediate_delay_ms: 100        # sweep delay in sleep mode or before an early alarm
#   idle_delay_ms: 3600000         # sweep delay otherwise
#   imminent_threshold_ms: 3600000 # alarms closer than this sweep immediately
#   cancel_lead_ms: 900000         # cancel pending work this long before an alarm
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use std::path::Path;

    #[test]
    fn test_commented_yaml_still_parses() {
        let yaml = render_config(&Config::default(), &ConfigFormat::Yaml).unwrap();
        let commented = add_config_comments(yaml);
        let cfg = parse_config(&commented, Path::new("bgtrim.yaml")).unwrap();
        assert_eq!(cfg.port, Config::default().port);
    }

    #[test]
    fn test_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.toml");
        command_config(Some(path.clone()), ConfigFormat::Toml, false).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let cfg = parse_config(&content, &path).unwrap();
        assert_eq!(cfg.signal.as_deref(), Some("TERM"));
    }
}
