//! Startup requirement validation for bgtrim.
//!
//! This module checks that the daemon can see the processes it is meant to
//! sweep and may signal them before the trimmer is armed.

use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::Config;

/// Validate all runtime requirements
pub fn validate_requirements(cfg: &Config) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    let proc_root = cfg
        .proc_root
        .as_deref()
        .unwrap_or_else(|| Path::new(bgtrim::process::PROC_ROOT));
    check_proc_access(proc_root)?;
    check_signal_permission(cfg.effective_target_uid(), cfg.dry_run.unwrap_or(false))?;

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check that the proc root is readable.
fn check_proc_access(proc_root: &Path) -> Result<(), ValidationError> {
    match fs::read_dir(proc_root) {
        Ok(_) => {
            info!("✅ {} is readable", proc_root.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!("❌ {} not found", proc_root.display());
            Err(ValidationError::ProcNotFound(proc_root.display().to_string()))
        }
        Err(e) => {
            error!("❌ Cannot read {}: {}", proc_root.display(), e);
            Err(ValidationError::InsufficientPermissions(e.to_string()))
        }
    }
}

/// Signalling another user's processes needs root or CAP_KILL.
fn check_signal_permission(target_uid: u32, dry_run: bool) -> Result<(), ValidationError> {
    let euid = geteuid();
    if euid.as_raw() == target_uid || euid.is_root() {
        info!("✅ May signal processes of uid {}", target_uid);
        return Ok(());
    }
    if dry_run {
        warn!(
            "⚠️  Running as uid {} but targeting uid {}; fine for a dry run only",
            euid, target_uid
        );
        return Ok(());
    }
    error!(
        "❌ Running as uid {} cannot signal processes of uid {}",
        euid, target_uid
    );
    error!("   Solutions:");
    error!("   1. Run bgtrim as the target user (e.g. a systemd user service)");
    error!("   2. Grant capabilities: setcap cap_kill+ep /path/to/bgtrim");
    Err(ValidationError::CannotSignal {
        euid: euid.as_raw(),
        target_uid,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("proc filesystem not found at {0}")]
    ProcNotFound(String),

    #[error("uid {euid} may not signal processes of uid {target_uid}")]
    CannotSignal { euid: u32, target_uid: u32 },
}
