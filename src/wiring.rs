//! Builds the trimmer's Linux collaborators from the effective config.

use bgtrim::{
    parse_entries, parse_signal, AlarmSchedule, Collaborators, FileSettingsStore, ProcScanner,
    SignalKiller, SweepStats, DEFAULT_SIGNAL,
};
use nix::sys::signal::Signal;
use std::sync::Arc;

use crate::config::Config;

pub fn alarm_schedule(cfg: &Config) -> Result<AlarmSchedule, Box<dyn std::error::Error>> {
    let alarms = parse_entries(&cfg.alarms)?;
    Ok(AlarmSchedule::new(alarms, cfg.alarm_file.clone()))
}

pub fn settings_store(cfg: &Config) -> FileSettingsStore {
    match &cfg.settings_file {
        Some(path) => FileSettingsStore::new(path.clone()),
        None => FileSettingsStore::for_current_user(),
    }
}

pub fn scanner(cfg: &Config) -> ProcScanner {
    let scanner = match &cfg.proc_root {
        Some(root) => ProcScanner::new(root.clone()),
        None => ProcScanner::default(),
    };
    scanner
        .with_target_uid(Some(cfg.effective_target_uid()))
        .with_max_processes(cfg.max_processes)
}

pub fn signal(cfg: &Config) -> Result<Signal, Box<dyn std::error::Error>> {
    Ok(match cfg.signal.as_deref() {
        Some(name) => parse_signal(name)?,
        None => DEFAULT_SIGNAL,
    })
}

pub fn killer(
    cfg: &Config,
    stats: Arc<SweepStats>,
    dry_run: bool,
) -> Result<SignalKiller, Box<dyn std::error::Error>> {
    Ok(SignalKiller::new(scanner(cfg), signal(cfg)?)
        .dry_run(dry_run)
        .with_stats(stats))
}

/// All four collaborators, honouring the configured dry-run flag.
pub fn collaborators(
    cfg: &Config,
    stats: Arc<SweepStats>,
) -> Result<Collaborators, Box<dyn std::error::Error>> {
    let dry_run = cfg.dry_run.unwrap_or(false);
    Ok(Collaborators {
        alarms: Arc::new(alarm_schedule(cfg)?),
        settings: Arc::new(settings_store(cfg)),
        processes: Arc::new(scanner(cfg)),
        killer: Arc::new(killer(cfg, stats, dry_run)?),
    })
}
