//! Signal-based [`ProcessKiller`].
//!
//! "Killing the background processes of a package" means sending a signal to
//! every background process of the target user whose primary package name
//! equals the requested one. Failures are logged and counted, never returned.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::platform::{ProcessEnumerator, ProcessKiller};
use crate::process::scanner::ProcScanner;
use crate::sweep_stats::SweepStats;

/// Signal sent when none is configured.
pub const DEFAULT_SIGNAL: Signal = Signal::SIGTERM;

#[derive(Debug, thiserror::Error)]
#[error("unknown signal '{0}', expected a name like TERM/SIGKILL or a number")]
pub struct InvalidSignal(pub String);

/// Parses `TERM`, `SIGTERM`, `sigterm` or `15`.
pub fn parse_signal(value: &str) -> Result<Signal, InvalidSignal> {
    let trimmed = value.trim();
    if let Ok(num) = trimmed.parse::<i32>() {
        return Signal::try_from(num).map_err(|_| InvalidSignal(value.to_string()));
    }
    let upper = trimmed.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    Signal::from_str(&name).map_err(|_| InvalidSignal(value.to_string()))
}

/// Sends a signal to the processes of a package.
pub struct SignalKiller {
    scanner: ProcScanner,
    signal: Signal,
    dry_run: bool,
    stats: Option<Arc<SweepStats>>,
}

impl SignalKiller {
    pub fn new(scanner: ProcScanner, signal: Signal) -> Self {
        Self {
            scanner,
            signal,
            dry_run: false,
            stats: None,
        }
    }

    /// Only log what would be signalled.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_stats(mut self, stats: Arc<SweepStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// PIDs whose primary package equals `package_name`.
    pub fn matching_pids(&self, package_name: &str) -> Vec<u32> {
        self.package_index().remove(package_name).unwrap_or_default()
    }

    /// Primary package to PIDs, from a single scan.
    pub fn package_index(&self) -> HashMap<String, Vec<u32>> {
        let mut index: HashMap<String, Vec<u32>> = HashMap::new();
        for process in self.scanner.list_running_processes() {
            let Some(package) = process.primary_package() else {
                continue;
            };
            index.entry(package.to_string()).or_default().push(process.pid);
        }
        index
    }

    fn signal_pids(&self, package_name: &str, pids: &[u32]) {
        if self.dry_run {
            info!(
                package_name,
                ?pids,
                signal = %self.signal,
                "Dry run: would signal background processes"
            );
            return;
        }
        for &pid in pids {
            self.deliver(pid, package_name);
        }
    }

    fn deliver(&self, pid: u32, package_name: &str) {
        let Ok(raw) = i32::try_from(pid) else {
            return;
        };
        match kill(Pid::from_raw(raw), self.signal) {
            Ok(()) => debug!(pid, package_name, signal = %self.signal, "Signal delivered"),
            // Exited between scan and signal.
            Err(Errno::ESRCH) => debug!(pid, package_name, "Process already gone"),
            Err(e) => {
                debug!(pid, package_name, "Failed to signal process: {}", e);
                if let Some(stats) = &self.stats {
                    stats.record_kill_failure();
                }
            }
        }
    }
}

impl ProcessKiller for SignalKiller {
    fn kill_background(&self, package_name: &str) {
        let pids = self.matching_pids(package_name);
        self.signal_pids(package_name, &pids);
    }

    fn kill_background_all(&self, package_names: &[&str]) {
        if package_names.is_empty() {
            return;
        }
        let index = self.package_index();
        let mut seen = HashSet::new();
        for &name in package_names {
            if !seen.insert(name) {
                continue;
            }
            if let Some(pids) = index.get(name) {
                self.signal_pids(name, pids);
            }
        }
    }
}
