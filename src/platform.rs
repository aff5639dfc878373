//! Collaborator interfaces consumed by the trimmer.
//!
//! The trimmer never talks to the operating system directly. It reads the
//! next alarm and the sleep flag, enumerates processes and asks for them to
//! be killed through these traits, so tests can substitute in-memory fakes
//! and the daemon can plug in the `/proc` based implementations.

use chrono::{DateTime, Utc};

/// Settings key holding the user-controlled sleep mode flag.
pub const SLEEP_MODE_KEY: &str = "sleep_mode_enabled";

/// Source of the next scheduled wake alarm.
pub trait AlarmSource: Send + Sync {
    /// Trigger time of the next alarm clock, if any is scheduled.
    fn next_alarm_trigger_time(&self) -> Option<DateTime<Utc>>;
}

/// Per-user configuration store.
pub trait SettingsStore: Send + Sync {
    /// Reads a boolean setting. Missing keys read as `false`.
    fn get_bool(&self, key: &str) -> bool;
}

/// Enumerates running application processes.
pub trait ProcessEnumerator: Send + Sync {
    fn list_running_processes(&self) -> Vec<RunningProcess>;
}

/// Terminates the background processes of a package. Fire-and-forget.
pub trait ProcessKiller: Send + Sync {
    fn kill_background(&self, package_name: &str);

    /// Kills several packages in one sweep. Names may repeat.
    fn kill_background_all(&self, package_names: &[&str]) {
        for name in package_names {
            self.kill_background(name);
        }
    }
}

/// A running process and the packages it hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningProcess {
    pub pid: u32,
    pub packages: Vec<String>,
}

impl RunningProcess {
    pub fn new(pid: u32, packages: Vec<String>) -> Self {
        Self { pid, packages }
    }

    /// The first package hosted by this process.
    ///
    /// Classification only ever looks at this entry, so a process hosting
    /// several packages is judged by the first one alone.
    pub fn primary_package(&self) -> Option<&str> {
        self.packages.first().map(String::as_str)
    }
}
