//! bgtrim - background process trimmer library
//!
//! This library decides when to sweep background processes and performs the
//! sweep. It is host-agnostic: the next alarm, the sleep flag, the process
//! list and the kill action all come from injected collaborators, and the
//! `/proc` based Linux implementations of those live next to the core.
//!
//! # Features
//!
//! - **Alarm-aware scheduling**: sweep within 100 ms in sleep mode or when an
//!   alarm is less than an hour away, otherwise after an hour
//! - **Early cancellation**: pending work is cancelled 15 minutes before the
//!   next alarm
//! - **Protection rules**: platform, launcher and telephony packages are never
//!   touched
//! - **Background only**: the Linux scanner skips session leaders, terminal
//!   foreground jobs and the daemon's own ancestors
//! - **Serial worker**: all timer callbacks run on one tokio task
//!
//! # Usage
//!
//! ```rust,no_run
//! use bgtrim::{
//!     AlarmSchedule, Collaborators, FileSettingsStore, ProcScanner, ProtectionPolicy,
//!     SignalKiller, SweepStats, Trimmer, TrimmerTimings, DEFAULT_SIGNAL,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let stats = Arc::new(SweepStats::new());
//! let scanner = ProcScanner::default().with_target_uid(Some(1000));
//! let collaborators = Collaborators {
//!     alarms: Arc::new(AlarmSchedule::default()),
//!     settings: Arc::new(FileSettingsStore::for_current_user()),
//!     processes: Arc::new(scanner.clone()),
//!     killer: Arc::new(SignalKiller::new(scanner, DEFAULT_SIGNAL).dry_run(true)),
//! };
//!
//! let trimmer = Trimmer::spawn(
//!     collaborators,
//!     ProtectionPolicy::builtin(),
//!     TrimmerTimings::default(),
//!     stats,
//! );
//! trimmer.start();
//! // ... later, e.g. when the user comes back
//! trimmer.stop();
//! trimmer.shutdown().await;
//! # }
//! ```

pub mod alarm;
pub mod platform;
pub mod process;
pub mod protect;
pub mod settings;
pub mod sweep_stats;
pub mod trimmer;

// Re-export main types for convenience
pub use alarm::{parse_entries, Alarm, AlarmEntry, AlarmError, AlarmKind, AlarmSchedule, Schedule};
pub use platform::{
    AlarmSource, ProcessEnumerator, ProcessKiller, RunningProcess, SettingsStore, SLEEP_MODE_KEY,
};
pub use process::{parse_signal, ProcScanner, SignalKiller, DEFAULT_SIGNAL};
pub use protect::{is_protected, ProtectionPolicy, ProtectionReason};
pub use settings::{FileSettingsStore, SettingsError};
pub use sweep_stats::{SweepReport, SweepStats, SweepStatsSnapshot};
pub use trimmer::{
    due_at, plan_sweep, sweep_processes, time_until_alarm_ms, Collaborators, SweepPlan,
    TimerState, Trimmer, TrimmerSnapshot, TrimmerTimings,
};
