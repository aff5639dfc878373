//! Linux process collaborators for the trimmer.
//!
//! This module provides:
//! - `scanner`: background process discovery in /proc ([`ProcScanner`])
//! - `killer`: signal delivery to a package's processes ([`SignalKiller`])

pub mod killer;
pub mod scanner;

pub use killer::{parse_signal, InvalidSignal, SignalKiller, DEFAULT_SIGNAL};
pub use scanner::{
    collect_proc_entries, package_names, parse_stat, read_package_names, read_parent_pid,
    read_process_stat, read_process_uid, ProcEntry, ProcScanner, ProcStat, PROC_ROOT,
};
