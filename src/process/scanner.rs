//! Process scanning utilities for discovering running processes in /proc.
//!
//! This module walks the numeric entries of a proc filesystem, reads each
//! process' owner and names, and exposes the result through
//! [`ProcessEnumerator`] so the trimmer can sweep them.
//!
//! Only background processes are listed. A process is in the foreground when
//! it leads its session, belongs to the foreground process group of its
//! controlling terminal, or is an ancestor of the scanning process.

use ahash::AHashSet as HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::platform::{ProcessEnumerator, RunningProcess};

/// Default proc filesystem root.
pub const PROC_ROOT: &str = "/proc";

/// Process entry representing a directory in /proc filesystem.
#[derive(Debug, Clone)]
pub struct ProcEntry {
    pub pid: u32,
    pub proc_path: PathBuf,
}

/// Scans the proc root for process entries with numeric PIDs, sorted by PID.
///
/// `max` keeps the lowest PIDs.
pub fn collect_proc_entries(root: &Path, max: Option<usize>) -> Vec<ProcEntry> {
    let mut out = Vec::new();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read {}: {}", root.display(), e);
            return out;
        }
    };
    for entry in entries.flatten() {
        let p = entry.path();
        let Some(name) = p.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let Ok(pid) = name.parse::<u32>() else {
            continue;
        };
        out.push(ProcEntry { pid, proc_path: p });
    }
    out.sort_by_key(|e| e.pid);
    if let Some(max) = max {
        out.truncate(max);
    }
    out
}

/// Real uid of a process, from the `Uid:` line of its status file.
pub fn read_process_uid(proc_path: &Path) -> Option<u32> {
    let status = fs::read_to_string(proc_path.join("status")).ok()?;
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

/// Parent pid of a process, from the `PPid:` line of its status file.
pub fn read_parent_pid(proc_path: &Path) -> Option<u32> {
    let status = fs::read_to_string(proc_path.join("status")).ok()?;
    status
        .lines()
        .find_map(|line| line.strip_prefix("PPid:"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// Job-control fields of `/proc/<pid>/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcStat {
    pub ppid: u32,
    pub pgrp: i32,
    pub session: i32,
    /// Foreground process group of the controlling terminal, -1 without one.
    pub tpgid: i32,
}

impl ProcStat {
    pub fn is_session_leader(&self, pid: u32) -> bool {
        i64::from(self.session) == i64::from(pid)
    }

    pub fn is_terminal_foreground(&self) -> bool {
        self.tpgid > 0 && self.tpgid == self.pgrp
    }

    /// True when the process is neither a session leader nor in the
    /// foreground group of its terminal.
    pub fn is_background(&self, pid: u32) -> bool {
        !self.is_session_leader(pid) && !self.is_terminal_foreground()
    }
}

/// Parses the contents of a stat file.
///
/// `comm` may contain spaces and parentheses, so fields are read after the
/// last `)`.
pub fn parse_stat(content: &str) -> Option<ProcStat> {
    let rest = &content[content.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let _state = fields.next()?;
    let ppid = fields.next()?.parse().ok()?;
    let pgrp = fields.next()?.parse().ok()?;
    let session = fields.next()?.parse().ok()?;
    let _tty_nr = fields.next()?;
    let tpgid = fields.next()?.parse().ok()?;
    Some(ProcStat {
        ppid,
        pgrp,
        session,
        tpgid,
    })
}

pub fn read_process_stat(proc_path: &Path) -> Option<ProcStat> {
    parse_stat(&fs::read_to_string(proc_path.join("stat")).ok()?)
}

/// Package names for a process given its raw cmdline and comm.
///
/// The first entry is the basename of argv[0] (application processes set it
/// to their package name), followed by `comm` if it differs. Processes with
/// an empty cmdline are kernel threads and get no package names at all.
pub fn package_names(cmdline: &[u8], comm: Option<&str>) -> Vec<String> {
    let mut names = Vec::new();

    let argv0 = cmdline
        .split(|&b| b == 0u8)
        .next()
        .and_then(|s| std::str::from_utf8(s).ok())
        .map(str::trim)
        .unwrap_or("");
    if argv0.is_empty() {
        return names;
    }
    if let Some(base) = Path::new(argv0).file_name().and_then(|s| s.to_str()) {
        if !base.is_empty() {
            names.push(base.to_string());
        }
    }

    if let Some(comm) = comm.map(str::trim).filter(|c| !c.is_empty()) {
        if !names.iter().any(|n| n == comm) {
            names.push(comm.to_string());
        }
    }
    names
}

/// Reads the package names of a process from its cmdline and comm files.
pub fn read_package_names(proc_path: &Path) -> Vec<String> {
    let cmdline = fs::read(proc_path.join("cmdline")).unwrap_or_default();
    let comm = fs::read_to_string(proc_path.join("comm")).ok();
    package_names(&cmdline, comm.as_deref())
}

/// [`ProcessEnumerator`] over a proc filesystem.
///
/// Only background processes owned by `target_uid` are listed when it is
/// set. PID 1, the scanner's own process, its ancestors and kernel threads
/// are never listed. `max_processes` caps the result after filtering.
#[derive(Debug, Clone)]
pub struct ProcScanner {
    root: PathBuf,
    target_uid: Option<u32>,
    max_processes: Option<usize>,
    own_pid: u32,
}

impl Default for ProcScanner {
    fn default() -> Self {
        Self::new(PROC_ROOT)
    }
}

impl ProcScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            target_uid: None,
            max_processes: None,
            own_pid: std::process::id(),
        }
    }

    pub fn with_target_uid(mut self, uid: Option<u32>) -> Self {
        self.target_uid = uid;
        self
    }

    pub fn with_max_processes(mut self, max: Option<usize>) -> Self {
        self.max_processes = max;
        self
    }

    /// Treat `pid` as the scanning process; its ancestors are looked up
    /// under the scanner's root.
    pub fn with_own_pid(mut self, pid: u32) -> Self {
        self.own_pid = pid;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn target_uid(&self) -> Option<u32> {
        self.target_uid
    }

    /// The scanning process and every ancestor up to init.
    pub fn ancestor_pids(&self) -> HashSet<u32> {
        let mut chain = HashSet::default();
        let mut pid = self.own_pid;
        while pid > 1 && chain.insert(pid) {
            match read_parent_pid(&self.root.join(pid.to_string())) {
                Some(parent) => pid = parent,
                None => break,
            }
        }
        chain
    }

    fn read_entry(&self, entry: &ProcEntry, ancestors: &HashSet<u32>) -> Option<RunningProcess> {
        if entry.pid == 1 || entry.pid == self.own_pid || ancestors.contains(&entry.pid) {
            return None;
        }
        if let Some(target) = self.target_uid {
            // Processes that vanished or hide their status are skipped.
            if read_process_uid(&entry.proc_path)? != target {
                return None;
            }
        }
        let stat = read_process_stat(&entry.proc_path)?;
        if !stat.is_background(entry.pid) {
            debug!(pid = entry.pid, ?stat, "Foreground process, not listed");
            return None;
        }
        let packages = read_package_names(&entry.proc_path);
        if packages.is_empty() {
            return None;
        }
        Some(RunningProcess::new(entry.pid, packages))
    }
}

impl ProcessEnumerator for ProcScanner {
    fn list_running_processes(&self) -> Vec<RunningProcess> {
        let ancestors = self.ancestor_pids();
        let processes: Vec<RunningProcess> = collect_proc_entries(&self.root, None)
            .iter()
            .filter_map(|e| self.read_entry(e, &ancestors))
            .take(self.max_processes.unwrap_or(usize::MAX))
            .collect();
        debug!(
            "Scanned {} processes under {}",
            processes.len(),
            self.root.display()
        );
        processes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_names_android_style() {
        let names = package_names(b"com.thirdparty.app\0", Some("thirdparty.app\n"));
        assert_eq!(names, vec!["com.thirdparty.app", "thirdparty.app"]);
    }

    #[test]
    fn test_package_names_path_argv0() {
        let names = package_names(b"/usr/bin/firefox\0--new-window\0", Some("firefox"));
        assert_eq!(names, vec!["firefox"]);
    }

    #[test]
    fn test_package_names_kernel_thread() {
        assert!(package_names(b"", Some("kworker/0:1")).is_empty());
    }

    #[test]
    fn test_package_names_without_comm() {
        assert_eq!(package_names(b"bash\0", None), vec!["bash"]);
    }

    #[test]
    fn test_parse_stat_background() {
        let line = "4242 (app (worker) x) S 4000 4100 3900 34816 4300 4194304 0";
        let stat = parse_stat(line).unwrap();
        assert_eq!(
            stat,
            ProcStat {
                ppid: 4000,
                pgrp: 4100,
                session: 3900,
                tpgid: 4300,
            }
        );
        assert!(stat.is_background(4242));
    }

    #[test]
    fn test_parse_stat_foreground_and_leader() {
        let fg = parse_stat("500 (vim) S 400 500 400 34816 500 0").unwrap();
        assert!(fg.is_terminal_foreground());
        assert!(!fg.is_background(500));

        let leader = parse_stat("400 (bash) S 390 400 400 34816 500 0").unwrap();
        assert!(leader.is_session_leader(400));
        assert!(!leader.is_background(400));

        let daemon = parse_stat("700 (app) S 1 650 600 0 -1 0").unwrap();
        assert!(daemon.is_background(700));
    }

    #[test]
    fn test_parse_stat_truncated() {
        assert_eq!(parse_stat("12 (x) S 1"), None);
        assert_eq!(parse_stat("garbage"), None);
    }

    #[test]
    fn test_collect_proc_entries_missing_root() {
        assert!(collect_proc_entries(Path::new("/nonexistent-proc-root"), None).is_empty());
    }
}
