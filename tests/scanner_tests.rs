//! Integration tests for the /proc scanner and the signal killer.
//!
//! A fake proc tree is laid out in a temporary directory with the four
//! files the scanner reads: `status`, `stat`, `cmdline` and `comm`.

use bgtrim::{ProcScanner, ProcessEnumerator, ProcessKiller, SignalKiller, SweepStats};
use nix::sys::signal::Signal;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Job-control placement of a fake process.
#[derive(Clone, Copy)]
struct Job {
    ppid: u32,
    pgrp: i32,
    session: i32,
    tpgid: i32,
}

/// Detached from any terminal, in a session led by someone else.
fn background(pid: u32) -> Job {
    Job {
        ppid: 1,
        pgrp: pid as i32,
        session: 50,
        tpgid: -1,
    }
}

fn add_process_with(root: &Path, pid: u32, uid: u32, cmdline: &[u8], comm: &str, job: Job) {
    let dir = root.join(pid.to_string());
    fs::create_dir_all(&dir).unwrap();
    let ids = format!("{uid}\t{uid}\t{uid}\t{uid}");
    let ppid = job.ppid;
    fs::write(
        dir.join("status"),
        format!(
            "Name:\t{comm}\nState:\tS (sleeping)\nPid:\t{pid}\nPPid:\t{ppid}\n\
             Uid:\t{ids}\nGid:\t{ids}\n"
        ),
    )
    .unwrap();
    fs::write(
        dir.join("stat"),
        format!(
            "{pid} ({comm}) S {} {} {} 0 {} 4194304 0 0 0 0\n",
            job.ppid, job.pgrp, job.session, job.tpgid
        ),
    )
    .unwrap();
    fs::write(dir.join("cmdline"), cmdline).unwrap();
    fs::write(dir.join("comm"), format!("{comm}\n")).unwrap();
}

fn add_process(root: &Path, pid: u32, uid: u32, cmdline: &[u8], comm: &str) {
    add_process_with(root, pid, uid, cmdline, comm, background(pid));
}

fn fake_proc() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    add_process(root, 1, 0, b"/sbin/init\0", "systemd");
    add_process(root, 2, 0, b"", "kthreadd");
    add_process(root, 300, 1000, b"com.thirdparty.app\0", "thirdparty.app");
    add_process(root, 301, 1000, b"/usr/bin/firefox\0--new-window\0", "firefox");
    add_process(root, 302, 1000, b"com.example.launcher\0", "launcher");
    add_process(root, 400, 1001, b"com.other.user\0", "other.user");
    add_process(root, 401, 1000, b"com.thirdparty.app:service\0", "app:service");
    fs::create_dir_all(root.join("self")).unwrap();
    fs::write(root.join("uptime"), "1.0 1.0\n").unwrap();
    dir
}

/// Scanner over the fake tree, running as a pid that is not part of it.
fn fake_scanner(root: &Path) -> ProcScanner {
    ProcScanner::new(root).with_own_pid(999_999)
}

fn listed_pids(scanner: &ProcScanner) -> Vec<u32> {
    scanner
        .list_running_processes()
        .iter()
        .map(|p| p.pid)
        .collect()
}

#[test]
fn test_scanner_filters_by_uid() {
    let proc = fake_proc();
    let scanner = fake_scanner(proc.path()).with_target_uid(Some(1000));
    assert_eq!(listed_pids(&scanner), vec![300, 301, 302, 401]);
}

#[test]
fn test_scanner_without_uid_skips_init_and_kernel_threads() {
    let proc = fake_proc();
    let pids = listed_pids(&fake_scanner(proc.path()));
    assert!(!pids.contains(&1), "pid 1 is never listed");
    assert!(!pids.contains(&2), "kernel threads have no packages");
    assert!(pids.contains(&400));
}

#[test]
fn test_scanner_package_names() {
    let proc = fake_proc();
    let scanner = fake_scanner(proc.path()).with_target_uid(Some(1000));
    let processes = scanner.list_running_processes();

    assert_eq!(
        processes[0].packages,
        vec!["com.thirdparty.app".to_string(), "thirdparty.app".to_string()]
    );
    assert_eq!(processes[1].primary_package(), Some("firefox"));
    assert_eq!(processes[1].packages.len(), 1);
}

#[test]
fn test_scanner_skips_foreground_and_own_ancestors() {
    let proc = fake_proc();
    let root = proc.path();
    // Login shell on a terminal: session leader of session 600.
    let shell = Job {
        ppid: 1,
        pgrp: 600,
        session: 600,
        tpgid: 610,
    };
    add_process_with(root, 600, 1000, b"-bash\0", "bash", shell);
    // Editor in the terminal's foreground group.
    let editor = Job {
        ppid: 600,
        pgrp: 610,
        session: 600,
        tpgid: 610,
    };
    add_process_with(root, 610, 1000, b"vim\0", "vim", editor);
    // Job in a background group of the same terminal.
    let job = Job {
        ppid: 600,
        pgrp: 620,
        session: 600,
        tpgid: 610,
    };
    add_process_with(root, 620, 1000, b"rsync\0", "rsync", job);
    // The scanning daemon (700) under a supervisor (650) under a user manager (640).
    add_process_with(root, 640, 1000, b"systemd\0", "systemd", background(640));
    let supervisor = Job {
        ppid: 640,
        ..background(650)
    };
    add_process_with(root, 650, 1000, b"supervisor\0", "supervisor", supervisor);
    let daemon = Job {
        ppid: 650,
        ..background(700)
    };
    add_process_with(root, 700, 1000, b"bgtrim\0", "bgtrim", daemon);

    let scanner = fake_scanner(root)
        .with_target_uid(Some(1000))
        .with_own_pid(700);

    let ancestors = scanner.ancestor_pids();
    assert!(ancestors.contains(&650) && ancestors.contains(&640));

    let pids = listed_pids(&scanner);
    assert_eq!(pids, vec![300, 301, 302, 401, 620]);
}

#[test]
fn test_scanner_skips_processes_without_stat() {
    let proc = fake_proc();
    fs::remove_file(proc.path().join("301").join("stat")).unwrap();
    let scanner = fake_scanner(proc.path()).with_target_uid(Some(1000));
    assert_eq!(listed_pids(&scanner), vec![300, 302, 401]);
}

#[test]
fn test_scanner_max_processes_applies_after_filtering() {
    let proc = fake_proc();
    let scanner = fake_scanner(proc.path())
        .with_target_uid(Some(1000))
        .with_max_processes(Some(2));
    assert_eq!(listed_pids(&scanner), vec![300, 301]);

    let other = fake_scanner(proc.path())
        .with_target_uid(Some(1001))
        .with_max_processes(Some(1));
    assert_eq!(listed_pids(&other), vec![400]);
}

#[test]
fn test_scanner_missing_root_is_empty() {
    let scanner = ProcScanner::new("/nonexistent/proc");
    assert!(scanner.list_running_processes().is_empty());
}

#[test]
fn test_killer_matches_primary_package_exactly() {
    let proc = fake_proc();
    let scanner = fake_scanner(proc.path()).with_target_uid(Some(1000));
    let killer = SignalKiller::new(scanner, Signal::SIGTERM);

    assert_eq!(killer.matching_pids("com.thirdparty.app"), vec![300]);
    assert_eq!(killer.matching_pids("com.other.user"), Vec::<u32>::new());
    assert!(killer.matching_pids("thirdparty.app").is_empty());
}

#[test]
fn test_killer_package_index_groups_pids() {
    let proc = fake_proc();
    add_process(proc.path(), 303, 1000, b"com.thirdparty.app\0", "thirdparty.app");
    let scanner = fake_scanner(proc.path()).with_target_uid(Some(1000));
    let killer = SignalKiller::new(scanner, Signal::SIGTERM);

    let index = killer.package_index();
    assert_eq!(index.get("com.thirdparty.app"), Some(&vec![300, 303]));
    assert_eq!(index.get("firefox"), Some(&vec![301]));
    assert_eq!(index.len(), 4);
}

#[test]
fn test_killer_dry_run_sends_nothing() {
    let proc = fake_proc();
    let stats = Arc::new(SweepStats::new());
    let scanner = fake_scanner(proc.path()).with_target_uid(Some(1000));
    let killer = SignalKiller::new(scanner, Signal::SIGKILL)
        .dry_run(true)
        .with_stats(Arc::clone(&stats));

    // The fake pids do not belong to real processes of ours; a dry run must
    // not even try to signal them.
    killer.kill_background("com.thirdparty.app");
    killer.kill_background_all(&["com.thirdparty.app", "firefox", "com.thirdparty.app"]);
    assert_eq!(stats.snapshot().kill_failures, 0);
}
