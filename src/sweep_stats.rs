//! Sweep statistics for the trimmer.
//!
//! This module tracks what the trimmer did: how often it was started and
//! stopped, how many sweeps ran, how many processes each sweep inspected,
//! protected and killed, and how often a pending sweep was cancelled ahead
//! of an alarm. All updates are lock-free counters or short mutex sections so
//! the worker, the process killer and the HTTP handlers can share one instance.

use ahash::AHashMap as HashMap;
use serde::Serialize;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::{Instant, SystemTime};

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            *self = Self {
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
            };
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Snapshot of a [`Stat`]: last, average, max, min and sample count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatSnapshot {
    pub last: f64,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub count: u64,
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    pub fn snapshot(&self) -> StatSnapshot {
        match self.inner.lock() {
            Ok(s) => StatSnapshot {
                last: s.last,
                avg: s.avg(),
                max: s.max,
                min: s.min,
                count: s.count,
            },
            Err(_) => StatSnapshot::default(),
        }
    }
}

/// Outcome of a single sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Processes returned by the enumerator.
    pub inspected: usize,
    /// Processes left alone because their primary package is protected.
    pub protected: usize,
    /// Processes without any package name.
    pub skipped_no_package: usize,
    /// Primary package names handed to the killer, in enumeration order.
    pub killed: Vec<String>,
}

/// Serializable view of all counters, used by the `/status` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SweepStatsSnapshot {
    pub start_calls: u64,
    pub stop_calls: u64,
    pub sweeps_total: u64,
    pub cancels_fired: u64,
    pub processes_killed_total: u64,
    pub processes_protected_total: u64,
    pub kill_failures: u64,
    pub inspected_per_sweep: StatSnapshot,
    pub killed_per_sweep: StatSnapshot,
    pub sweep_duration_ms: StatSnapshot,
    pub last_sweep: Option<SweepReport>,
    pub uptime_seconds: u64,
}

/// Statistics shared between the trimmer worker, the killer and observers.
pub struct SweepStats {
    pub start_calls: AtomicU64,
    pub stop_calls: AtomicU64,
    pub sweeps_total: AtomicU64,
    pub cancels_fired: AtomicU64,
    pub processes_killed_total: AtomicU64,
    pub processes_protected_total: AtomicU64,
    pub kill_failures: AtomicU64,

    pub inspected_per_sweep: Stat,
    pub killed_per_sweep: Stat,
    pub sweep_duration_ms: Stat,

    kills_by_package: Mutex<HashMap<String, u64>>,
    last_sweep: StdRwLock<Option<SweepReport>>,
    last_sweep_time: StdRwLock<Option<Instant>>,
    start_time: Instant,
}

impl Default for SweepStats {
    fn default() -> Self {
        Self {
            start_calls: AtomicU64::new(0),
            stop_calls: AtomicU64::new(0),
            sweeps_total: AtomicU64::new(0),
            cancels_fired: AtomicU64::new(0),
            processes_killed_total: AtomicU64::new(0),
            processes_protected_total: AtomicU64::new(0),
            kill_failures: AtomicU64::new(0),
            inspected_per_sweep: Stat::default(),
            killed_per_sweep: Stat::default(),
            sweep_duration_ms: Stat::default(),
            kills_by_package: Mutex::new(HashMap::new()),
            last_sweep: StdRwLock::new(None),
            last_sweep_time: StdRwLock::new(None),
            start_time: Instant::now(),
        }
    }
}

impl SweepStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_start(&self) {
        self.start_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancel_fired(&self) {
        self.cancels_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_kill_failure(&self) {
        self.kill_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self, report: &SweepReport, duration_ms: f64) {
        self.sweeps_total.fetch_add(1, Ordering::Relaxed);
        self.processes_killed_total
            .fetch_add(report.killed.len() as u64, Ordering::Relaxed);
        self.processes_protected_total
            .fetch_add(report.protected as u64, Ordering::Relaxed);
        self.inspected_per_sweep.add_sample(report.inspected as f64);
        self.killed_per_sweep.add_sample(report.killed.len() as f64);
        self.sweep_duration_ms.add_sample(duration_ms);

        if let Ok(mut by_pkg) = self.kills_by_package.lock() {
            for name in &report.killed {
                *by_pkg.entry(name.clone()).or_insert(0) += 1;
            }
        }
        if let Ok(mut guard) = self.last_sweep.write() {
            *guard = Some(report.clone());
        }
        if let Ok(mut guard) = self.last_sweep_time.write() {
            *guard = Some(Instant::now());
        }
    }

    pub fn last_sweep(&self) -> Option<SweepReport> {
        self.last_sweep.read().ok().and_then(|g| g.clone())
    }

    /// Packages killed most often, highest count first.
    pub fn top_killed(&self, n: usize) -> Vec<(String, u64)> {
        let mut v: Vec<(String, u64)> = match self.kills_by_package.lock() {
            Ok(by_pkg) => by_pkg.iter().map(|(k, c)| (k.clone(), *c)).collect(),
            Err(_) => Vec::new(),
        };
        v.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        v.truncate(n);
        v
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_last_sweep_time_str(&self) -> String {
        const SECS_PER_DAY: u64 = 86400;
        const SECS_PER_HOUR: u64 = 3600;
        const SECS_PER_MINUTE: u64 = 60;

        if let Ok(guard) = self.last_sweep_time.read() {
            if let Some(last) = *guard {
                let elapsed = last.elapsed();
                if let Ok(now) = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
                    let secs = now.as_secs().saturating_sub(elapsed.as_secs());
                    let hours = (secs % SECS_PER_DAY) / SECS_PER_HOUR;
                    let minutes = (secs % SECS_PER_HOUR) / SECS_PER_MINUTE;
                    let seconds = secs % SECS_PER_MINUTE;
                    return format!("{:02}:{:02}:{:02} UTC", hours, minutes, seconds);
                }
            }
        }
        "N/A".to_string()
    }

    pub fn snapshot(&self) -> SweepStatsSnapshot {
        SweepStatsSnapshot {
            start_calls: self.start_calls.load(Ordering::Relaxed),
            stop_calls: self.stop_calls.load(Ordering::Relaxed),
            sweeps_total: self.sweeps_total.load(Ordering::Relaxed),
            cancels_fired: self.cancels_fired.load(Ordering::Relaxed),
            processes_killed_total: self.processes_killed_total.load(Ordering::Relaxed),
            processes_protected_total: self.processes_protected_total.load(Ordering::Relaxed),
            kill_failures: self.kill_failures.load(Ordering::Relaxed),
            inspected_per_sweep: self.inspected_per_sweep.snapshot(),
            killed_per_sweep: self.killed_per_sweep.snapshot(),
            sweep_duration_ms: self.sweep_duration_ms.snapshot(),
            last_sweep: self.last_sweep(),
            uptime_seconds: self.get_uptime_seconds(),
        }
    }

    pub fn render_table(&self) -> String {
        let s = self.snapshot();
        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();
        writeln!(out, "TRIMMER STATISTICS").ok();
        writeln!(out, "==================").ok();
        writeln!(out).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "last",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();
        writeln!(out, "{}", "-".repeat(left_col + 4 * (col_w + 3))).ok();

        for (label, stat) in [
            ("inspected per sweep", s.inspected_per_sweep),
            ("killed per sweep", s.killed_per_sweep),
            ("sweep duration (ms)", s.sweep_duration_ms),
        ] {
            writeln!(
                out,
                "{:left$} | {:>col$.1} | {:>col$.1} | {:>col$.1} | {:>col$.1}",
                label,
                stat.last,
                stat.avg,
                stat.max,
                stat.min,
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        for (label, value) in [
            ("start calls", s.start_calls),
            ("stop calls", s.stop_calls),
            ("sweeps", s.sweeps_total),
            ("cancels fired", s.cancels_fired),
            ("processes killed", s.processes_killed_total),
            ("processes protected", s.processes_protected_total),
            ("kill failures", s.kill_failures),
        ] {
            writeln!(out, "{:left$} : {}", label, value, left = left_col).ok();
        }
        writeln!(
            out,
            "{:left$} : {}",
            "last sweep",
            self.get_last_sweep_time_str(),
            left = left_col
        )
        .ok();

        let top = self.top_killed(5);
        if !top.is_empty() {
            writeln!(out).ok();
            writeln!(out, "MOST KILLED PACKAGES").ok();
            for (name, count) in top {
                writeln!(out, "  {:>6}  {}", count, name).ok();
            }
        }

        out
    }
}
