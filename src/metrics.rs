//! Prometheus metrics definitions for bgtrim.
//!
//! Counters mirror the atomics in [`SweepStats`]; they are brought up to date
//! from a snapshot on every scrape, together with the timer gauges.

use bgtrim::{SweepStats, TimerState, TrimmerSnapshot};
use prometheus::{Gauge, GaugeVec, IntCounter, Opts, Registry};

/// Collection of Prometheus metrics exported by the daemon.
#[derive(Clone)]
pub struct TrimmerMetrics {
    pub start_calls_total: IntCounter,
    pub stop_calls_total: IntCounter,
    pub sweeps_total: IntCounter,
    pub cancels_fired_total: IntCounter,
    pub processes_killed_total: IntCounter,
    pub processes_protected_total: IntCounter,
    pub kill_failures_total: IntCounter,

    pub timer_armed: GaugeVec,         // labels: timer
    pub timer_delay_seconds: GaugeVec, // labels: timer
    pub last_sweep_inspected: Gauge,
    pub last_sweep_killed: Gauge,
    pub time_until_alarm_seconds: Gauge,
    pub sleep_mode: Gauge,
    pub uptime_seconds: Gauge,
}

impl TrimmerMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };
        let gauge = |name: &str, help: &str| -> Result<Gauge, prometheus::Error> {
            let g = Gauge::new(name, help)?;
            registry.register(Box::new(g.clone()))?;
            Ok(g)
        };

        let timer_armed = GaugeVec::new(
            Opts::new("bgtrim_timer_armed", "Whether the timer is armed (1) or not (0)"),
            &["timer"],
        )?;
        registry.register(Box::new(timer_armed.clone()))?;
        let timer_delay_seconds = GaugeVec::new(
            Opts::new(
                "bgtrim_timer_delay_seconds",
                "Delay the timer was armed with, 0 when not armed",
            ),
            &["timer"],
        )?;
        registry.register(Box::new(timer_delay_seconds.clone()))?;

        Ok(Self {
            start_calls_total: counter("bgtrim_start_calls_total", "Number of start() calls")?,
            stop_calls_total: counter("bgtrim_stop_calls_total", "Number of stop() calls")?,
            sweeps_total: counter("bgtrim_sweeps_total", "Number of sweeps run")?,
            cancels_fired_total: counter(
                "bgtrim_cancels_fired_total",
                "Number of times a pending sweep was cancelled ahead of an alarm",
            )?,
            processes_killed_total: counter(
                "bgtrim_processes_killed_total",
                "Processes handed to the killer across all sweeps",
            )?,
            processes_protected_total: counter(
                "bgtrim_processes_protected_total",
                "Processes skipped by protection rules across all sweeps",
            )?,
            kill_failures_total: counter(
                "bgtrim_kill_failures_total",
                "Signals that could not be delivered",
            )?,
            timer_armed,
            timer_delay_seconds,
            last_sweep_inspected: gauge(
                "bgtrim_last_sweep_inspected",
                "Processes inspected by the last sweep",
            )?,
            last_sweep_killed: gauge(
                "bgtrim_last_sweep_killed",
                "Processes killed by the last sweep",
            )?,
            time_until_alarm_seconds: gauge(
                "bgtrim_time_until_alarm_seconds",
                "Seconds until the next alarm as of the last start(), 0 without alarm",
            )?,
            sleep_mode: gauge(
                "bgtrim_sleep_mode",
                "Sleep mode flag as of the last start()",
            )?,
            uptime_seconds: gauge("bgtrim_uptime_seconds", "Daemon uptime in seconds")?,
        })
    }

    /// Brings every metric up to date.
    pub fn update(&self, stats: &SweepStats, snapshot: &TrimmerSnapshot) {
        let s = stats.snapshot();
        sync_counter(&self.start_calls_total, s.start_calls);
        sync_counter(&self.stop_calls_total, s.stop_calls);
        sync_counter(&self.sweeps_total, s.sweeps_total);
        sync_counter(&self.cancels_fired_total, s.cancels_fired);
        sync_counter(&self.processes_killed_total, s.processes_killed_total);
        sync_counter(&self.processes_protected_total, s.processes_protected_total);
        sync_counter(&self.kill_failures_total, s.kill_failures);

        for (label, timer) in [("sweep", &snapshot.sweep_task), ("cancel", &snapshot.cancel_task)] {
            let armed = matches!(timer, TimerState::Armed { .. });
            self.timer_armed
                .with_label_values(&[label])
                .set(if armed { 1.0 } else { 0.0 });
            self.timer_delay_seconds
                .with_label_values(&[label])
                .set(timer.delay_ms().unwrap_or(0) as f64 / 1000.0);
        }

        if let Some(report) = &s.last_sweep {
            self.last_sweep_inspected.set(report.inspected as f64);
            self.last_sweep_killed.set(report.killed.len() as f64);
        }
        if let Some(plan) = &snapshot.last_plan {
            self.time_until_alarm_seconds
                .set(plan.time_until_alarm_ms as f64 / 1000.0);
            self.sleep_mode.set(if plan.sleep_mode { 1.0 } else { 0.0 });
        }
        self.uptime_seconds.set(s.uptime_seconds as f64);
    }
}

/// Advances a counter to `target`; counters never go backwards.
fn sync_counter(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgtrim::SweepReport;
    use prometheus::{Encoder, TextEncoder};

    #[test]
    fn test_update_exports_counters_and_timers() {
        let registry = Registry::new();
        let metrics = TrimmerMetrics::new(&registry).unwrap();
        let stats = SweepStats::new();
        stats.record_start();
        stats.record_sweep(
            &SweepReport {
                inspected: 4,
                protected: 3,
                skipped_no_package: 0,
                killed: vec!["com.thirdparty.app".into()],
            },
            0.5,
        );

        metrics.update(&stats, &TrimmerSnapshot::default());
        // A second update must not double count.
        metrics.update(&stats, &TrimmerSnapshot::default());

        assert_eq!(metrics.sweeps_total.get(), 1);
        assert_eq!(metrics.processes_killed_total.get(), 1);
        assert_eq!(metrics.processes_protected_total.get(), 3);

        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buf)
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("bgtrim_sweeps_total 1"));
        assert!(text.contains("bgtrim_timer_armed{timer=\"sweep\"} 0"));
    }
}
