//! Background process trimmer.
//!
//! The trimmer owns two deferred tasks, `sweep_task` and `cancel_task`, on a
//! single worker. `start()` reads the next alarm and the sleep flag, computes
//! a [`SweepPlan`] and re-arms both tasks; `stop()` disarms them. When the
//! sweep task fires, every running process whose primary package is not
//! protected is handed to the [`ProcessKiller`]. When the cancel task fires
//! (15 minutes before an alarm) it behaves like `stop()`, so no sweep runs in
//! the window right before the alarm goes off.
//!
//! # State machine
//!
//! ```text
//!            start()                   deadline reached
//!  Unarmed ───────────► Armed ─────────────────────────► Fired
//!     ▲                   │ ▲                              │
//!     │      stop()       │ │ start() (re-arm, replaces)   │
//!     └───────────────────┘ └──────────────────────────────┘
//! ```
//!
//! Both tasks follow this machine independently. `start()` and `stop()` only
//! enqueue a command; all timer work and every sweep run serially on the
//! worker task, so two callbacks of one trimmer never overlap.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, instrument, warn};

use crate::platform::{
    AlarmSource, ProcessEnumerator, ProcessKiller, SettingsStore, SLEEP_MODE_KEY,
};
use crate::protect::ProtectionPolicy;
use crate::sweep_stats::{SweepReport, SweepStats};

/// Delay before an immediate sweep.
pub const IMMEDIATE_SWEEP_DELAY: Duration = Duration::from_millis(100);
/// Delay before a regular sweep.
pub const IDLE_SWEEP_DELAY: Duration = Duration::from_millis(3_600_000);
/// Alarms closer than this trigger an immediate sweep.
pub const IMMINENT_ALARM_THRESHOLD: Duration = Duration::from_millis(3_600_000);
/// Pending work is cancelled this long before an alarm.
pub const CANCEL_LEAD_TIME: Duration = Duration::from_millis(900_000);

/// Delays and thresholds used to build a [`SweepPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimmerTimings {
    pub immediate_delay: Duration,
    pub idle_delay: Duration,
    pub imminent_threshold: Duration,
    pub cancel_lead: Duration,
}

impl Default for TrimmerTimings {
    fn default() -> Self {
        Self {
            immediate_delay: IMMEDIATE_SWEEP_DELAY,
            idle_delay: IDLE_SWEEP_DELAY,
            imminent_threshold: IMMINENT_ALARM_THRESHOLD,
            cancel_lead: CANCEL_LEAD_TIME,
        }
    }
}

/// What a single `start()` arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepPlan {
    /// Milliseconds until the next alarm, 0 when none is scheduled.
    pub time_until_alarm_ms: i64,
    pub sleep_mode: bool,
    pub sweep_delay_ms: u64,
    /// Present whenever an alarm is scheduled.
    pub cancel_delay_ms: Option<u64>,
}

impl SweepPlan {
    pub fn sweep_delay(&self) -> Duration {
        Duration::from_millis(self.sweep_delay_ms)
    }

    pub fn cancel_delay(&self) -> Option<Duration> {
        self.cancel_delay_ms.map(Duration::from_millis)
    }

    /// True when the sweep was pulled forward by sleep mode or an early alarm.
    pub fn is_immediate(&self, timings: &TrimmerTimings) -> bool {
        self.sweep_delay() == timings.immediate_delay
    }
}

/// Milliseconds from `now` until `next_alarm`, or 0 without an alarm.
pub fn time_until_alarm_ms(next_alarm: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    next_alarm
        .map(|trigger| (trigger - now).num_milliseconds())
        .unwrap_or(0)
}

/// Decision policy behind `start()`.
///
/// 1. Sleep mode, or an alarm within the imminent threshold: immediate sweep.
/// 2. Otherwise: sweep after the idle delay.
/// 3. Any alarm at all (`time_until_alarm_ms != 0`): cancel at
///    `time_until_alarm_ms - cancel_lead`, clamped to zero so an overdue
///    cancel fires at once.
pub fn plan_sweep(
    time_until_alarm_ms: i64,
    sleep_mode: bool,
    timings: &TrimmerTimings,
) -> SweepPlan {
    let threshold_ms = signed_ms(timings.imminent_threshold);
    let alarm_imminent = time_until_alarm_ms > 0 && time_until_alarm_ms < threshold_ms;

    let sweep_delay = if sleep_mode || alarm_imminent {
        timings.immediate_delay
    } else {
        timings.idle_delay
    };

    let cancel_delay_ms = (time_until_alarm_ms != 0).then(|| {
        time_until_alarm_ms
            .saturating_sub(signed_ms(timings.cancel_lead))
            .max(0) as u64
    });

    SweepPlan {
        time_until_alarm_ms,
        sleep_mode,
        sweep_delay_ms: duration_ms(sweep_delay),
        cancel_delay_ms,
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn signed_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Wall-clock instant `delay_ms` after `now`, saturating at the latest
/// representable time.
pub fn due_at(now: DateTime<Utc>, delay_ms: u64) -> DateTime<Utc> {
    i64::try_from(delay_ms)
        .ok()
        .and_then(ChronoDuration::try_milliseconds)
        .and_then(|offset| now.checked_add_signed(offset))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Runs one sweep: kill every process whose primary package is unprotected.
///
/// Only the first package of each process is considered. Kill failures are
/// the killer's business and never reach the caller.
#[instrument(skip_all)]
pub fn sweep_processes(
    enumerator: &dyn ProcessEnumerator,
    killer: &dyn ProcessKiller,
    policy: &ProtectionPolicy,
) -> SweepReport {
    let processes = enumerator.list_running_processes();
    let mut report = SweepReport {
        inspected: processes.len(),
        ..Default::default()
    };

    let mut targets = Vec::new();
    for process in &processes {
        let Some(package) = process.primary_package() else {
            report.skipped_no_package += 1;
            continue;
        };
        if let Some(reason) = policy.reason(package) {
            debug!(pid = process.pid, package, %reason, "Protected, skipping");
            report.protected += 1;
            continue;
        }
        debug!(pid = process.pid, package, "Killing background process");
        targets.push(package);
    }

    killer.kill_background_all(&targets);
    report.killed = targets.into_iter().map(str::to_string).collect();
    report
}

/// Injected collaborators of a trimmer.
#[derive(Clone)]
pub struct Collaborators {
    pub alarms: Arc<dyn AlarmSource>,
    pub settings: Arc<dyn SettingsStore>,
    pub processes: Arc<dyn ProcessEnumerator>,
    pub killer: Arc<dyn ProcessKiller>,
}

/// Observable state of one deferred task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TimerState {
    Unarmed,
    Armed {
        delay_ms: u64,
        due_at: DateTime<Utc>,
    },
    Fired {
        at: DateTime<Utc>,
    },
}

impl TimerState {
    pub fn is_armed(&self) -> bool {
        matches!(self, TimerState::Armed { .. })
    }

    pub fn delay_ms(&self) -> Option<u64> {
        match self {
            TimerState::Armed { delay_ms, .. } => Some(*delay_ms),
            _ => None,
        }
    }
}

/// Snapshot of both deferred tasks and the plan that armed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrimmerSnapshot {
    pub sweep_task: TimerState,
    pub cancel_task: TimerState,
    pub last_plan: Option<SweepPlan>,
}

impl Default for TrimmerSnapshot {
    fn default() -> Self {
        Self {
            sweep_task: TimerState::Unarmed,
            cancel_task: TimerState::Unarmed,
            last_plan: None,
        }
    }
}

#[derive(Debug)]
enum Command {
    Start,
    Stop,
}

/// Handle to a running trimmer.
///
/// Dropping the handle stops the worker; pending tasks are discarded.
pub struct Trimmer {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<TrimmerSnapshot>,
    stats: Arc<SweepStats>,
    worker: JoinHandle<()>,
}

impl Trimmer {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(
        collaborators: Collaborators,
        policy: ProtectionPolicy,
        timings: TrimmerTimings,
        stats: Arc<SweepStats>,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (state_tx, snapshot) = watch::channel(TrimmerSnapshot::default());

        let worker = Worker {
            collaborators,
            policy,
            timings,
            stats: Arc::clone(&stats),
            sweep_task: None,
            cancel_task: None,
            state: state_tx,
        };
        let handle = tokio::spawn(worker.run(rx));

        Self {
            commands,
            snapshot,
            stats,
            worker: handle,
        }
    }

    /// Re-arms the sweep and cancel tasks from the current alarm and sleep state.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// Disarms both tasks. Safe to call with nothing pending.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn snapshot(&self) -> TrimmerSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrimmerSnapshot> {
        self.snapshot.clone()
    }

    pub fn stats(&self) -> Arc<SweepStats> {
        Arc::clone(&self.stats)
    }

    /// Stops the worker and waits for it to exit.
    pub async fn shutdown(self) {
        let Trimmer {
            commands, worker, ..
        } = self;
        drop(commands);
        if let Err(e) = worker.await {
            warn!("Trimmer worker ended abnormally: {}", e);
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Trimmer worker is gone, command dropped");
        }
    }
}

struct Worker {
    collaborators: Collaborators,
    policy: ProtectionPolicy,
    timings: TrimmerTimings,
    stats: Arc<SweepStats>,
    sweep_task: Option<Pin<Box<Sleep>>>,
    cancel_task: Option<Pin<Box<Sleep>>>,
    state: watch::Sender<TrimmerSnapshot>,
}

async fn wait_for(task: &mut Option<Pin<Box<Sleep>>>) {
    match task {
        Some(s) => s.as_mut().await,
        None => pending().await,
    }
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!("Trimmer worker started");
        loop {
            tokio::select! {
                // Commands first, then the cancel task, so a cancel due at the
                // same instant as a sweep wins.
                biased;

                command = commands.recv() => match command {
                    Some(Command::Start) => self.start(),
                    Some(Command::Stop) => self.stop(),
                    None => break,
                },
                _ = wait_for(&mut self.cancel_task) => self.on_cancel_fired(),
                _ = wait_for(&mut self.sweep_task) => self.on_sweep_fired(),
            }
        }
        debug!("Trimmer worker stopped");
    }

    fn start(&mut self) {
        self.stats.record_start();

        let next_alarm = self.collaborators.alarms.next_alarm_trigger_time();
        let sleep_mode = self.collaborators.settings.get_bool(SLEEP_MODE_KEY);
        let now = Utc::now();
        let plan = plan_sweep(time_until_alarm_ms(next_alarm, now), sleep_mode, &self.timings);

        info!(
            sleep_mode,
            next_alarm = ?next_alarm,
            sweep_delay_ms = plan.sweep_delay_ms,
            cancel_delay_ms = ?plan.cancel_delay_ms,
            "Trimmer started"
        );

        // Re-arming replaces whatever was pending.
        self.sweep_task = Some(Box::pin(sleep(plan.sweep_delay())));
        self.cancel_task = plan.cancel_delay().map(|d| Box::pin(sleep(d)));

        let sweep_state = armed(plan.sweep_delay_ms, now);
        let cancel_state = plan
            .cancel_delay_ms
            .map(|ms| armed(ms, now))
            .unwrap_or(TimerState::Unarmed);
        self.state.send_modify(|s| {
            s.sweep_task = sweep_state;
            s.cancel_task = cancel_state;
            s.last_plan = Some(plan);
        });
    }

    fn stop(&mut self) {
        self.stats.record_stop();
        self.disarm();
        debug!("Trimmer stopped");
    }

    fn disarm(&mut self) {
        self.sweep_task = None;
        self.cancel_task = None;
        self.state.send_modify(|s| {
            s.sweep_task = TimerState::Unarmed;
            s.cancel_task = TimerState::Unarmed;
        });
    }

    fn on_cancel_fired(&mut self) {
        info!("Alarm is close, cancelling pending sweep");
        self.stats.record_cancel_fired();
        self.disarm();
        let at = Utc::now();
        self.state
            .send_modify(|s| s.cancel_task = TimerState::Fired { at });
    }

    fn on_sweep_fired(&mut self) {
        self.sweep_task = None;
        let at = Utc::now();
        self.state
            .send_modify(|s| s.sweep_task = TimerState::Fired { at });

        let started = Instant::now();
        let report = sweep_processes(
            self.collaborators.processes.as_ref(),
            self.collaborators.killer.as_ref(),
            &self.policy,
        );
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.stats.record_sweep(&report, elapsed_ms);

        info!(
            inspected = report.inspected,
            protected = report.protected,
            killed = report.killed.len(),
            "Sweep finished in {:.1} ms",
            elapsed_ms
        );
    }
}

fn armed(delay_ms: u64, now: DateTime<Utc>) -> TimerState {
    TimerState::Armed {
        delay_ms,
        due_at: due_at(now, delay_ms),
    }
}
