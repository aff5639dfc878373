//! Integration tests for the trimmer worker.
//!
//! Time is paused, so the hour-long sweep delay and the cancel lead can be
//! crossed with `tokio::time::advance` instead of real waiting. Collaborators
//! are in-memory fakes that record what the trimmer asked for.

use bgtrim::{
    AlarmSource, Collaborators, ProcessEnumerator, ProcessKiller, ProtectionPolicy,
    RunningProcess, SettingsStore, SweepStats, TimerState, Trimmer, TrimmerTimings,
    SLEEP_MODE_KEY,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MIN: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

#[derive(Default)]
struct FakeAlarm {
    offset: Mutex<Option<ChronoDuration>>,
}

impl FakeAlarm {
    fn set(&self, offset: Option<ChronoDuration>) {
        *self.offset.lock().unwrap() = offset;
    }
}

impl AlarmSource for FakeAlarm {
    fn next_alarm_trigger_time(&self) -> Option<DateTime<Utc>> {
        self.offset.lock().unwrap().map(|o| Utc::now() + o)
    }
}

#[derive(Default)]
struct FakeSettings {
    sleep_mode: AtomicBool,
    reads: Mutex<Vec<String>>,
}

impl SettingsStore for FakeSettings {
    fn get_bool(&self, key: &str) -> bool {
        self.reads.lock().unwrap().push(key.to_string());
        key == SLEEP_MODE_KEY && self.sleep_mode.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct FakeProcesses {
    processes: Mutex<Vec<RunningProcess>>,
}

impl ProcessEnumerator for FakeProcesses {
    fn list_running_processes(&self) -> Vec<RunningProcess> {
        self.processes.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct RecordingKiller {
    killed: Mutex<Vec<String>>,
}

impl RecordingKiller {
    fn killed(&self) -> Vec<String> {
        self.killed.lock().unwrap().clone()
    }
}

impl ProcessKiller for RecordingKiller {
    fn kill_background(&self, package_name: &str) {
        self.killed.lock().unwrap().push(package_name.to_string());
    }
}

struct Harness {
    alarm: Arc<FakeAlarm>,
    settings: Arc<FakeSettings>,
    processes: Arc<FakeProcesses>,
    killer: Arc<RecordingKiller>,
    trimmer: Trimmer,
}

fn proc(pid: u32, packages: &[&str]) -> RunningProcess {
    RunningProcess::new(pid, packages.iter().map(|s| s.to_string()).collect())
}

fn harness() -> Harness {
    harness_with_policy(ProtectionPolicy::builtin())
}

fn harness_with_policy(policy: ProtectionPolicy) -> Harness {
    build_harness(policy, TrimmerTimings::default())
}

fn build_harness(policy: ProtectionPolicy, timings: TrimmerTimings) -> Harness {
    let alarm = Arc::new(FakeAlarm::default());
    let settings = Arc::new(FakeSettings::default());
    let processes = Arc::new(FakeProcesses::default());
    let killer = Arc::new(RecordingKiller::default());

    *processes.processes.lock().unwrap() = vec![
        proc(100, &["com.android.systemui"]),
        proc(101, &["com.thirdparty.app"]),
        proc(102, &["com.example.launcher"]),
        proc(103, &["android"]),
        proc(104, &["com.vendor.ims.service"]),
    ];

    let trimmer = Trimmer::spawn(
        Collaborators {
            alarms: alarm.clone(),
            settings: settings.clone(),
            processes: processes.clone(),
            killer: killer.clone(),
        },
        policy,
        timings,
        Arc::new(SweepStats::new()),
    );

    Harness {
        alarm,
        settings,
        processes,
        killer,
        trimmer,
    }
}

/// Lets the worker drain its queue without moving the paused clock.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

async fn advance(d: Duration) {
    tokio::time::advance(d).await;
    settle().await;
}

fn assert_near(actual: u64, expected: u64) {
    let diff = actual.abs_diff(expected);
    assert!(diff <= 10, "expected ~{expected} ms, got {actual} ms");
}

#[tokio::test(start_paused = true)]
async fn test_no_alarm_no_sleep_sweeps_after_an_hour() {
    let h = harness();
    h.trimmer.start();
    settle().await;

    let snap = h.trimmer.snapshot();
    assert_eq!(snap.sweep_task.delay_ms(), Some(3_600_000));
    assert_eq!(snap.cancel_task, TimerState::Unarmed);

    advance(HOUR - MIN).await;
    assert!(h.killer.killed().is_empty());

    advance(MIN + Duration::from_millis(5)).await;
    assert_eq!(h.killer.killed(), vec!["com.thirdparty.app".to_string()]);
    assert!(matches!(
        h.trimmer.snapshot().sweep_task,
        TimerState::Fired { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_sleep_mode_sweeps_within_100ms() {
    let h = harness();
    h.settings.sleep_mode.store(true, Ordering::SeqCst);
    h.trimmer.start();
    settle().await;

    assert_eq!(h.trimmer.snapshot().sweep_task.delay_ms(), Some(100));
    assert_eq!(
        h.settings.reads.lock().unwrap().as_slice(),
        &[SLEEP_MODE_KEY.to_string()]
    );

    advance(Duration::from_millis(90)).await;
    assert!(h.killer.killed().is_empty());

    advance(Duration::from_millis(15)).await;
    assert_eq!(h.killer.killed(), vec!["com.thirdparty.app".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_imminent_alarm_sweeps_now_and_arms_cancel() {
    let h = harness();
    h.alarm.set(Some(ChronoDuration::minutes(30)));
    h.trimmer.start();
    settle().await;

    let snap = h.trimmer.snapshot();
    assert_eq!(snap.sweep_task.delay_ms(), Some(100));
    assert_near(snap.cancel_task.delay_ms().unwrap(), 900_000);

    advance(Duration::from_millis(105)).await;
    assert_eq!(h.killer.killed().len(), 1);

    // The cancel task is still pending after the sweep and fires on its own.
    assert!(h.trimmer.snapshot().cancel_task.is_armed());
    advance(15 * MIN).await;
    assert!(matches!(
        h.trimmer.snapshot().cancel_task,
        TimerState::Fired { .. }
    ));
    assert_eq!(h.trimmer.stats().snapshot().cancels_fired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_alarm_inside_cancel_lead_prevents_sweep() {
    let h = harness();
    h.alarm.set(Some(ChronoDuration::minutes(10)));
    h.trimmer.start();
    settle().await;
    advance(Duration::from_millis(2)).await;

    let snap = h.trimmer.snapshot();
    assert!(matches!(snap.cancel_task, TimerState::Fired { .. }));
    assert_eq!(snap.sweep_task, TimerState::Unarmed);

    advance(HOUR).await;
    assert!(h.killer.killed().is_empty());
    let stats = h.trimmer.stats().snapshot();
    assert_eq!(stats.sweeps_total, 0);
    assert_eq!(stats.cancels_fired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_distant_alarm_sweeps_before_cancel() {
    let h = harness();
    h.alarm.set(Some(ChronoDuration::hours(8)));
    h.trimmer.start();
    settle().await;

    let snap = h.trimmer.snapshot();
    assert_eq!(snap.sweep_task.delay_ms(), Some(3_600_000));
    assert_near(snap.cancel_task.delay_ms().unwrap(), 27_900_000);

    advance(HOUR + Duration::from_millis(5)).await;
    assert_eq!(h.killer.killed().len(), 1);
    assert!(h.trimmer.snapshot().cancel_task.is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_stop_disarms_both_tasks() {
    let h = harness();
    h.alarm.set(Some(ChronoDuration::hours(3)));
    h.trimmer.start();
    settle().await;
    assert!(h.trimmer.snapshot().cancel_task.is_armed());

    h.trimmer.stop();
    settle().await;
    let snap = h.trimmer.snapshot();
    assert_eq!(snap.sweep_task, TimerState::Unarmed);
    assert_eq!(snap.cancel_task, TimerState::Unarmed);

    advance(4 * HOUR).await;
    assert!(h.killer.killed().is_empty());
    assert_eq!(h.trimmer.stats().snapshot().cancels_fired, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_start_is_noop() {
    let h = harness();
    h.trimmer.stop();
    h.trimmer.stop();
    settle().await;

    let snap = h.trimmer.snapshot();
    assert_eq!(snap.sweep_task, TimerState::Unarmed);
    assert_eq!(snap.cancel_task, TimerState::Unarmed);
    assert_eq!(h.trimmer.stats().snapshot().stop_calls, 2);
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_pending_sweep() {
    let h = harness();
    h.trimmer.start();
    settle().await;

    advance(30 * MIN).await;
    h.trimmer.start();
    settle().await;

    // The first sweep would have fired here.
    advance(45 * MIN).await;
    assert!(h.killer.killed().is_empty());

    advance(15 * MIN + Duration::from_millis(5)).await;
    assert_eq!(h.killer.killed().len(), 1);

    advance(2 * HOUR).await;
    assert_eq!(h.killer.killed().len(), 1, "only one sweep per start");
    assert_eq!(h.trimmer.stats().snapshot().sweeps_total, 1);
}

#[tokio::test(start_paused = true)]
async fn test_restart_reads_fresh_inputs() {
    let h = harness();
    h.trimmer.start();
    settle().await;
    assert_eq!(h.trimmer.snapshot().sweep_task.delay_ms(), Some(3_600_000));

    h.settings.sleep_mode.store(true, Ordering::SeqCst);
    h.trimmer.start();
    settle().await;
    let snap = h.trimmer.snapshot();
    assert_eq!(snap.sweep_task.delay_ms(), Some(100));
    assert!(snap.last_plan.unwrap().sleep_mode);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_uses_primary_package_only() {
    let h = harness();
    *h.processes.processes.lock().unwrap() = vec![
        proc(1, &["com.thirdparty.a", "com.android.phone"]),
        proc(2, &["com.android.systemui", "com.thirdparty.b"]),
        proc(3, &[]),
        proc(4, &["com.thirdparty.c"]),
    ];
    h.settings.sleep_mode.store(true, Ordering::SeqCst);
    h.trimmer.start();
    settle().await;
    advance(Duration::from_millis(105)).await;

    assert_eq!(
        h.killer.killed(),
        vec!["com.thirdparty.a".to_string(), "com.thirdparty.c".to_string()]
    );
    let report = h.trimmer.stats().last_sweep().unwrap();
    assert_eq!(report.inspected, 4);
    assert_eq!(report.protected, 1);
    assert_eq!(report.skipped_no_package, 1);
}

#[tokio::test(start_paused = true)]
async fn test_configured_rules_extend_builtin() {
    let h = harness_with_policy(ProtectionPolicy {
        names: vec!["com.thirdparty.app".into()],
        ..Default::default()
    });
    h.settings.sleep_mode.store(true, Ordering::SeqCst);
    h.trimmer.start();
    settle().await;
    advance(Duration::from_millis(105)).await;

    assert!(h.killer.killed().is_empty());
    assert_eq!(h.trimmer.stats().last_sweep().unwrap().protected, 5);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_sees_transitions() {
    let h = harness();
    let mut rx = h.trimmer.subscribe();
    h.trimmer.start();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().sweep_task.is_armed());

    h.trimmer.stop();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().sweep_task, TimerState::Unarmed);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_discards_pending_sweep() {
    let h = harness();
    let killer = h.killer.clone();
    h.settings.sleep_mode.store(true, Ordering::SeqCst);
    h.trimmer.start();
    h.trimmer.shutdown().await;

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(killer.killed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_oversized_delays_keep_worker_alive() {
    let h = build_harness(
        ProtectionPolicy::builtin(),
        TrimmerTimings {
            idle_delay: Duration::from_millis(u64::MAX),
            cancel_lead: Duration::ZERO,
            ..TrimmerTimings::default()
        },
    );
    h.alarm.set(Some(ChronoDuration::hours(3)));
    h.trimmer.start();
    settle().await;

    let snap = h.trimmer.snapshot();
    assert_eq!(
        snap.sweep_task,
        TimerState::Armed {
            delay_ms: u64::MAX,
            due_at: DateTime::<Utc>::MAX_UTC,
        }
    );
    assert!(snap.cancel_task.is_armed());

    h.trimmer.stop();
    settle().await;
    assert_eq!(h.trimmer.snapshot().sweep_task, TimerState::Unarmed);
    assert_eq!(h.trimmer.stats().snapshot().stop_calls, 1);
}
