//! Integration tests for alarm files and the alarm schedule.

use bgtrim::alarm::load_alarm_file;
use bgtrim::{AlarmError, AlarmSchedule, AlarmSource};
use chrono::{Duration, TimeZone, Utc};
use std::fs;

#[test]
fn test_yaml_alarm_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alarms.yaml");
    fs::write(
        &path,
        r#"
alarms:
  - id: flight
    kind: once
    at: "2026-10-20T05:15:00+02:00"
  - kind: daily
    time: "07:30"
    days: [Mon, Tue]
    enabled: false
"#,
    )
    .unwrap();

    let alarms = load_alarm_file(&path).unwrap();
    assert_eq!(alarms.len(), 2);
    assert_eq!(alarms[0].id, "flight");
    assert_eq!(alarms[1].id, "alarm-2");
    assert!(!alarms[1].enabled);
}

#[test]
fn test_json_and_toml_alarm_files() {
    let dir = tempfile::tempdir().unwrap();
    let json = dir.path().join("alarms.json");
    fs::write(
        &json,
        r#"{"alarms": [{"kind": "daily", "time": "06:45:30"}]}"#,
    )
    .unwrap();
    assert_eq!(load_alarm_file(&json).unwrap().len(), 1);

    let toml = dir.path().join("alarms.toml");
    fs::write(
        &toml,
        "[[alarms]]\nkind = \"once\"\nat = \"2026-10-20T05:15:00Z\"\n",
    )
    .unwrap();
    assert_eq!(load_alarm_file(&toml).unwrap().len(), 1);
}

#[test]
fn test_invalid_alarm_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alarms.yaml");
    fs::write(&path, "alarms:\n  - kind: daily\n    time: \"25:99\"\n").unwrap();
    assert!(matches!(
        load_alarm_file(&path),
        Err(AlarmError::InvalidTime { .. })
    ));

    assert!(matches!(
        load_alarm_file(&dir.path().join("missing.yaml")),
        Err(AlarmError::Io { .. })
    ));
}

#[test]
fn test_schedule_rereads_alarm_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alarms.yaml");
    let schedule = AlarmSchedule::new(Vec::new(), Some(path.clone()));
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 22, 0, 0).unwrap();

    // A missing alarm file means no alarm.
    assert_eq!(schedule.next_after(&now), None);

    fs::write(
        &path,
        "alarms:\n  - kind: once\n    at: \"2026-10-17T06:00:00Z\"\n",
    )
    .unwrap();
    assert_eq!(schedule.next_after(&now), Some(now + Duration::hours(8)));

    fs::write(&path, "alarms: [").unwrap();
    assert_eq!(schedule.next_after(&now), None, "broken file is ignored");
}

#[test]
fn test_alarm_source_skips_past_alarms() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alarms.yaml");
    let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
    let future = (Utc::now() + Duration::hours(2)).to_rfc3339();
    let content = format!(
        "alarms:\n  - kind: once\n    at: \"{past}\"\n  - kind: once\n    at: \"{future}\"\n"
    );
    fs::write(&path, content).unwrap();

    let schedule = AlarmSchedule::new(Vec::new(), Some(path));
    let next = schedule.next_alarm_trigger_time().unwrap();
    assert!(next > Utc::now());
}
