//! Alarm schedule used as the trimmer's [`AlarmSource`].
//!
//! Alarms are either one-shot (`kind: once`, an RFC 3339 timestamp) or daily
//! (`kind: daily`, a local wall-clock time, optionally restricted to some
//! weekdays). They come from the daemon configuration and, optionally, from
//! an alarm file that is re-read on every lookup so that an external alarm
//! clock can rewrite it at any time.
//!
//! ```yaml
//! alarms:
//!   - id: wake
//!     kind: daily
//!     time: "07:30"
//!     days: [Mon, Tue, Wed, Thu, Fri]
//!   - id: flight
//!     kind: once
//!     at: "2026-10-20T05:15:00+02:00"
//! ```

use chrono::{
    DateTime, Datelike, Days, FixedOffset, Local, LocalResult, NaiveTime, TimeZone, Utc, Weekday,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::platform::AlarmSource;

/// Errors raised while loading alarm definitions.
#[derive(Debug, thiserror::Error)]
pub enum AlarmError {
    #[error("unable to read alarm file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid alarm file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("alarm '{id}': missing field '{field}' for kind '{kind}'")]
    MissingField {
        id: String,
        kind: &'static str,
        field: &'static str,
    },

    #[error("alarm '{id}': invalid time '{value}', expected HH:MM or HH:MM:SS")]
    InvalidTime { id: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    Once,
    Daily,
}

/// Alarm as written in configuration or an alarm file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub kind: AlarmKind,
    /// Trigger instant for `once` alarms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<FixedOffset>>,
    /// Local wall-clock time for `daily` alarms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Weekdays a `daily` alarm rings on; empty means every day.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<Weekday>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct AlarmFile {
    #[serde(default)]
    alarms: Vec<AlarmEntry>,
}

/// Validated alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub id: String,
    pub enabled: bool,
    pub schedule: Schedule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Once(DateTime<Utc>),
    Daily { time: NaiveTime, days: Vec<Weekday> },
}

impl AlarmEntry {
    /// Validates the entry; `index` names anonymous alarms.
    pub fn to_alarm(&self, index: usize) -> Result<Alarm, AlarmError> {
        let id = self
            .id
            .clone()
            .unwrap_or_else(|| format!("alarm-{}", index + 1));

        let schedule = match self.kind {
            AlarmKind::Once => {
                let at = self.at.ok_or_else(|| AlarmError::MissingField {
                    id: id.clone(),
                    kind: "once",
                    field: "at",
                })?;
                Schedule::Once(at.with_timezone(&Utc))
            }
            AlarmKind::Daily => {
                let raw = self.time.as_deref().ok_or_else(|| AlarmError::MissingField {
                    id: id.clone(),
                    kind: "daily",
                    field: "time",
                })?;
                let time = parse_local_time(raw).ok_or_else(|| AlarmError::InvalidTime {
                    id: id.clone(),
                    value: raw.to_string(),
                })?;
                Schedule::Daily {
                    time,
                    days: self.days.clone(),
                }
            }
        };

        Ok(Alarm {
            id,
            enabled: self.enabled,
            schedule,
        })
    }
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_local_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

impl Alarm {
    /// First occurrence strictly after `now`, evaluated in `now`'s time zone.
    pub fn next_occurrence<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
        if !self.enabled {
            return None;
        }
        match &self.schedule {
            Schedule::Once(at) => (*at > now.with_timezone(&Utc)).then_some(*at),
            Schedule::Daily { time, days } => {
                let tz = now.timezone();
                let today = now.date_naive();
                // 8 days covers "later today" through "same weekday next week".
                (0..=7u64).find_map(|offset| {
                    let date = today.checked_add_days(Days::new(offset))?;
                    if !days.is_empty() && !days.contains(&date.weekday()) {
                        return None;
                    }
                    let candidate = match tz.from_local_datetime(&date.and_time(*time)) {
                        LocalResult::Single(t) => t,
                        LocalResult::Ambiguous(earliest, _) => earliest,
                        // Skipped by a DST gap.
                        LocalResult::None => return None,
                    };
                    (candidate > *now).then(|| candidate.with_timezone(&Utc))
                })
            }
        }
    }
}

/// Parses a list of entries, failing on the first invalid one.
pub fn parse_entries(entries: &[AlarmEntry]) -> Result<Vec<Alarm>, AlarmError> {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| e.to_alarm(i))
        .collect()
}

/// Loads alarms from a YAML, JSON or TOML file (by extension, YAML default).
pub fn load_alarm_file(path: &Path) -> Result<Vec<Alarm>, AlarmError> {
    let content = fs::read_to_string(path).map_err(|source| AlarmError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |message: String| AlarmError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let file: AlarmFile = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
        Some("toml") => toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
        _ => serde_yaml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
    };
    parse_entries(&file.alarms)
}

/// Configured alarms plus an optional alarm file.
#[derive(Debug, Clone, Default)]
pub struct AlarmSchedule {
    alarms: Vec<Alarm>,
    alarm_file: Option<PathBuf>,
}

impl AlarmSchedule {
    pub fn new(alarms: Vec<Alarm>, alarm_file: Option<PathBuf>) -> Self {
        Self { alarms, alarm_file }
    }

    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn alarm_file(&self) -> Option<&Path> {
        self.alarm_file.as_deref()
    }

    /// Earliest upcoming trigger across configured and file alarms.
    ///
    /// An unreadable alarm file is logged and treated as empty.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
        let from_file = match &self.alarm_file {
            Some(path) if path.exists() => match load_alarm_file(path) {
                Ok(alarms) => alarms,
                Err(e) => {
                    warn!("Ignoring alarm file: {}", e);
                    Vec::new()
                }
            },
            Some(path) => {
                debug!("Alarm file {} does not exist", path.display());
                Vec::new()
            }
            None => Vec::new(),
        };

        self.alarms
            .iter()
            .chain(from_file.iter())
            .filter_map(|a| a.next_occurrence(now))
            .min()
    }
}

impl AlarmSource for AlarmSchedule {
    fn next_alarm_trigger_time(&self) -> Option<DateTime<Utc>> {
        self.next_after(&Local::now())
    }
}
