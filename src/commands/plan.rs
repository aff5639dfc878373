//! Plan command: what `start()` would arm right now, without arming anything.

use bgtrim::{
    due_at, plan_sweep, time_until_alarm_ms, AlarmSource, SettingsStore, SweepPlan,
    SLEEP_MODE_KEY,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::ConfigFormat;
use crate::config::Config;
use crate::wiring;

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub now: DateTime<Utc>,
    pub next_alarm: Option<DateTime<Utc>>,
    pub sweep_due: DateTime<Utc>,
    pub cancel_due: Option<DateTime<Utc>>,
    // Must stay last: TOML tables follow plain values.
    pub plan: SweepPlan,
}

pub fn build_plan_report(config: &Config) -> Result<PlanReport, Box<dyn std::error::Error>> {
    let alarms = wiring::alarm_schedule(config)?;
    let settings = wiring::settings_store(config);
    let timings = config.timings.to_timings();

    let now = Utc::now();
    let next_alarm = alarms.next_alarm_trigger_time();
    let sleep_mode = settings.get_bool(SLEEP_MODE_KEY);
    let plan = plan_sweep(time_until_alarm_ms(next_alarm, now), sleep_mode, &timings);

    let after = |ms: u64| due_at(now, ms);
    Ok(PlanReport {
        now,
        next_alarm,
        sweep_due: after(plan.sweep_delay_ms),
        cancel_due: plan.cancel_delay_ms.map(after),
        plan,
    })
}

pub fn command_plan(
    config: &Config,
    format: ConfigFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = build_plan_report(config)?;
    let out = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&report)?,
        ConfigFormat::Toml => toml::to_string_pretty(&report)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&report)?,
    };
    println!("{}", out);
    Ok(())
}
