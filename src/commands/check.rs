//! Check command implementation.
//!
//! Validates system requirements and configuration.

use bgtrim::process::collect_proc_entries;
use bgtrim::{AlarmSource, FileSettingsStore, ProcessEnumerator, SLEEP_MODE_KEY};

use crate::config::{validate_effective_config, Config};
use crate::startup_checks::validate_requirements;
use crate::wiring;

/// Validates system requirements and configuration.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 bgtrim - System Check");
    println!("========================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📁 Checking process access...");
    match validate_requirements(config) {
        Ok(_) => println!("   ✅ Runtime requirements met"),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }
    let scanner = wiring::scanner(config);
    let visible = collect_proc_entries(scanner.root(), None).len();
    let owned = scanner.list_running_processes().len();
    println!(
        "   ✅ {} processes visible, {} owned by uid {}",
        visible,
        owned,
        config.effective_target_uid()
    );

    println!("\n😴 Checking settings...");
    let settings = wiring::settings_store(config);
    report_settings(&settings, &mut all_ok);

    println!("\n⏰ Checking alarms...");
    match wiring::alarm_schedule(config) {
        Ok(schedule) => {
            println!(
                "   ✅ {} configured alarm(s){}",
                schedule.alarms().len(),
                schedule
                    .alarm_file()
                    .map(|p| format!(", alarm file {}", p.display()))
                    .unwrap_or_default()
            );
            match schedule.next_alarm_trigger_time() {
                Some(at) => println!("   ✅ Next alarm: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("   ⚠️  No upcoming alarm"),
            }
        }
        Err(e) => {
            println!("   ❌ Alarm configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - trimmer is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}

fn report_settings(settings: &FileSettingsStore, all_ok: &mut bool) {
    let Some(path) = settings.path() else {
        println!("   ⚠️  No settings file location (no home directory); sleep mode is off");
        return;
    };
    match settings.lookup(SLEEP_MODE_KEY) {
        Ok(Some(value)) => println!(
            "   ✅ {}: {} = {}",
            path.display(),
            SLEEP_MODE_KEY,
            value
        ),
        Ok(None) => println!(
            "   ⚠️  {}: {} not set, sleep mode is off",
            path.display(),
            SLEEP_MODE_KEY
        ),
        Err(e) => {
            println!("   ❌ {}", e);
            *all_ok = false;
        }
    }
}
