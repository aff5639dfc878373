//! Sweep command: run a single sweep right now.
//!
//! Without `--execute` the killer runs in dry-run mode, so this only reports
//! which packages a sweep would signal.

use bgtrim::{sweep_processes, ProcessEnumerator, SweepStats};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::wiring;

pub fn command_sweep(
    config: &Config,
    execute: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let stats = Arc::new(SweepStats::new());
    let scanner = wiring::scanner(config);
    let dry_run = !execute || config.dry_run.unwrap_or(false);
    let killer = wiring::killer(config, Arc::clone(&stats), dry_run)?;
    let policy = &config.protected;

    println!(
        "🧹 bgtrim sweep (uid {}, signal {}, {})",
        config.effective_target_uid(),
        killer.signal(),
        if dry_run { "dry run" } else { "EXECUTING" }
    );

    if verbose {
        println!("\n🛡️  Protected processes:");
        for process in scanner.list_running_processes() {
            let Some(package) = process.primary_package() else {
                continue;
            };
            if let Some(reason) = policy.reason(package) {
                println!("   {:>7}  {:40} {}", process.pid, package, reason);
            }
        }
    }

    let started = Instant::now();
    let report = sweep_processes(&scanner, &killer, policy);
    stats.record_sweep(&report, started.elapsed().as_secs_f64() * 1000.0);

    println!(
        "\n{} {} package(s):",
        if dry_run { "Would signal" } else { "Signalled" },
        report.killed.len()
    );
    for name in &report.killed {
        println!("   • {}", name);
    }

    println!("\n📋 Summary:");
    println!("   inspected:  {}", report.inspected);
    println!("   protected:  {}", report.protected);
    println!("   no package: {}", report.skipped_no_package);
    println!("   killed:     {}", report.killed.len());
    let failures = stats.snapshot().kill_failures;
    if failures > 0 {
        println!("   ⚠️  {} signal(s) could not be delivered", failures);
    }

    Ok(())
}
