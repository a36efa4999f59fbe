use std::time::Duration;

use anyhow::Result;
use commitwatch_core::{now_utc, WatchedProject};
use commitwatch_scheduler::reconcile;
use commitwatch_store::{load_config, load_lock, WatchPaths};

/// Execute `commitwatch check`
pub fn execute(paths: &WatchPaths, json: bool) -> Result<()> {
    let config = load_config(paths)?;
    let prior = load_lock(paths)?;
    let (resolved, diff) = reconcile(&config.watchers, &prior, config.reconcile, now_utc());

    let window = config.github.rate_limit.window();
    let demand = calls_per_window(&resolved, window);
    let quota = config.github.rate_limit.quota;

    if json {
        let out = serde_json::json!({
            "prefix": paths.prefix,
            "watchers": resolved.len(),
            "reconcile": config.reconcile,
            "diff": diff,
            "budget": {
                "quota": quota,
                "window_min": config.github.rate_limit.window_min,
                "demand": demand,
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Configuration OK: {} watcher(s) in {}", resolved.len(), paths.prefix.display());
    if diff.has_updates() {
        println!("\nOn the next run the lock file will change:");
        for line in commitwatch_notify::diff_summary(&diff).lines() {
            println!("  {line}");
        }
    } else {
        println!("Lock file is up to date.");
    }
    if !diff.retained.is_empty() {
        println!("\nKept from the lock file (not declared):");
        for id in &diff.retained {
            println!("  {id}");
        }
    }

    println!(
        "\nBudget: {demand} call(s) needed per {} min, quota {quota}",
        config.github.rate_limit.window_min
    );
    if demand > quota {
        println!("  warning: scans will be throttled; raise scan_interval_min or the quota");
    }
    Ok(())
}

/// Scans all projects would perform within one rate window.
fn calls_per_window(projects: &[WatchedProject], window: Duration) -> usize {
    projects
        .iter()
        .map(|p| {
            let interval = p.scan_interval().as_secs().max(1);
            (window.as_secs() / interval) as usize
        })
        .sum()
}
