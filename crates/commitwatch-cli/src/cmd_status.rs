use anyhow::Result;
use commitwatch_core::commit::format_commit_date;
use commitwatch_core::JobStatus;
use commitwatch_store::{load_lock, WatchPaths};

/// Execute `commitwatch status`
pub fn execute(paths: &WatchPaths, json: bool) -> Result<()> {
    let lock = load_lock(paths)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&lock)?);
        return Ok(());
    }

    if lock.is_empty() {
        println!("No watchers recorded in {}", paths.lock_json.display());
        return Ok(());
    }

    println!("{} watcher(s) in {}:", lock.len(), paths.lock_json.display());
    let width = lock.keys().map(|id| id.as_str().len()).max().unwrap_or(0);
    for entry in lock.values() {
        let status = match entry.status {
            JobStatus::Running => "running",
            JobStatus::Stopped => "stopped",
        };
        println!(
            "  {:<width$}  {:<7}  every {:>4} min  last scan {}",
            entry.project.as_str(),
            status,
            entry.scan_interval_min,
            format_commit_date(entry.last_scan_watermark),
        );
    }
    Ok(())
}
