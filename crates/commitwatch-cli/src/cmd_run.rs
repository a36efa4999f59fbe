use std::sync::Arc;

use anyhow::{Context, Result};
use commitwatch_core::{now_utc, WatchedProject};
use commitwatch_github::{GithubTransport, RateBudget, RateLimitedClient, RepositoryScanner};
use commitwatch_notify::NotifyConfig;
use commitwatch_scheduler::{reconcile, report_diff, NotificationSink, WatcherRegistry};
use commitwatch_store::{load_config, load_lock, save_lock, AppConfig, InstanceLock, WatchPaths};
use tokio_util::sync::CancellationToken;

use crate::sink::ChannelSink;

/// Execute `commitwatch run`
pub fn execute(paths: &WatchPaths) -> Result<()> {
    let _instance = InstanceLock::acquire(paths)?;
    let config = load_config(paths)?;
    let prior = load_lock(paths)?;

    let (resolved, diff) = reconcile(&config.watchers, &prior, config.reconcile, now_utc());

    let cancel = CancellationToken::new();

    // Handle Ctrl+C gracefully
    ctrlc_cancel(cancel.clone());

    let scanner = github_scanner(&config);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let sink: Arc<dyn NotificationSink> = Arc::new(ChannelSink::new(NotifyConfig::load(paths)));
        report_diff(sink.as_ref(), &diff).await;
        watch(paths, resolved, scanner, sink, cancel).await
    })
}

fn github_scanner(config: &AppConfig) -> Arc<RepositoryScanner> {
    let github = &config.github;
    let budget = RateBudget::new(github.rate_limit.quota, github.rate_limit.window());
    let client = Arc::new(RateLimitedClient::new(budget));
    let transport = Arc::new(GithubTransport::new(github.api_url.clone(), github.token()));
    if !transport.is_authenticated() {
        tracing::warn!("no GitHub token configured, requests are unauthenticated");
    }
    Arc::new(RepositoryScanner::new(client, transport, github.api_url.clone()))
}

/// Run the watchers until `cancel` fires. The lock file is rewritten on
/// start, after every successful scan, and once more with every watcher
/// stopped.
async fn watch(
    paths: &WatchPaths,
    resolved: Vec<WatchedProject>,
    scanner: Arc<RepositoryScanner>,
    sink: Arc<dyn NotificationSink>,
    cancel: CancellationToken,
) -> Result<()> {
    let budget = scanner.client().budget();
    let mut registry = WatcherRegistry::new(scanner, sink);
    for project in resolved {
        registry.add(project)?;
    }
    save_lock(paths, &registry.snapshot()).context("writing lock file")?;
    tracing::info!(
        watchers = registry.len(),
        quota = budget.quota,
        window_secs = budget.window.as_secs(),
        "watching"
    );

    let activity = registry.activity();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = activity.notified() => {
                if let Err(e) = save_lock(paths, &registry.snapshot()) {
                    tracing::warn!(error = %e, "lock checkpoint failed");
                }
            }
        }
    }

    tracing::info!("shutting down");
    let lock = registry.export_all(true);
    save_lock(paths, &lock).context("writing lock file")?;
    tracing::info!(path = %paths.lock_json.display(), "lock file written");
    Ok(())
}

fn ctrlc_cancel(cancel: CancellationToken) {
    let _ = ctrlc::set_handler(move || {
        cancel.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use commitwatch_core::{ApiKind, JobStatus, ProjectId};
    use commitwatch_github::MockTransport;
    use commitwatch_scheduler::CollectSink;
    use time::macros::datetime;
    use time::OffsetDateTime;

    const T0: OffsetDateTime = datetime!(2024-01-01 00:00:00 UTC);

    fn mock_scanner(mock: Arc<MockTransport>) -> Arc<RepositoryScanner> {
        let client = Arc::new(RateLimitedClient::new(RateBudget::default()));
        Arc::new(RepositoryScanner::new(client, mock, "https://api.github.com"))
    }

    #[tokio::test(start_paused = true)]
    async fn watch_checkpoints_and_stops_on_cancel() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = WatchPaths::discover(tmp.path());
        let id: ProjectId = "a/b".parse().unwrap();

        let mock = Arc::new(MockTransport::new());
        mock.push_json(serde_json::json!([{
            "sha": "0123456789",
            "commit": {
                "author": { "name": "Ada", "date": "2024-01-01T00:00:30Z" },
                "message": "update",
                "url": "https://api.github.com/repos/a/b/git/commits/0123456789"
            }
        }]));
        let sink = Arc::new(CollectSink::new());
        let cancel = CancellationToken::new();
        let project = WatchedProject {
            project: id.clone(),
            api: ApiKind::Github,
            scan_interval_min: 1,
            last_scan_watermark: T0,
        };

        let task = {
            let paths = paths.clone();
            let scanner = mock_scanner(mock.clone());
            let sink = sink.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { watch(&paths, vec![project], scanner, sink, cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        let lock = load_lock(&paths).unwrap();
        assert_eq!(lock[&id].last_scan_watermark, T0);
        assert_eq!(lock[&id].status, JobStatus::Running);

        // first tick at one minute
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sink.commits().len(), 1);
        let lock = load_lock(&paths).unwrap();
        assert!(lock[&id].last_scan_watermark > T0);
        assert_eq!(lock[&id].status, JobStatus::Running);

        cancel.cancel();
        task.await.unwrap().unwrap();
        let lock = load_lock(&paths).unwrap();
        assert_eq!(lock.len(), 1);
        assert!(lock.values().all(|w| w.status == JobStatus::Stopped));
        assert!(lock[&id].last_scan_watermark > T0);
        assert_eq!(mock.calls(), vec![(id, T0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_scan_leaves_lock_watermark() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = WatchPaths::discover(tmp.path());
        let id: ProjectId = "a/b".parse().unwrap();

        let mock = Arc::new(MockTransport::new());
        mock.push_error("http status: 502");
        let cancel = CancellationToken::new();
        let project = WatchedProject {
            project: id.clone(),
            api: ApiKind::Github,
            scan_interval_min: 1,
            last_scan_watermark: T0,
        };

        let task = {
            let paths = paths.clone();
            let scanner = mock_scanner(mock.clone());
            let cancel = cancel.clone();
            tokio::spawn(async move {
                watch(&paths, vec![project], scanner, Arc::new(CollectSink::new()), cancel).await
            })
        };

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(mock.calls().len(), 1);
        cancel.cancel();
        task.await.unwrap().unwrap();

        let lock = load_lock(&paths).unwrap();
        assert_eq!(lock[&id].last_scan_watermark, T0);
        assert_eq!(lock[&id].status, JobStatus::Stopped);
    }
}
