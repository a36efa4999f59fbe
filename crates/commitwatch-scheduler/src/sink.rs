use std::sync::Mutex;

use commitwatch_core::{NormalizedCommit, ReconciliationDiff};

/// Delivery of scan results and startup reports. Errors are reported back to
/// the caller, which logs them; they never stop a watcher.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver_commits(&self, commits: &[NormalizedCommit]) -> anyhow::Result<()>;
    async fn deliver_diff(&self, diff: &ReconciliationDiff) -> anyhow::Result<()>;
}

/// Send a reconciliation report unless nothing was added, edited or
/// dropped. Failures are logged.
pub async fn report_diff(sink: &dyn NotificationSink, diff: &ReconciliationDiff) {
    for project in &diff.retained {
        tracing::debug!(%project, "watcher kept from lock file");
    }
    if !diff.has_updates() {
        return;
    }
    tracing::info!(
        new = diff.new_projects.len(),
        changed = diff.changed_projects.len(),
        retained = diff.retained.len(),
        removed = diff.removed.len(),
        "lock file updated"
    );
    if let Err(e) = sink.deliver_diff(diff).await {
        tracing::warn!(error = %e, "failed to deliver configuration update");
    }
}

/// Writes everything to the log.
pub struct LogSink;

#[async_trait::async_trait]
impl NotificationSink for LogSink {
    async fn deliver_commits(&self, commits: &[NormalizedCommit]) -> anyhow::Result<()> {
        for c in commits {
            tracing::info!(
                project = %c.project,
                sha = c.short_id(),
                author = %c.author,
                date = %c.committed_at_display,
                "{}",
                c.title()
            );
        }
        Ok(())
    }

    async fn deliver_diff(&self, diff: &ReconciliationDiff) -> anyhow::Result<()> {
        for p in &diff.new_projects {
            tracing::info!(project = %p.project, interval_min = p.scan_interval_min, "new watcher");
        }
        for (project, fields) in &diff.changed_projects {
            for (field, change) in fields {
                tracing::info!(%project, field, from = %change.locked, to = %change.declared, "watcher updated");
            }
        }
        Ok(())
    }
}

/// Collects deliveries in memory (for testing).
#[derive(Default)]
pub struct CollectSink {
    commits: Mutex<Vec<NormalizedCommit>>,
    diffs: Mutex<Vec<ReconciliationDiff>>,
    fail: bool,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records deliveries and then reports failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn commits(&self) -> Vec<NormalizedCommit> {
        self.commits.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn diffs(&self) -> Vec<ReconciliationDiff> {
        self.diffs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn outcome(&self) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("sink unavailable");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationSink for CollectSink {
    async fn deliver_commits(&self, commits: &[NormalizedCommit]) -> anyhow::Result<()> {
        self.commits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(commits);
        self.outcome()
    }

    async fn deliver_diff(&self, diff: &ReconciliationDiff) -> anyhow::Result<()> {
        self.diffs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(diff.clone());
        self.outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commitwatch_core::FieldChange;

    #[tokio::test]
    async fn empty_diff_is_not_delivered() {
        let sink = CollectSink::new();
        report_diff(&sink, &ReconciliationDiff::default()).await;
        assert!(sink.diffs().is_empty());
    }

    #[tokio::test]
    async fn retained_only_diff_is_not_delivered() {
        let sink = CollectSink::new();
        let diff = ReconciliationDiff {
            retained: vec!["a/b".parse().unwrap()],
            ..Default::default()
        };
        report_diff(&sink, &diff).await;
        assert!(sink.diffs().is_empty());
    }

    #[tokio::test]
    async fn diff_delivery_failure_is_swallowed() {
        let sink = CollectSink::failing();
        let mut diff = ReconciliationDiff::default();
        diff.record_change(&"a/b".parse().unwrap(), "scan_interval_min", FieldChange::new(45, 30));
        report_diff(&sink, &diff).await;
        assert_eq!(sink.diffs(), vec![diff]);
    }
}
