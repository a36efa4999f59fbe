use std::sync::Arc;

use commitwatch_core::{NormalizedCommit, ReconciliationDiff};
use commitwatch_notify::{NotifyConfig, NotifyEvent};
use commitwatch_scheduler::{LogSink, NotificationSink};

/// Routes scheduler output to the configured notification channels.
/// Without channels, everything goes to the log.
pub struct ChannelSink {
    config: Arc<NotifyConfig>,
}

impl ChannelSink {
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    async fn dispatch(&self, event: NotifyEvent) -> anyhow::Result<()> {
        let config = Arc::clone(&self.config);
        // ureq blocks
        tokio::task::spawn_blocking(move || commitwatch_notify::dispatch(&config, &event)).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationSink for ChannelSink {
    async fn deliver_commits(&self, commits: &[NormalizedCommit]) -> anyhow::Result<()> {
        if self.config.channels.is_empty() {
            return LogSink.deliver_commits(commits).await;
        }
        self.dispatch(NotifyEvent::NewCommits(commits.to_vec())).await
    }

    async fn deliver_diff(&self, diff: &ReconciliationDiff) -> anyhow::Result<()> {
        if self.config.channels.is_empty() {
            return LogSink.deliver_diff(diff).await;
        }
        self.dispatch(NotifyEvent::ConfigUpdate(diff.clone())).await
    }
}
