use std::sync::{Arc, Mutex};
use std::time::Duration;

use commitwatch_core::{
    ApiKind, JobStatus, ProjectId, ScanError, SchedulerError, WatchedProject, WatcherSnapshot,
};
use commitwatch_github::RepositoryScanner;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::sink::NotificationSink;

/// tokio's interval panics on a zero period.
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Collaborators shared by every job of a registry.
#[derive(Clone)]
pub struct JobDeps {
    pub scanner: Arc<RepositoryScanner>,
    pub sink: Arc<dyn NotificationSink>,
    /// Signalled after commits were delivered, so the lock can be checkpointed.
    pub activity: Arc<Notify>,
}

struct TimerHandle {
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

enum JobState {
    Idle,
    Running(TimerHandle),
    Retired,
}

/// One recurring scan of one project.
///
/// `Idle` → `start` → `Running` → `stop` → `Retired`. A retired job cannot be
/// started again; build a new one from its exported snapshot instead.
pub struct WatcherJob {
    project: ProjectId,
    api: ApiKind,
    scan_interval_min: u64,
    watermark: Arc<Mutex<OffsetDateTime>>,
    deps: JobDeps,
    state: JobState,
}

impl WatcherJob {
    pub fn new(project: WatchedProject, deps: JobDeps) -> Self {
        Self {
            watermark: Arc::new(Mutex::new(project.last_scan_watermark)),
            project: project.project,
            api: project.api,
            scan_interval_min: project.scan_interval_min,
            deps,
            state: JobState::Idle,
        }
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    pub fn status(&self) -> JobStatus {
        match self.state {
            JobState::Running(_) => JobStatus::Running,
            JobState::Idle | JobState::Retired => JobStatus::Stopped,
        }
    }

    pub fn watermark(&self) -> OffsetDateTime {
        read_watermark(&self.watermark)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_min.saturating_mul(60))
    }

    /// Install the recurring trigger. The first scan happens one interval
    /// from now. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            JobState::Running(_) => return Err(SchedulerError::AlreadyRunning(self.project.clone())),
            JobState::Retired => return Err(SchedulerError::Retired(self.project.clone())),
            JobState::Idle => {}
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_timer(
            self.project.clone(),
            self.scan_interval().max(MIN_PERIOD),
            Arc::clone(&self.watermark),
            self.deps.clone(),
            cancel.clone(),
        ));
        self.state = JobState::Running(TimerHandle {
            cancel,
            _task: task,
        });
        tracing::info!(project = %self.project, interval_min = self.scan_interval_min, "watcher started");
        Ok(())
    }

    /// Cancel future firings. Idempotent. An in-flight scan runs to completion
    /// but its result is dropped.
    pub fn stop(&mut self) {
        if !matches!(self.state, JobState::Running(_)) {
            return;
        }
        if let JobState::Running(handle) = std::mem::replace(&mut self.state, JobState::Retired) {
            handle.cancel.cancel();
            tracing::info!(project = %self.project, "watcher stopped");
        }
    }

    pub fn export(&self) -> WatcherSnapshot {
        WatcherSnapshot {
            api: self.api,
            project: self.project.clone(),
            scan_interval_min: self.scan_interval_min,
            last_scan_watermark: self.watermark(),
            status: self.status(),
        }
    }
}

impl Drop for WatcherJob {
    fn drop(&mut self) {
        if let JobState::Running(handle) = &self.state {
            handle.cancel.cancel();
        }
    }
}

fn read_watermark(watermark: &Mutex<OffsetDateTime>) -> OffsetDateTime {
    *watermark.lock().unwrap_or_else(|e| e.into_inner())
}

/// Move the watermark forward to `to`; never backwards.
pub(crate) fn advance_watermark(watermark: &Mutex<OffsetDateTime>, to: OffsetDateTime) {
    let mut current = watermark.lock().unwrap_or_else(|e| e.into_inner());
    if to > *current {
        *current = to;
    }
}

/// The scan is awaited inside the loop, so a slow fetch delays only this
/// project's next tick; ticks missed meanwhile are skipped.
async fn run_timer(
    project: ProjectId,
    period: Duration,
    watermark: Arc<Mutex<OffsetDateTime>>,
    deps: JobDeps,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tracing::debug!(%project, "watcher needs a refresh");
        let since = read_watermark(&watermark);
        let result = deps.scanner.scan(&project, since).await;

        if cancel.is_cancelled() {
            tracing::debug!(%project, "watcher stopped during scan, result discarded");
            break;
        }

        match result {
            Ok(commits) => {
                advance_watermark(&watermark, commitwatch_core::now_utc());
                if commits.is_empty() {
                    continue;
                }
                tracing::info!(%project, count = commits.len(), "new commits found");
                if let Err(e) = deps.sink.deliver_commits(&commits).await {
                    tracing::warn!(%project, error = %e, "failed to deliver commit notification");
                }
                deps.activity.notify_one();
            }
            Err(ScanError::Throttled { retry_after }) => {
                tracing::warn!(
                    %project,
                    retry_after_s = retry_after.as_secs(),
                    "too many requests performed, skipping this tick"
                );
            }
            Err(e) => {
                tracing::warn!(%project, error = %e, "scan failed, watermark unchanged");
            }
        }
    }
}
