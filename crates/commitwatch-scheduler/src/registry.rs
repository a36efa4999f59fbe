use std::collections::BTreeMap;
use std::sync::Arc;

use commitwatch_core::{LockSnapshot, ProjectId, SchedulerError, WatchedProject};
use commitwatch_github::RepositoryScanner;
use tokio::sync::Notify;

use crate::job::{JobDeps, WatcherJob};
use crate::sink::NotificationSink;

/// The live set of watcher jobs, at most one per project.
pub struct WatcherRegistry {
    jobs: BTreeMap<ProjectId, WatcherJob>,
    deps: JobDeps,
}

impl WatcherRegistry {
    pub fn new(scanner: Arc<RepositoryScanner>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            jobs: BTreeMap::new(),
            deps: JobDeps {
                scanner,
                sink,
                activity: Arc::new(Notify::new()),
            },
        }
    }

    /// Woken whenever a job delivered new commits and its watermark moved.
    pub fn activity(&self) -> Arc<Notify> {
        Arc::clone(&self.deps.activity)
    }

    /// Build and start a job for `project`.
    pub fn add(&mut self, project: WatchedProject) -> Result<(), SchedulerError> {
        if self.jobs.contains_key(&project.project) {
            return Err(SchedulerError::AlreadyRegistered(project.project));
        }
        let id = project.project.clone();
        let mut job = WatcherJob::new(project, self.deps.clone());
        job.start()?;
        self.jobs.insert(id, job);
        Ok(())
    }

    pub fn contains(&self, project: &ProjectId) -> bool {
        self.jobs.contains_key(project)
    }

    pub fn get(&self, project: &ProjectId) -> Option<&WatcherJob> {
        self.jobs.get(project)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Current state of every job, leaving them running.
    pub fn snapshot(&self) -> LockSnapshot {
        self.jobs
            .iter()
            .map(|(id, job)| (id.clone(), job.export()))
            .collect()
    }

    /// Export every job, optionally stopping them first. With `stop` the
    /// exported statuses read `stopped`.
    pub fn export_all(&mut self, stop: bool) -> LockSnapshot {
        if stop {
            self.stop_all();
        }
        self.snapshot()
    }

    pub fn stop_all(&mut self) {
        for job in self.jobs.values_mut() {
            job.stop();
        }
    }
}
