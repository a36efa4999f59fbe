use std::time::Duration;

use crate::project::ProjectId;

/// Failure of a single scan attempt. Never fatal to the scheduler: the
/// owning job logs it and waits for its next tick with the watermark unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// The shared call budget is exhausted.
    #[error("rate limit reached, retry in {}s", retry_after.as_secs())]
    Throttled { retry_after: Duration },
    /// Upstream data does not have the expected shape.
    #[error("malformed data: {0}")]
    MalformedData(String),
    /// Network or HTTP level failure.
    #[error("transport failure: {0}")]
    TransportFailure(String),
}

impl ScanError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, ScanError::Throttled { .. })
    }
}

/// Misuse of the registry or of a job's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("unable to add watcher \"{0}\": already registered")]
    AlreadyRegistered(ProjectId),
    #[error("unable to start watcher \"{0}\": timer already running")]
    AlreadyRunning(ProjectId),
    #[error("watcher \"{0}\" was stopped and cannot be restarted")]
    Retired(ProjectId),
}

/// Startup configuration errors. All of them abort initialization before any
/// timer is started.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing configuration file \"{0}\"")]
    Missing(String),
    #[error("missing the critical `{0}` configuration section")]
    MissingSection(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("project \"{0}\" is declared more than once")]
    DuplicateProject(ProjectId),
    #[error("project \"{0}\": scan_interval_min must be greater than zero")]
    InvalidInterval(ProjectId),
}
