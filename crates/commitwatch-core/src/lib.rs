pub mod commit;
pub mod error;
pub mod project;
pub mod snapshot;

pub use commit::NormalizedCommit;
pub use error::{ConfigError, ScanError, SchedulerError};
pub use project::{ApiKind, ProjectId, WatchedProject, WatchedProjectSpec};
pub use snapshot::{
    FieldChange, JobStatus, LockSnapshot, ReconcilePolicy, ReconciliationDiff, WatcherSnapshot,
};

/// Current UTC time, truncated to whole seconds.
///
/// Watermarks and lock entries are stored at second precision so that a
/// value survives a round trip through the lock file unchanged.
pub fn now_utc() -> time::OffsetDateTime {
    let now = time::OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}
