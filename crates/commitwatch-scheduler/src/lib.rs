pub mod job;
pub mod reconcile;
pub mod registry;
pub mod sink;

pub use job::{JobDeps, WatcherJob};
pub use reconcile::reconcile;
pub use registry::WatcherRegistry;
pub use sink::{report_diff, CollectSink, LogSink, NotificationSink};
