use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::project::{ApiKind, ProjectId, WatchedProject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Stopped,
}

/// Persistable projection of one watcher. One entry of the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherSnapshot {
    #[serde(default)]
    pub api: ApiKind,
    pub project: ProjectId,
    pub scan_interval_min: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_scan_watermark: OffsetDateTime,
    pub status: JobStatus,
}

/// The whole lock file: every watcher keyed by project id.
pub type LockSnapshot = BTreeMap<ProjectId, WatcherSnapshot>;

// ── Reconciliation report ──

/// What to do with projects present in the lock snapshot but no longer
/// declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Keep them running. Watchers are only ever added.
    #[default]
    Additive,
    /// Stop tracking them; they disappear from the next lock write.
    Prune,
}

/// A reconciled field whose declared value differs from the locked one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub declared: String,
    pub locked: String,
}

impl FieldChange {
    pub fn new(declared: impl ToString, locked: impl ToString) -> Self {
        Self {
            declared: declared.to_string(),
            locked: locked.to_string(),
        }
    }
}

/// What changed between the declared watch list and the lock snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationDiff {
    /// Declared projects with no lock entry, in declaration order.
    pub new_projects: Vec<WatchedProject>,
    /// Per project, per field name: declared vs locked value.
    pub changed_projects: BTreeMap<ProjectId, BTreeMap<String, FieldChange>>,
    /// Lock-only projects kept running.
    pub retained: Vec<ProjectId>,
    /// Lock-only projects dropped.
    pub removed: Vec<ProjectId>,
}

impl ReconciliationDiff {
    pub fn is_empty(&self) -> bool {
        self.new_projects.is_empty()
            && self.changed_projects.is_empty()
            && self.retained.is_empty()
            && self.removed.is_empty()
    }

    /// Anything worth telling the user about: projects added, edited or
    /// dropped. Retained projects alone are not.
    pub fn has_updates(&self) -> bool {
        !self.new_projects.is_empty()
            || !self.changed_projects.is_empty()
            || !self.removed.is_empty()
    }

    pub fn record_change(&mut self, project: &ProjectId, field: &str, change: FieldChange) {
        self.changed_projects
            .entry(project.clone())
            .or_default()
            .insert(field.to_string(), change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WatcherSnapshot {
        WatcherSnapshot {
            api: ApiKind::Github,
            project: "octo/cat".parse().unwrap(),
            scan_interval_min: 30,
            last_scan_watermark: time::macros::datetime!(2024-03-01 12:00:00 UTC),
            status: JobStatus::Running,
        }
    }

    #[test]
    fn lock_entry_layout() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["api"], "github");
        assert_eq!(v["project"], "octo/cat");
        assert_eq!(v["scan_interval_min"], 30);
        assert_eq!(v["last_scan_watermark"], "2024-03-01T12:00:00Z");
        assert_eq!(v["status"], "running");
    }

    #[test]
    fn lock_snapshot_keyed_by_project() {
        let mut lock = LockSnapshot::new();
        let s = sample();
        lock.insert(s.project.clone(), s);
        let json = serde_json::to_string(&lock).unwrap();
        assert!(json.starts_with(r#"{"octo/cat":"#));
        let back: LockSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lock);
    }

    #[test]
    fn diff_record_change_groups_by_project() {
        let mut diff = ReconciliationDiff::default();
        assert!(diff.is_empty());
        diff.retained.push("x/y".parse().unwrap());
        assert!(!diff.is_empty());
        assert!(!diff.has_updates());
        let id: ProjectId = "a/b".parse().unwrap();
        diff.record_change(&id, "scan_interval_min", FieldChange::new(45, 30));
        diff.record_change(&id, "api", FieldChange::new("github", "gitlab"));
        assert!(diff.has_updates());
        let fields = &diff.changed_projects[&id];
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["scan_interval_min"], FieldChange::new("45", "30"));
    }
}
