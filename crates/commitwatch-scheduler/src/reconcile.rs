//! Startup merge of the declared watch list against the lock snapshot.

use std::collections::BTreeSet;

use commitwatch_core::{
    FieldChange, LockSnapshot, ReconcilePolicy, ReconciliationDiff, WatchedProject,
    WatchedProjectSpec,
};
use time::OffsetDateTime;

/// Resolve the set of projects to watch.
///
/// Declared projects come first, in declaration order. A project already in
/// `prior` keeps its watermark and adopts the declared parameters; every
/// differing field is recorded as `(declared, locked)`. Lock-only projects
/// are appended (and listed in `retained`) under [`ReconcilePolicy::Additive`],
/// or listed in `removed` under [`ReconcilePolicy::Prune`].
///
/// Pure: `now` seeds fresh watermarks and caps locked ones that lie in the
/// future.
pub fn reconcile(
    declared: &[WatchedProjectSpec],
    prior: &LockSnapshot,
    policy: ReconcilePolicy,
    now: OffsetDateTime,
) -> (Vec<WatchedProject>, ReconciliationDiff) {
    let mut resolved = Vec::with_capacity(declared.len());
    let mut diff = ReconciliationDiff::default();

    for spec in declared {
        let Some(locked) = prior.get(&spec.project) else {
            let project = WatchedProject::fresh(spec, now);
            diff.new_projects.push(project.clone());
            resolved.push(project);
            continue;
        };

        if spec.api != locked.api {
            diff.record_change(&spec.project, "api", FieldChange::new(spec.api, locked.api));
        }
        if spec.scan_interval_min != locked.scan_interval_min {
            diff.record_change(
                &spec.project,
                "scan_interval_min",
                FieldChange::new(spec.scan_interval_min, locked.scan_interval_min),
            );
        }

        resolved.push(WatchedProject {
            project: spec.project.clone(),
            api: spec.api,
            scan_interval_min: spec.scan_interval_min,
            last_scan_watermark: locked.last_scan_watermark.min(now),
        });
    }

    let declared_ids: BTreeSet<_> = declared.iter().map(|s| &s.project).collect();
    for (id, locked) in prior {
        if declared_ids.contains(id) {
            continue;
        }
        match policy {
            ReconcilePolicy::Additive => {
                let mut project = WatchedProject::from(locked);
                project.last_scan_watermark = project.last_scan_watermark.min(now);
                resolved.push(project);
                diff.retained.push(id.clone());
            }
            ReconcilePolicy::Prune => diff.removed.push(id.clone()),
        }
    }

    (resolved, diff)
}
