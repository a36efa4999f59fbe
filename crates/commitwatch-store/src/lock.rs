use anyhow::{bail, Context, Result};
use commitwatch_core::LockSnapshot;

use crate::paths::WatchPaths;

/// Load the lock snapshot. A missing file is a first run: empty snapshot.
///
/// Every entry must be keyed by its own `project`.
pub fn load_lock(paths: &WatchPaths) -> Result<LockSnapshot> {
    let path = &paths.lock_json;
    if !path.exists() {
        return Ok(LockSnapshot::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading lock: {}", path.display()))?;
    let lock: LockSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("parsing lock: {}", path.display()))?;
    if let Some((key, entry)) = lock.iter().find(|(key, entry)| **key != entry.project) {
        bail!(
            "parsing lock: {}: entry '{key}' records project '{}'",
            path.display(),
            entry.project
        );
    }
    Ok(lock)
}

/// Save the lock snapshot atomically (write to a temp file, then rename).
pub fn save_lock(paths: &WatchPaths, lock: &LockSnapshot) -> Result<()> {
    let path = &paths.lock_json;
    let data = serde_json::to_string_pretty(lock)?;
    crate::write_atomic(path, data.as_bytes())
        .with_context(|| format!("saving lock: {}", path.display()))?;
    tracing::debug!(path = %path.display(), watchers = lock.len(), "lock file written");
    Ok(())
}
