use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::Path;

pub mod config;
pub mod lock;
pub mod paths;

pub use config::{load_config, AppConfig, GithubConfig, RateLimitConfig};
pub use lock::{load_lock, save_lock};
pub use paths::WatchPaths;

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Exclusive per-prefix instance lock backed by `.commitwatch.lock`.
/// Two processes sharing one prefix would also share one API budget without
/// knowing it, so only one may run. Released when dropped.
pub struct InstanceLock {
    _file: fs::File,
}

impl InstanceLock {
    /// Try to acquire the lock (non-blocking).
    pub fn acquire(paths: &WatchPaths) -> anyhow::Result<Self> {
        fs::create_dir_all(&paths.prefix)?;
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&paths.instance_lock)
            .map_err(|e| {
                anyhow::anyhow!(
                    "cannot open lock file {}: {}",
                    paths.instance_lock.display(),
                    e
                )
            })?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "another commitwatch instance is running on this prefix ({})",
                paths.instance_lock.display()
            )
        })?;

        Ok(Self { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("test.txt");
        write_atomic(&path, b"hello world").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello world");
    }

    #[test]
    fn write_atomic_replaces_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("test.txt");
        write_atomic(&path, b"first version, longer").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn instance_lock_is_exclusive() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = WatchPaths::discover(tmp.path());

        let lock = InstanceLock::acquire(&paths).unwrap();
        assert!(InstanceLock::acquire(&paths).is_err());
        drop(lock);
        let _again = InstanceLock::acquire(&paths).unwrap();
    }
}
