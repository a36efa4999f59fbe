use std::path::{Path, PathBuf};

/// Environment variable overriding the default config prefix.
pub const PREFIX_ENV: &str = "COMMITWATCH_PREFIX";

/// All well-known paths under the config prefix.
#[derive(Debug, Clone)]
pub struct WatchPaths {
    pub prefix: PathBuf,
    pub config_json: PathBuf,
    pub lock_json: PathBuf,
    pub instance_lock: PathBuf,
}

impl WatchPaths {
    /// Derive all paths from a prefix directory. Pure computation, no I/O.
    pub fn discover(prefix: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into();
        Self {
            config_json: prefix.join("config.json"),
            lock_json: prefix.join("config.lock.json"),
            instance_lock: prefix.join(".commitwatch.lock"),
            prefix,
        }
    }

    /// Resolve the prefix: explicit argument, then `COMMITWATCH_PREFIX`,
    /// then the per-user config dir.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(p) = explicit {
            return Self::discover(p);
        }
        if let Some(p) = std::env::var_os(PREFIX_ENV).filter(|v| !v.is_empty()) {
            return Self::discover(PathBuf::from(p));
        }
        Self::discover(default_prefix())
    }
}

/// `~/.config/commitwatch` on Linux, the platform config dir elsewhere.
/// Falls back to `./.commitwatch` when no home directory is known.
pub fn default_prefix() -> PathBuf {
    if let Some(dir) = dirs::config_dir() {
        dir.join("commitwatch")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".commitwatch")
    } else {
        PathBuf::from(".commitwatch")
    }
}
