use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::snapshot::{JobStatus, WatcherSnapshot};

// ── Project identifier ──

/// A repository identifier in `owner/repo` form.
///
/// This is the unique key across the whole system: registry entries, lock
/// file entries and reconciliation reports are all keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(owner: &str, repo: &str) -> Result<Self, InvalidProjectId> {
        format!("{owner}/{repo}").parse()
    }

    pub fn owner(&self) -> &str {
        self.0.split_once('/').map_or("", |(owner, _)| owner)
    }

    pub fn repo(&self) -> &str {
        self.0.split_once('/').map_or("", |(_, repo)| repo)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid project id \"{0}\": expected `owner/repo`")]
pub struct InvalidProjectId(pub String);

impl FromStr for ProjectId {
    type Err = InvalidProjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((owner, repo)) = s.split_once('/') else {
            return Err(InvalidProjectId(s.to_string()));
        };
        if !valid_segment(owner) || !valid_segment(repo) {
            return Err(InvalidProjectId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ProjectId {
    type Error = InvalidProjectId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Provider kind ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKind {
    #[default]
    Github,
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKind::Github => f.write_str("github"),
        }
    }
}

// ── Declared and resolved projects ──

/// One entry of the declared `watchers` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchedProjectSpec {
    pub project: ProjectId,
    pub scan_interval_min: u64,
    #[serde(default)]
    pub api: ApiKind,
}

/// A project with its resolved scan parameters and scan progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchedProject {
    pub project: ProjectId,
    pub api: ApiKind,
    pub scan_interval_min: u64,
    /// Everything up to this instant has already been scanned.
    #[serde(with = "time::serde::rfc3339")]
    pub last_scan_watermark: OffsetDateTime,
}

impl WatchedProject {
    /// A never-scanned project: the watermark starts at `now` so that history
    /// before registration is not reported.
    pub fn fresh(spec: &WatchedProjectSpec, now: OffsetDateTime) -> Self {
        Self {
            project: spec.project.clone(),
            api: spec.api,
            scan_interval_min: spec.scan_interval_min,
            last_scan_watermark: now,
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_min.saturating_mul(60))
    }

    pub fn snapshot(&self, status: JobStatus) -> WatcherSnapshot {
        WatcherSnapshot {
            api: self.api,
            project: self.project.clone(),
            scan_interval_min: self.scan_interval_min,
            last_scan_watermark: self.last_scan_watermark,
            status,
        }
    }
}

impl From<&WatcherSnapshot> for WatchedProject {
    fn from(s: &WatcherSnapshot) -> Self {
        Self {
            project: s.project.clone(),
            api: s.api,
            scan_interval_min: s.scan_interval_min,
            last_scan_watermark: s.last_scan_watermark,
        }
    }
}
