use serde::Serialize;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::project::ProjectId;

/// A commit as handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedCommit {
    /// Provider-assigned hash.
    pub id: String,
    pub project: ProjectId,
    pub author: String,
    pub author_icon_url: String,
    pub message: String,
    pub target_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub committed_at: OffsetDateTime,
    pub committed_at_display: String,
    pub verified: bool,
    pub signed: bool,
}

impl NormalizedCommit {
    pub fn short_id(&self) -> &str {
        self.id.get(..7).unwrap_or(&self.id)
    }

    /// First line of the commit message.
    pub fn title(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// Render a commit instant as `2024/03/01 12:34:56` (UTC). Sub-second
/// precision is dropped, not rounded.
pub fn format_commit_date(at: OffsetDateTime) -> String {
    at.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]/[month]/[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_default()
}

/// Sort commits ascending by commit time, then by id.
pub fn sort_chronologically(commits: &mut [NormalizedCommit]) {
    commits.sort_by(|a, b| {
        a.committed_at
            .cmp(&b.committed_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
