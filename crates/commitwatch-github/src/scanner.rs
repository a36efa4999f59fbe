use std::sync::{Arc, LazyLock};

use commitwatch_core::commit::{format_commit_date, sort_chronologically};
use commitwatch_core::{NormalizedCommit, ProjectId, ScanError};
use regex::Regex;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::rate::{RateLimitedClient, COMMITS_LABEL};
use crate::raw::RawCommit;
use crate::transport::CommitTransport;

/// Resource path below the API base: `/repos/{owner}/{project}/...`.
static RESOURCE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?:repos|issues)/(?P<owner>[A-Za-z0-9_.-]+)/(?P<project>[A-Za-z0-9_.-]+)(?:/|$)")
        .expect("resource path pattern is valid")
});

/// One rate-limited fetch-and-normalize cycle per call.
pub struct RepositoryScanner {
    client: Arc<RateLimitedClient>,
    transport: Arc<dyn CommitTransport>,
    api_url: String,
}

impl RepositoryScanner {
    pub fn new(
        client: Arc<RateLimitedClient>,
        transport: Arc<dyn CommitTransport>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            transport,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn client(&self) -> &Arc<RateLimitedClient> {
        &self.client
    }

    /// Fetch every commit of `project` strictly newer than `since`, oldest
    /// first, following the listing across pages.
    ///
    /// Each page costs one permit. All-or-nothing: a refused permit, a
    /// failed page or a single malformed commit fails the whole scan.
    /// The watermark is the caller's to advance, only on `Ok`.
    pub async fn scan(
        &self,
        project: &ProjectId,
        since: OffsetDateTime,
    ) -> Result<Vec<NormalizedCommit>, ScanError> {
        tracing::debug!(%project, since = %format_commit_date(since), "scanning commits");
        let mut raw: Vec<RawCommit> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        loop {
            self.client
                .try_acquire(COMMITS_LABEL)
                .map_err(|limited| ScanError::Throttled {
                    retry_after: limited.retry_after,
                })?;
            let page = self
                .transport
                .fetch_commits(project, since, cursor.as_deref())
                .await
                .map_err(|e| ScanError::TransportFailure(e.to_string()))?;
            pages += 1;

            let listed: Vec<RawCommit> = serde_json::from_str(&page.body)
                .map_err(|e| ScanError::MalformedData(format!("unexpected commit list: {e}")))?;
            raw.extend(listed);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        if pages > 1 {
            tracing::debug!(%project, pages, commits = raw.len(), "commit list spanned several pages");
        }

        // the previous scan already reported commits dated exactly at its watermark
        raw.retain(|c| !at_watermark(c, since));
        let mut commits = raw
            .iter()
            .map(|c| self.normalize(c))
            .collect::<Result<Vec<_>, _>>()?;
        sort_chronologically(&mut commits);
        Ok(commits)
    }

    /// Canonical `owner/project` of an API resource URL.
    pub fn project_from_url(&self, url: &str) -> Result<ProjectId, ScanError> {
        let unsupported = || ScanError::MalformedData(format!("unsupported github URL '{url}'"));
        let path = url.strip_prefix(&self.api_url).ok_or_else(unsupported)?;
        let caps = RESOURCE_PATH.captures(path).ok_or_else(unsupported)?;
        ProjectId::new(&caps["owner"], &caps["project"]).map_err(|_| unsupported())
    }

    fn normalize(&self, raw: &RawCommit) -> Result<NormalizedCommit, ScanError> {
        let project = self.project_from_url(&raw.commit.url)?;
        let signature = raw.commit.author.as_ref().ok_or_else(|| {
            ScanError::MalformedData(format!("commit {} has no author signature", raw.sha))
        })?;
        let committed_at = OffsetDateTime::parse(&signature.date, &Rfc3339).map_err(|e| {
            ScanError::MalformedData(format!(
                "commit {} has an invalid date '{}': {e}",
                raw.sha, signature.date
            ))
        })?;
        let verification = raw.commit.verification.as_ref();

        Ok(NormalizedCommit {
            id: raw.sha.clone(),
            project,
            author: signature.name.clone(),
            author_icon_url: raw
                .author
                .as_ref()
                .map(|a| a.avatar_url.clone())
                .unwrap_or_default(),
            message: raw.commit.message.clone(),
            target_url: raw
                .html_url
                .clone()
                .unwrap_or_else(|| raw.commit.url.clone()),
            committed_at_display: format_commit_date(committed_at),
            committed_at,
            verified: verification.is_some_and(|v| v.verified),
            signed: verification.is_some_and(|v| v.is_signed()),
        })
    }
}

/// Whether GitHub matched `raw` only because `since` is inclusive.
fn at_watermark(raw: &RawCommit, since: OffsetDateTime) -> bool {
    raw.commit
        .committer
        .as_ref()
        .or(raw.commit.author.as_ref())
        .and_then(|s| OffsetDateTime::parse(&s.date, &Rfc3339).ok())
        .is_some_and(|date| date == since)
}
