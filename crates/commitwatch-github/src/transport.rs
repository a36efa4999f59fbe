use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use commitwatch_core::ProjectId;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const TIMEOUT: Duration = Duration::from_secs(30);
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("commitwatch/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: &str = "100";

/// Network or HTTP level failure of one fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// One page of a commit listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPage {
    /// Raw JSON array of commits.
    pub body: String,
    /// Cursor of the following page; `None` on the last one.
    pub next: Option<String>,
}

impl CommitPage {
    pub fn last(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            next: None,
        }
    }
}

/// Outbound fetch of a project's commit list. Implemented by
/// [`GithubTransport`] and [`MockTransport`] (tests).
#[async_trait::async_trait]
pub trait CommitTransport: Send + Sync {
    /// One page of the commits of `project` newer than `since`. `cursor` is
    /// `None` for the first page, then the `next` of the previous page.
    async fn fetch_commits(
        &self,
        project: &ProjectId,
        since: OffsetDateTime,
        cursor: Option<&str>,
    ) -> Result<CommitPage, TransportError>;
}

// ── GitHub REST ──

/// Talks to the GitHub REST API (or a GitHub Enterprise base URL).
pub struct GithubTransport {
    api_url: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl GithubTransport {
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .build()
            .new_agent();
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
            agent,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn commits_url(&self, project: &ProjectId) -> String {
        format!("{}/repos/{}/commits", self.api_url, project)
    }
}

#[async_trait::async_trait]
impl CommitTransport for GithubTransport {
    async fn fetch_commits(
        &self,
        project: &ProjectId,
        since: OffsetDateTime,
        cursor: Option<&str>,
    ) -> Result<CommitPage, TransportError> {
        let target = match cursor {
            // next links already carry `since` and `per_page`
            Some(next) => PageTarget::Next(next.to_string()),
            None => PageTarget::First {
                url: self.commits_url(project),
                since: since
                    .format(&Rfc3339)
                    .map_err(|e| TransportError(format!("formatting since: {e}")))?,
            },
        };
        let agent = self.agent.clone();
        let token = self.token.clone();
        tracing::debug!(%project, ?target, "requesting commit list");

        // ureq is blocking; keep it off the scheduler threads
        tokio::task::spawn_blocking(move || get_commits(&agent, &target, token.as_deref()))
            .await
            .map_err(|e| TransportError(format!("fetch task failed: {e}")))?
    }
}

#[derive(Debug)]
enum PageTarget {
    First { url: String, since: String },
    Next(String),
}

fn get_commits(
    agent: &ureq::Agent,
    target: &PageTarget,
    token: Option<&str>,
) -> Result<CommitPage, TransportError> {
    let (url, mut request) = match target {
        PageTarget::First { url, since } => (
            url.as_str(),
            agent
                .get(url)
                .query("since", since)
                .query("per_page", PER_PAGE),
        ),
        PageTarget::Next(url) => (url.as_str(), agent.get(url)),
    };
    request = request
        .header("Accept", "application/vnd.github+json")
        .header("X-GitHub-Api-Version", API_VERSION)
        .header("User-Agent", USER_AGENT);
    if let Some(token) = token {
        request = request.header("Authorization", &format!("Bearer {token}"));
    }

    let mut response = request
        .call()
        .map_err(|e| TransportError(format!("GET {url}: {e}")))?;
    if let Some(remaining) = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
    {
        tracing::debug!(remaining, "github reported remaining quota");
    }
    let next = response
        .headers()
        .get("link")
        .and_then(|v| v.to_str().ok())
        .and_then(next_link);
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| TransportError(format!("reading body of {url}: {e}")))?;
    Ok(CommitPage { body, next })
}

/// The `rel="next"` target of an RFC 8288 `Link` header.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|p| {
            let p = p.trim();
            p == r#"rel="next""# || p == "rel=next"
        });
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        is_next.then(|| url.to_string())
    })
}

// ── Mock ──

/// Scripted transport for tests: replies are served in push order, then
/// `[]` forever. Every call is recorded with the cursor it asked for.
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<CommitPage, TransportError>>>,
    calls: Mutex<Vec<(ProjectId, OffsetDateTime)>>,
    cursors: Mutex<Vec<Option<String>>>,
    delay: Option<Duration>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            cursors: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Every fetch sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// A last page.
    pub fn push_json(&self, body: serde_json::Value) {
        self.push(Ok(CommitPage::last(body.to_string())));
    }

    /// A page followed by another one at cursor `next`.
    pub fn push_page(&self, body: serde_json::Value, next: &str) {
        self.push(Ok(CommitPage {
            body: body.to_string(),
            next: Some(next.to_string()),
        }));
    }

    pub fn push_error(&self, message: &str) {
        self.push(Err(TransportError(message.to_string())));
    }

    pub fn push(&self, reply: Result<CommitPage, TransportError>) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<(ProjectId, OffsetDateTime)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn cursors(&self) -> Vec<Option<String>> {
        self.cursors.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl CommitTransport for MockTransport {
    async fn fetch_commits(
        &self,
        project: &ProjectId,
        since: OffsetDateTime,
        cursor: Option<&str>,
    ) -> Result<CommitPage, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((project.clone(), since));
        self.cursors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(cursor.map(str::to_string));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(CommitPage::last("[]")))
    }
}
