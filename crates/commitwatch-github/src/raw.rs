//! The subset of GitHub's "list commits" payload the scanner reads.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RawCommit {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
    pub commit: RawCommitDetail,
    /// The GitHub account behind the commit; null for unknown emails.
    #[serde(default)]
    pub author: Option<RawAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCommitDetail {
    #[serde(default)]
    pub author: Option<RawSignature>,
    /// GitHub's `since` filter applies to this date, inclusively.
    #[serde(default)]
    pub committer: Option<RawSignature>,
    pub message: String,
    /// Canonical API resource URL, e.g.
    /// `https://api.github.com/repos/{owner}/{repo}/git/commits/{sha}`.
    pub url: String,
    #[serde(default)]
    pub verification: Option<RawVerification>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSignature {
    pub name: String,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAccount {
    #[serde(default)]
    pub avatar_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawVerification {
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub signature: Option<String>,
}

impl RawVerification {
    pub fn is_signed(&self) -> bool {
        self.signature.as_deref().is_some_and(|s| !s.is_empty())
    }
}
