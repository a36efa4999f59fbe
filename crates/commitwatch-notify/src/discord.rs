//! Discord webhook payloads.

use commitwatch_core::{NormalizedCommit, ReconciliationDiff};
use serde_json::{json, Value};

use crate::NotifyEvent;

/// Discord rejects messages carrying more embeds than this.
pub const MAX_EMBEDS: usize = 10;

const COMMIT_COLOR: u32 = 0x0099ff;
const CONFIG_COLOR: u32 = 0xc75820;
const DESCRIPTION_LIMIT: usize = 4096;
const FIELD_LIMIT: usize = 1024;

/// One webhook body per batch of at most [`MAX_EMBEDS`] embeds.
pub fn payloads(event: &NotifyEvent) -> Vec<Value> {
    let embeds = match event {
        NotifyEvent::NewCommits(commits) => commits.iter().map(commit_embed).collect(),
        NotifyEvent::ConfigUpdate(diff) => vec![config_embed(diff)],
        NotifyEvent::Test => vec![json!({
            "color": COMMIT_COLOR,
            "title": "commitwatch notify test",
            "description": "If you see this, notifications are working!",
        })],
    };
    embeds
        .chunks(MAX_EMBEDS)
        .map(|chunk| json!({ "embeds": chunk }))
        .collect()
}

pub fn commit_embed(commit: &NormalizedCommit) -> Value {
    let mut author = json!({ "name": commit.author, "url": commit.target_url });
    if !commit.author_icon_url.is_empty() {
        author["icon_url"] = json!(commit.author_icon_url);
    }
    json!({
        "color": COMMIT_COLOR,
        "title": format!("[{}] 1 new commit", commit.project),
        "url": commit.target_url,
        "author": author,
        "description": truncate(&commit.message, DESCRIPTION_LIMIT),
        "footer": { "text": commit_footer(commit) },
    })
}

pub(crate) fn commit_footer(commit: &NormalizedCommit) -> String {
    let verified = if commit.verified { "verified" } else { "unverified" };
    let signed = if commit.signed { "signed" } else { "unsigned" };
    format!(
        "{} • {verified} • {signed} • {}",
        commit.short_id(),
        commit.committed_at_display
    )
}

pub fn config_embed(diff: &ReconciliationDiff) -> Value {
    let mut fields = Vec::new();
    let new = new_watchers(diff);
    if !new.is_empty() {
        fields.push(json!({ "name": "New watchers", "value": truncate(&new, FIELD_LIMIT) }));
    }
    let changed = updated_watchers(diff);
    if !changed.is_empty() {
        fields.push(json!({ "name": "Update watchers", "value": truncate(&changed, FIELD_LIMIT) }));
    }
    if !diff.removed.is_empty() {
        let removed = bullet_ids(diff.removed.iter());
        fields.push(json!({ "name": "Removed watchers", "value": truncate(&removed, FIELD_LIMIT) }));
    }
    json!({
        "color": CONFIG_COLOR,
        "title": "Configuration update",
        "description": "Update the configuration lock file",
        "author": { "name": "commitwatch" },
        "fields": fields,
    })
}

/// Markdown list of new projects with their parameters.
pub(crate) fn new_watchers(diff: &ReconciliationDiff) -> String {
    let mut out = String::new();
    for p in &diff.new_projects {
        out.push_str(&format!("- **{}**\n", p.project));
        out.push_str(&format!("   - **api**: `{}`\n", p.api));
        out.push_str(&format!("   - **scan_interval_min**: `{}`\n", p.scan_interval_min));
    }
    out
}

/// Markdown list of edited fields, `locked ⇒ declared`.
pub(crate) fn updated_watchers(diff: &ReconciliationDiff) -> String {
    let mut out = String::new();
    for (project, fields) in &diff.changed_projects {
        out.push_str(&format!("- **{project}**\n"));
        for (field, change) in fields {
            out.push_str(&format!(
                "   - **{field}**: `{}` ⇒ `{}`\n",
                change.locked, change.declared
            ));
        }
    }
    out
}

pub(crate) fn bullet_ids<'a>(
    ids: impl Iterator<Item = &'a commitwatch_core::ProjectId>,
) -> String {
    ids.map(|id| format!("- **{id}**\n")).collect()
}

fn truncate(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let mut out: String = s.chars().take(limit - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use commitwatch_core::{ApiKind, FieldChange, WatchedProject};
    use time::macros::datetime;

    fn commit(id: &str) -> NormalizedCommit {
        NormalizedCommit {
            id: id.to_string(),
            project: "octo/cat".parse().unwrap(),
            author: "Ada".into(),
            author_icon_url: String::new(),
            message: "Fix the thing".into(),
            target_url: format!("https://github.com/octo/cat/commit/{id}"),
            committed_at: datetime!(2024-03-01 09:30:15 UTC),
            committed_at_display: "2024/03/01 09:30:15".into(),
            verified: true,
            signed: false,
        }
    }

    #[test]
    fn commit_embed_layout() {
        let e = commit_embed(&commit("abcdef123456"));
        assert_eq!(e["title"], "[octo/cat] 1 new commit");
        assert_eq!(e["color"], 0x0099ff);
        assert_eq!(e["description"], "Fix the thing");
        assert_eq!(e["footer"]["text"], "abcdef1 • verified • unsigned • 2024/03/01 09:30:15");
        assert_eq!(e["author"]["name"], "Ada");
        // no avatar: Discord rejects an empty icon URL
        assert!(e["author"].get("icon_url").is_none());
    }

    #[test]
    fn commits_are_chunked_by_ten() {
        let commits: Vec<_> = (0..23).map(|i| commit(&format!("{i:010}"))).collect();
        let bodies = payloads(&NotifyEvent::NewCommits(commits));
        let sizes: Vec<_> = bodies
            .iter()
            .map(|b| b["embeds"].as_array().unwrap().len())
            .collect();
        assert_eq!(sizes, [10, 10, 3]);
    }

    #[test]
    fn config_embed_sections() {
        let mut diff = ReconciliationDiff::default();
        diff.new_projects.push(WatchedProject {
            project: "a/b".parse().unwrap(),
            api: ApiKind::Github,
            scan_interval_min: 30,
            last_scan_watermark: datetime!(2024-01-01 00:00:00 UTC),
        });
        diff.record_change(&"c/d".parse().unwrap(), "scan_interval_min", FieldChange::new(45, 30));

        let e = config_embed(&diff);
        assert_eq!(e["title"], "Configuration update");
        assert_eq!(e["color"], 0xc75820);
        let fields = e["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["name"], "New watchers");
        assert!(fields[0]["value"].as_str().unwrap().contains("**a/b**"));
        assert_eq!(fields[1]["name"], "Update watchers");
        assert!(fields[1]["value"]
            .as_str()
            .unwrap()
            .contains("**scan_interval_min**: `30` ⇒ `45`"));
    }

    #[test]
    fn long_messages_are_truncated() {
        let mut c = commit("abcdef123456");
        c.message = "x".repeat(5000);
        let e = commit_embed(&c);
        assert_eq!(e["description"].as_str().unwrap().chars().count(), DESCRIPTION_LIMIT);
    }
}
