use std::time::Duration;

use commitwatch_core::{NormalizedCommit, ReconciliationDiff};
use commitwatch_store::WatchPaths;
use serde::Deserialize;

pub mod discord;

// ── Config ──

/// Notification channel configuration, stored in `config.json` under key
/// `notify_channels`. An empty `events` list subscribes to every event.
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum Channel {
    #[serde(rename = "discord")]
    Discord {
        webhook_url: String,
        #[serde(default)]
        events: Vec<String>,
    },
    #[serde(rename = "ntfy")]
    Ntfy {
        url: String,
        #[serde(default)]
        events: Vec<String>,
    },
    #[serde(rename = "webhook")]
    Webhook {
        url: String,
        #[serde(default)]
        events: Vec<String>,
    },
    #[serde(rename = "telegram")]
    Telegram {
        bot_token: String,
        chat_id: String,
        #[serde(default)]
        events: Vec<String>,
    },
}

impl Channel {
    fn events(&self) -> &[String] {
        match self {
            Channel::Discord { events, .. } => events,
            Channel::Ntfy { events, .. } => events,
            Channel::Webhook { events, .. } => events,
            Channel::Telegram { events, .. } => events,
        }
    }

    /// Label for logs and CLI output. Never includes secrets embedded in URLs.
    pub fn display_name(&self) -> String {
        match self {
            Channel::Discord { .. } => "discord(webhook)".to_string(),
            Channel::Ntfy { url, .. } => format!("ntfy({url})"),
            Channel::Webhook { url, .. } => format!("webhook({url})"),
            Channel::Telegram { chat_id, .. } => format!("telegram(chat:{chat_id})"),
        }
    }

    fn matches(&self, event: &NotifyEvent) -> bool {
        let events = self.events();
        let name = event.event_name();
        events.is_empty() || events.iter().any(|e| e == name || e == "*")
    }
}

/// Top-level notify configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct NotifyConfig {
    pub channels: Vec<Channel>,
}

impl NotifyConfig {
    /// Load from `config.json` key `notify_channels`.
    /// Returns empty config if key is missing or unparseable.
    pub fn load(paths: &WatchPaths) -> Self {
        let content = match std::fs::read_to_string(&paths.config_json) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        Self::parse(&content)
    }

    fn parse(content: &str) -> Self {
        let val: serde_json::Value = match serde_json::from_str(content) {
            Ok(v) => v,
            Err(_) => return Self::default(),
        };
        let Some(channels_val) = val.get("notify_channels") else {
            return Self::default();
        };
        match serde_json::from_value(channels_val.clone()) {
            Ok(channels) => Self { channels },
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unparseable notify_channels");
                Self::default()
            }
        }
    }
}

// ── Notification Events ──

pub enum NotifyEvent {
    /// A scan found commits, oldest first.
    NewCommits(Vec<NormalizedCommit>),
    /// Startup reconciliation changed the lock file.
    ConfigUpdate(ReconciliationDiff),
    /// `commitwatch notify test`.
    Test,
}

impl NotifyEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            NotifyEvent::NewCommits(_) => "new_commits",
            NotifyEvent::ConfigUpdate(_) => "config_update",
            NotifyEvent::Test => "test",
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            NotifyEvent::NewCommits(commits) => serde_json::json!({ "commits": commits }),
            NotifyEvent::ConfigUpdate(diff) => serde_json::json!(diff),
            NotifyEvent::Test => serde_json::json!({
                "message": "commitwatch notify test",
            }),
        }
    }
}

// ── Dispatch ──

const TIMEOUT: Duration = Duration::from_secs(5);

/// Send notifications to all channels matching this event.
/// Errors are logged but never propagated. Blocking.
pub fn dispatch(config: &NotifyConfig, event: &NotifyEvent) {
    for channel in &config.channels {
        if !channel.matches(event) {
            continue;
        }
        if let Err(e) = send(channel, event) {
            tracing::warn!(channel = %channel.display_name(), error = %e, "failed to send notification");
        }
    }
}

/// Send a test notification to all configured channels.
/// Returns per-channel results for CLI display.
pub fn test_channels(config: &NotifyConfig) -> Vec<(String, Result<(), String>)> {
    config
        .channels
        .iter()
        .map(|ch| {
            let name = ch.display_name();
            let result = send(ch, &NotifyEvent::Test).map_err(|e| e.to_string());
            (name, result)
        })
        .collect()
}

fn agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(TIMEOUT))
        .build()
        .new_agent()
}

fn send(channel: &Channel, event: &NotifyEvent) -> anyhow::Result<()> {
    match channel {
        Channel::Discord { webhook_url, .. } => send_discord(webhook_url, event),
        Channel::Ntfy { url, .. } => send_ntfy(url, event),
        Channel::Webhook { url, .. } => send_webhook(url, event),
        Channel::Telegram {
            bot_token, chat_id, ..
        } => send_telegram(bot_token, chat_id, event),
    }
}

// ── Discord ──

fn send_discord(webhook_url: &str, event: &NotifyEvent) -> anyhow::Result<()> {
    let agent = agent();
    for body in discord::payloads(event) {
        agent
            .post(webhook_url)
            .header("Content-Type", "application/json")
            .send(body.to_string())?;
    }
    Ok(())
}

// ── ntfy ──

fn send_ntfy(url: &str, event: &NotifyEvent) -> anyhow::Result<()> {
    let (title, body, priority) = format_ntfy(event);
    agent()
        .post(url)
        .header("Title", &title)
        .header("Priority", priority)
        .send(&body)?;
    Ok(())
}

fn format_ntfy(event: &NotifyEvent) -> (String, String, &'static str) {
    match event {
        NotifyEvent::NewCommits(commits) => {
            let title = match commits.as_slice() {
                [one] => format!("[{}] 1 new commit", one.project),
                many => format!("{} new commits", many.len()),
            };
            let body = commits
                .iter()
                .map(|c| format!("[{}] {} {}: {}", c.project, c.short_id(), c.author, c.title()))
                .collect::<Vec<_>>()
                .join("\n");
            (title, body, "default")
        }
        NotifyEvent::ConfigUpdate(diff) => (
            "Configuration update".to_string(),
            diff_summary(diff),
            "low",
        ),
        NotifyEvent::Test => (
            "commitwatch notify test".to_string(),
            "If you see this, notifications are working!".to_string(),
            "low",
        ),
    }
}

/// Plain-text rendering of a reconciliation diff.
pub fn diff_summary(diff: &ReconciliationDiff) -> String {
    let mut lines = Vec::new();
    for p in &diff.new_projects {
        lines.push(format!("+ {} (every {} min)", p.project, p.scan_interval_min));
    }
    for (project, fields) in &diff.changed_projects {
        for (field, change) in fields {
            lines.push(format!(
                "~ {project} {field}: {} ⇒ {}",
                change.locked, change.declared
            ));
        }
    }
    for project in &diff.removed {
        lines.push(format!("- {project}"));
    }
    lines.join("\n")
}

// ── Webhook (generic JSON POST) ──

fn send_webhook(url: &str, event: &NotifyEvent) -> anyhow::Result<()> {
    let payload = format_webhook(event);
    agent()
        .post(url)
        .header("Content-Type", "application/json")
        .send(payload.to_string())?;
    Ok(())
}

fn format_webhook(event: &NotifyEvent) -> serde_json::Value {
    serde_json::json!({
        "event_type": event.event_name(),
        "data": event.to_json(),
    })
}

// ── Telegram ──

fn send_telegram(bot_token: &str, chat_id: &str, event: &NotifyEvent) -> anyhow::Result<()> {
    let text = format_telegram(event);
    let url = format!("https://api.telegram.org/bot{bot_token}/sendMessage");
    let body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
        "parse_mode": "Markdown",
    });
    agent()
        .post(&url)
        .header("Content-Type", "application/json")
        .send(body.to_string())?;
    Ok(())
}

/// Escape the legacy Markdown markers. Only valid outside entities, so
/// free text never goes inside `*...*` or `_..._`.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn format_telegram(event: &NotifyEvent) -> String {
    match event {
        NotifyEvent::NewCommits(commits) => commits
            .iter()
            .map(|c| {
                format!(
                    "*1 new commit* in {}\n{}\n`{}` by {}\n{}",
                    escape_markdown(c.project.as_str()),
                    escape_markdown(c.title()),
                    c.short_id(),
                    escape_markdown(&c.author),
                    escape_markdown(&c.target_url)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        NotifyEvent::ConfigUpdate(diff) => {
            format!("*Configuration update*\n{}", escape_markdown(&diff_summary(diff)))
        }
        NotifyEvent::Test => "*commitwatch notify test*\nNotifications are working!".to_string(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use commitwatch_core::{ApiKind, FieldChange, WatchedProject};
    use time::macros::datetime;

    fn commit(project: &str, id: &str) -> NormalizedCommit {
        NormalizedCommit {
            id: id.to_string(),
            project: project.parse().unwrap(),
            author: "Ada".into(),
            author_icon_url: "https://avatars.example/u/1".into(),
            message: "Fix parser\n\nlong body".into(),
            target_url: format!("https://github.com/{project}/commit/{id}"),
            committed_at: datetime!(2024-03-01 09:30:15 UTC),
            committed_at_display: "2024/03/01 09:30:15".into(),
            verified: false,
            signed: false,
        }
    }

    fn diff() -> ReconciliationDiff {
        let mut diff = ReconciliationDiff::default();
        diff.new_projects.push(WatchedProject {
            project: "a/b".parse().unwrap(),
            api: ApiKind::Github,
            scan_interval_min: 30,
            last_scan_watermark: datetime!(2024-01-01 00:00:00 UTC),
        });
        diff.record_change(&"c/d".parse().unwrap(), "scan_interval_min", FieldChange::new(45, 30));
        diff.removed.push("old/one".parse().unwrap());
        diff
    }

    #[test]
    fn config_deserialize_all_types() {
        let json = r#"[
            {"type":"discord","webhook_url":"https://discord.com/api/webhooks/1/x"},
            {"type":"ntfy","url":"https://ntfy.sh/t","events":["new_commits"]},
            {"type":"webhook","url":"https://hooks.example.com/xxx","events":["config_update"]},
            {"type":"telegram","bot_token":"123:ABC","chat_id":"456","events":["*"]}
        ]"#;
        let channels: Vec<Channel> = serde_json::from_str(json).unwrap();
        assert_eq!(channels.len(), 4);
        assert!(matches!(&channels[0], Channel::Discord { events, .. } if events.is_empty()));
        assert!(matches!(&channels[1], Channel::Ntfy { .. }));
        assert!(matches!(&channels[2], Channel::Webhook { .. }));
        assert!(matches!(&channels[3], Channel::Telegram { .. }));
    }

    #[test]
    fn config_load_missing_file() {
        let paths = WatchPaths::discover("/nonexistent");
        assert!(NotifyConfig::load(&paths).channels.is_empty());
    }

    #[test]
    fn config_load_from_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = WatchPaths::discover(tmp.path());
        std::fs::write(
            &paths.config_json,
            r#"{"github":{},"watchers":[],"notify_channels":[{"type":"ntfy","url":"https://ntfy.sh/cw"}]}"#,
        )
        .unwrap();
        let config = NotifyConfig::load(&paths);
        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.channels[0].display_name(), "ntfy(https://ntfy.sh/cw)");
    }

    #[test]
    fn config_parse_is_lenient() {
        assert!(NotifyConfig::parse("not json").channels.is_empty());
        assert!(NotifyConfig::parse(r#"{"watchers":[]}"#).channels.is_empty());
        assert!(NotifyConfig::parse(r#"{"notify_channels":[{"type":"pager"}]}"#)
            .channels
            .is_empty());
    }

    #[test]
    fn event_filter() {
        let ch: Channel = serde_json::from_value(serde_json::json!({
            "type": "ntfy",
            "url": "https://ntfy.sh/test",
            "events": ["config_update"]
        }))
        .unwrap();
        assert!(ch.matches(&NotifyEvent::ConfigUpdate(diff())));
        assert!(!ch.matches(&NotifyEvent::NewCommits(vec![])));
    }

    #[test]
    fn empty_filter_and_wildcard_match_all() {
        let all: Channel = serde_json::from_value(serde_json::json!({
            "type": "webhook",
            "url": "https://example.com/hook"
        }))
        .unwrap();
        let star: Channel = serde_json::from_value(serde_json::json!({
            "type": "webhook",
            "url": "https://example.com/hook",
            "events": ["*"]
        }))
        .unwrap();
        let event = NotifyEvent::NewCommits(vec![commit("a/b", "1234567890")]);
        assert!(all.matches(&event));
        assert!(star.matches(&event));
    }

    #[test]
    fn discord_name_hides_webhook_secret() {
        let ch = Channel::Discord {
            webhook_url: "https://discord.com/api/webhooks/1/secret".into(),
            events: vec![],
        };
        assert!(!ch.display_name().contains("secret"));
    }

    #[test]
    fn format_ntfy_commits() {
        let (title, body, priority) =
            format_ntfy(&NotifyEvent::NewCommits(vec![commit("a/b", "1234567890")]));
        assert_eq!(title, "[a/b] 1 new commit");
        assert_eq!(body, "[a/b] 1234567 Ada: Fix parser");
        assert_eq!(priority, "default");

        let (title, body, _) = format_ntfy(&NotifyEvent::NewCommits(vec![
            commit("a/b", "1111111111"),
            commit("c/d", "2222222222"),
        ]));
        assert_eq!(title, "2 new commits");
        assert_eq!(body.lines().count(), 2);
    }

    #[test]
    fn diff_summary_lines() {
        let text = diff_summary(&diff());
        assert_eq!(
            text,
            "+ a/b (every 30 min)\n~ c/d scan_interval_min: 30 ⇒ 45\n- old/one"
        );
    }

    #[test]
    fn format_webhook_payload() {
        let payload = format_webhook(&NotifyEvent::ConfigUpdate(diff()));
        assert_eq!(payload["event_type"], "config_update");
        assert_eq!(payload["data"]["new_projects"][0]["project"], "a/b");
        assert_eq!(
            payload["data"]["changed_projects"]["c/d"]["scan_interval_min"]["declared"],
            "45"
        );
        assert_eq!(payload["data"]["removed"][0], "old/one");

        let payload = format_webhook(&NotifyEvent::NewCommits(vec![commit("a/b", "1234567890")]));
        assert_eq!(payload["event_type"], "new_commits");
        assert_eq!(payload["data"]["commits"][0]["id"], "1234567890");
        assert_eq!(payload["data"]["commits"][0]["committed_at"], "2024-03-01T09:30:15Z");
    }

    #[test]
    fn format_telegram_commit() {
        let text = format_telegram(&NotifyEvent::NewCommits(vec![commit("a/b", "1234567890")]));
        assert!(text.contains("*1 new commit* in a/b"));
        assert!(text.contains("`1234567`"));
        assert!(text.contains("by Ada"));
    }

    #[test]
    fn format_telegram_escapes_markdown() {
        let mut c = commit("rust_lang/x", "1234567890");
        c.author = "ada_*lovelace*".into();
        c.message = "Use `Vec<T>` in [docs]".into();
        let text = format_telegram(&NotifyEvent::NewCommits(vec![c]));
        assert!(text.contains("in rust\\_lang/x\n"));
        assert!(text.contains("by ada\\_\\*lovelace\\*\n"));
        assert!(text.contains("Use \\`Vec<T>\\` in \\[docs]"));
        assert!(text.contains("https://github.com/rust\\_lang/x/commit/1234567890"));

        let mut d = ReconciliationDiff::default();
        d.removed.push("old_name/one".parse().unwrap());
        let text = format_telegram(&NotifyEvent::ConfigUpdate(d));
        assert!(text.ends_with("- old\\_name/one"));
    }

    #[test]
    fn test_channels_with_no_channels() {
        assert!(test_channels(&NotifyConfig::default()).is_empty());
    }
}
