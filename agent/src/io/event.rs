//! GitHub Actions event payloads that carry a command.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::debug;

/// A command pulled out of an `issues` or `issue_comment` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub issue_number: u64,
    pub text: String,
    /// Set when the author is a bot account; such events must not be answered.
    pub from_bot: bool,
}

#[derive(Deserialize)]
struct EventPayload {
    issue: Option<EventIssue>,
    comment: Option<EventComment>,
}

#[derive(Deserialize)]
struct EventIssue {
    number: u64,
    body: Option<String>,
    user: Option<EventUser>,
}

#[derive(Deserialize)]
struct EventComment {
    body: Option<String>,
    user: Option<EventUser>,
}

#[derive(Deserialize)]
struct EventUser {
    #[serde(rename = "type")]
    kind: Option<String>,
}

fn is_bot(user: Option<&EventUser>) -> bool {
    user.and_then(|u| u.kind.as_deref()) == Some("Bot")
}

/// Parse an event payload. Comment bodies win over issue bodies.
pub fn parse_event(raw: &str) -> Result<CommandEvent> {
    let payload: EventPayload = serde_json::from_str(raw).context("parse event json")?;
    let issue = payload
        .issue
        .ok_or_else(|| anyhow!("event has no issue (expected issues or issue_comment)"))?;
    let event = match payload.comment {
        Some(comment) => CommandEvent {
            issue_number: issue.number,
            text: comment.body.unwrap_or_default(),
            from_bot: is_bot(comment.user.as_ref()),
        },
        None => CommandEvent {
            issue_number: issue.number,
            text: issue.body.unwrap_or_default(),
            from_bot: is_bot(issue.user.as_ref()),
        },
    };
    debug!(issue = event.issue_number, from_bot = event.from_bot, "parsed command event");
    Ok(event)
}

pub fn load_event(path: &Path) -> Result<CommandEvent> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_event(&raw).with_context(|| format!("parse {}", path.display()))
}
