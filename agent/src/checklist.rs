//! Keeps a single open status issue in sync with the latest bootstrap report.

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use tracing::{info, instrument};

use crate::context::AgentContext;
use crate::core::checklist::{ChecklistReport, render};
use crate::io::remote::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created(u64),
    Updated(u64),
}

impl SyncOutcome {
    pub fn issue_number(self) -> u64 {
        match self {
            SyncOutcome::Created(number) | SyncOutcome::Updated(number) => number,
        }
    }
}

/// Replace the checklist body, creating the issue if no open one has the title.
///
/// Two overlapping runs can both miss the issue and both create it; the next
/// run updates the first match and leaves the duplicate alone.
#[instrument(skip_all, fields(title = %ctx.config.checklist.title))]
pub fn sync_checklist<R: RemoteStore + ?Sized>(
    remote: &R,
    ctx: &AgentContext,
    report: &ChecklistReport,
) -> Result<SyncOutcome> {
    let title = &ctx.config.checklist.title;
    let body = render(report);

    let existing = remote
        .list_open_issues()
        .context("list open issues")?
        .into_iter()
        .find(|issue| issue.title == *title);

    match existing {
        Some(issue) => {
            remote
                .update_issue_body(issue.number, &body)
                .with_context(|| format!("update checklist issue #{}", issue.number))?;
            let note = format!(
                "Checklist refreshed at {}.",
                report.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            );
            remote
                .comment_on_issue(issue.number, &note)
                .with_context(|| format!("comment on checklist issue #{}", issue.number))?;
            info!(number = issue.number, "checklist updated");
            Ok(SyncOutcome::Updated(issue.number))
        }
        None => {
            let issue = remote
                .create_issue(title, &body)
                .context("create checklist issue")?;
            info!(number = issue.number, "checklist created");
            Ok(SyncOutcome::Created(issue.number))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NotifyOutcome;
    use crate::test_support::{FakeRemote, context_at, fixed_now};

    fn report(ctx: &AgentContext) -> ChecklistReport {
        ChecklistReport {
            repo: ctx.repo.clone(),
            build: None,
            paths: Vec::new(),
            notifier: NotifyOutcome::Unconfigured,
            config_snapshot: String::new(),
            timezone: ctx.config.timezone.clone(),
            generated_at: ctx.started_at,
        }
    }

    #[test]
    fn creates_when_missing() {
        let remote = FakeRemote::new("main");
        let ctx = context_at(fixed_now());

        let outcome = sync_checklist(&remote, &ctx, &report(&ctx)).expect("sync");
        assert!(matches!(outcome, SyncOutcome::Created(_)));
        let issues = remote.open_issues_titled("Agent Checklist");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].1.starts_with("## Agent checklist"));
        assert!(remote.comments().is_empty());
    }

    #[test]
    fn updates_exact_title_match_and_comments() {
        let remote = FakeRemote::new("main");
        remote.seed_issue("Agent Checklist (old)", "stale");
        let number = remote.seed_issue("Agent Checklist", "stale");
        let ctx = context_at(fixed_now());

        let outcome = sync_checklist(&remote, &ctx, &report(&ctx)).expect("sync");
        assert_eq!(outcome, SyncOutcome::Updated(number));
        let issues = remote.open_issues_titled("Agent Checklist");
        assert_eq!(issues.len(), 1);
        assert_ne!(issues[0].1, "stale");
        assert_eq!(
            remote.comments(),
            vec![(number, "Checklist refreshed at 2024-03-09T14:05:00Z.".to_string())]
        );
    }

    #[test]
    fn title_comes_from_config() {
        let remote = FakeRemote::new("main");
        let mut ctx = context_at(fixed_now());
        ctx.config.checklist.title = "Site health".to_string();

        sync_checklist(&remote, &ctx, &report(&ctx)).expect("sync");
        assert_eq!(remote.open_issues_titled("Site health").len(), 1);
        assert!(remote.open_issues_titled("Agent Checklist").is_empty());
    }
}
