//! Command dispatch: match a verb, run its handler, answer exactly once.

use anyhow::{Context, Result, anyhow, bail};
use tracing::{info, instrument, warn};

use crate::bootstrap::probe_build;
use crate::context::{AgentContext, Services};
use crate::core::checklist::render_path_line;
use crate::core::command::{Verb, parse};
use crate::core::starter::SuffixStarter;
use crate::core::types::{NotifyOutcome, PathReport};
use crate::gotm;
use crate::io::notify::WEBHOOK_SECRET;
use crate::reconcile::ensure_all;
use crate::update::{UpdateTarget, apply_update};

pub const UNKNOWN_COMMAND: &str =
    "🤷 Unknown command. Comment `/help` to see what I can do.";

/// Webhook event type sent by `/wire make`.
pub const WIRE_TEST_EVENT: &str = "test";

/// The single message posted back for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// `None` when no rule matched.
    pub verb: Option<Verb>,
    pub ok: bool,
    pub message: String,
}

type Handler = fn(Services<'_>, &AgentContext, &str) -> Result<String>;

fn handler_for(verb: Verb) -> Handler {
    match verb {
        Verb::Help => help,
        Verb::Status => status,
        Verb::EnsureSite => ensure_site,
        Verb::WireMake => wire_make,
        Verb::GotmOpen => gotm_open,
        Verb::GotmClose => gotm_close,
        Verb::UpdateLive => update_live,
        Verb::UpdateTable => update_table,
    }
}

/// Compute the reply for `text` without posting it.
#[instrument(skip_all)]
pub fn respond(services: Services<'_>, ctx: &AgentContext, text: &str) -> Reply {
    let Some(command) = parse(text) else {
        info!("no command matched");
        return Reply {
            verb: None,
            ok: false,
            message: UNKNOWN_COMMAND.to_string(),
        };
    };
    let verb = command.verb;
    info!(verb = %verb, "dispatching");
    match handler_for(verb)(services, ctx, &command.rest) {
        Ok(message) => Reply {
            verb: Some(verb),
            ok: true,
            message,
        },
        Err(err) => {
            let error = format!("{err:#}");
            warn!(verb = %verb, error = %error, "command failed");
            Reply {
                verb: Some(verb),
                ok: false,
                message: format!("❌ `{verb}` failed: {error}"),
            }
        }
    }
}

/// Run `text` and post the reply as a comment on `issue_number`.
///
/// Handler failures become the reply; only a failure to post is an error.
#[instrument(skip_all, fields(issue = issue_number))]
pub fn dispatch(
    services: Services<'_>,
    ctx: &AgentContext,
    issue_number: u64,
    text: &str,
) -> Result<Reply> {
    let reply = respond(services, ctx, text);
    services
        .remote
        .comment_on_issue(issue_number, &reply.message)
        .with_context(|| format!("post reply on issue #{issue_number}"))?;
    Ok(reply)
}

fn help(_: Services<'_>, ctx: &AgentContext, _: &str) -> Result<String> {
    let site = &ctx.config.site;
    Ok(format!(
        "**Commands**\n\n\
         - `/help`: this message\n\
         - `/status`: site files, latest build and webhook, read-only\n\
         - `/ensure site`: open pull requests for missing site files\n\
         - `/wire make` (or `/test make`): send a test event to the Make webhook\n\
         - `/gotm open [label]`: open a {days}-day GOTM vote\n\
         - `/gotm close`: close the open GOTM vote\n\
         - `/update live <json>`: replace `{live}` and redeploy\n\
         - `/update table <json>`: replace `{table}` and redeploy\n\n\
         JSON can follow the command inline or sit in a ```json fenced block.",
        days = ctx.config.gotm.vote_window_days,
        live = site.live_path,
        table = site.table_path,
    ))
}

fn status(services: Services<'_>, ctx: &AgentContext, _: &str) -> Result<String> {
    let base = &ctx.repo.default_branch;
    let mut lines = vec![format!("**Status of `{}` on `{base}`**", ctx.repo.slug()), String::new()];

    for path in &ctx.config.site.ensure_files {
        let line = match services.remote.read_file(path, base) {
            Ok(Some(_)) => format!("- [x] `{path}`: present"),
            Ok(None) => format!("- [ ] `{path}`: missing (run `/ensure site`)"),
            Err(err) => format!("- [ ] `{path}`: probe failed ({err})"),
        };
        lines.push(line);
    }

    lines.push(match probe_build(services.remote, ctx) {
        Some(build) => format!("- Build: {build}"),
        None => "- Build: no status available".to_string(),
    });

    lines.push(if services.notifier.is_configured() {
        "- Make webhook: configured".to_string()
    } else {
        format!("- Make webhook: not configured (`{WEBHOOK_SECRET}`)")
    });

    lines.push(match gotm::read_state(services.remote, ctx) {
        Ok(Some((state, _))) if state.is_active(ctx.started_at) => format!(
            "- GOTM vote: open until {}",
            state.closes_at.format("%Y-%m-%d %H:%M UTC")
        ),
        Ok(_) => "- GOTM vote: none open".to_string(),
        Err(err) => format!("- GOTM vote: unreadable ({err:#})"),
    });

    Ok(lines.join("\n"))
}

fn ensure_site(services: Services<'_>, ctx: &AgentContext, _: &str) -> Result<String> {
    let starter = SuffixStarter::with_default_rules(ctx.started_at);
    let reports = ensure_all(services.remote, ctx, &starter);
    let lines: Vec<String> = reports.iter().map(render_path_line).collect();
    let failed = reports
        .iter()
        .filter(|report| matches!(report, PathReport::Failed { .. }))
        .count();
    if failed > 0 {
        bail!(
            "{failed} of {} paths could not be reconciled\n{}",
            reports.len(),
            lines.join("\n")
        );
    }
    if lines.is_empty() {
        return Ok("✅ No site files configured (`site.ensure_files` is empty).".to_string());
    }
    Ok(format!("✅ Site files reconciled:\n{}", lines.join("\n")))
}

fn wire_make(services: Services<'_>, _: &AgentContext, _: &str) -> Result<String> {
    let unconfigured = || anyhow!("webhook is not configured; set the `{WEBHOOK_SECRET}` secret");
    if !services.notifier.is_configured() {
        return Err(unconfigured());
    }
    match services.notifier.notify(WIRE_TEST_EVENT) {
        NotifyOutcome::Delivered { status } => {
            Ok(format!("✅ Make webhook reachable (HTTP {status})."))
        }
        NotifyOutcome::Failed { summary } => bail!("Make webhook unreachable: {summary}"),
        NotifyOutcome::Unconfigured => Err(unconfigured()),
    }
}

fn gotm_open(services: Services<'_>, ctx: &AgentContext, rest: &str) -> Result<String> {
    gotm::open(services, ctx, rest)
}

fn gotm_close(services: Services<'_>, ctx: &AgentContext, _: &str) -> Result<String> {
    gotm::close(services, ctx)
}

fn update_live(services: Services<'_>, ctx: &AgentContext, rest: &str) -> Result<String> {
    apply_update(services, ctx, UpdateTarget::Live, rest)
}

fn update_table(services: Services<'_>, ctx: &AgentContext, rest: &str) -> Result<String> {
    apply_update(services, ctx, UpdateTarget::Table, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeNotifier, FakeRemote, FakeTrigger, context_at, fixed_now, services};

    #[test]
    fn unknown_text_gets_fixed_reply() {
        let remote = FakeRemote::new("main");
        let trigger = FakeTrigger::succeeding();
        let notifier = FakeNotifier::unconfigured();
        let ctx = context_at(fixed_now());

        let reply = respond(services(&remote, &trigger, &notifier), &ctx, "hello there");
        assert_eq!(reply.verb, None);
        assert!(!reply.ok);
        assert_eq!(reply.message, UNKNOWN_COMMAND);
    }

    #[test]
    fn help_lists_every_verb() {
        let remote = FakeRemote::new("main");
        let trigger = FakeTrigger::succeeding();
        let notifier = FakeNotifier::unconfigured();
        let ctx = context_at(fixed_now());

        let reply = respond(services(&remote, &trigger, &notifier), &ctx, "/HELP");
        assert!(reply.ok);
        for verb in [
            Verb::Help,
            Verb::Status,
            Verb::EnsureSite,
            Verb::WireMake,
            Verb::GotmOpen,
            Verb::GotmClose,
            Verb::UpdateLive,
            Verb::UpdateTable,
        ] {
            assert!(reply.message.contains(verb.as_str()), "missing {verb}");
        }
    }

    #[test]
    fn status_is_read_only() {
        let remote = FakeRemote::new("main");
        remote.seed_file("main", "data/table.json", "{}\n");
        let trigger = FakeTrigger::succeeding();
        let notifier = FakeNotifier::delivering();
        let ctx = context_at(fixed_now());

        let reply = respond(services(&remote, &trigger, &notifier), &ctx, "/status");
        assert!(reply.ok);
        assert!(reply.message.contains("- [x] `data/table.json`: present"));
        assert!(reply.message.contains("- [ ] `data/live.json`: missing"));
        assert!(reply.message.contains("- Make webhook: configured"));
        assert!(reply.message.contains("- GOTM vote: none open"));
        assert_eq!(remote.mutation_count(), 0);
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn ensure_site_reports_each_path() {
        let remote = FakeRemote::new("main");
        let trigger = FakeTrigger::succeeding();
        let notifier = FakeNotifier::unconfigured();
        let ctx = context_at(fixed_now());

        let reply = respond(services(&remote, &trigger, &notifier), &ctx, "/ensure site");
        assert!(reply.ok, "{}", reply.message);
        assert!(reply.message.contains("`data/table.json`: pr_opened"));
        assert!(reply.message.contains("`data/live.json`: pr_opened"));
        assert_eq!(remote.open_pull_count(), 2);
    }

    #[test]
    fn ensure_site_failure_is_rendered() {
        let remote = FakeRemote::new("main");
        remote.fail_branch_creation();
        let trigger = FakeTrigger::succeeding();
        let notifier = FakeNotifier::unconfigured();
        let ctx = context_at(fixed_now());

        let reply = respond(services(&remote, &trigger, &notifier), &ctx, "/ensure site");
        assert!(!reply.ok);
        assert!(reply.message.starts_with("❌ `/ensure site` failed: 2 of 2 paths"));
    }

    #[test]
    fn wire_make_alias_reaches_webhook() {
        let remote = FakeRemote::new("main");
        let trigger = FakeTrigger::succeeding();
        let notifier = FakeNotifier::delivering();
        let ctx = context_at(fixed_now());

        let reply = respond(services(&remote, &trigger, &notifier), &ctx, "/test make");
        assert_eq!(reply.verb, Some(Verb::WireMake));
        assert!(reply.ok);
        assert_eq!(notifier.sent(), vec![WIRE_TEST_EVENT.to_string()]);
    }

    #[test]
    fn wire_make_reports_delivery_failure() {
        let remote = FakeRemote::new("main");
        let trigger = FakeTrigger::succeeding();
        let notifier = FakeNotifier::new(NotifyOutcome::Failed {
            summary: "timed out".to_string(),
        });
        let ctx = context_at(fixed_now());

        let reply = respond(services(&remote, &trigger, &notifier), &ctx, "/wire make");
        assert!(!reply.ok);
        assert_eq!(
            reply.message,
            "❌ `/wire make` failed: Make webhook unreachable: timed out"
        );
    }

    #[test]
    fn dispatch_posts_one_comment() {
        let remote = FakeRemote::new("main");
        let trigger = FakeTrigger::succeeding();
        let notifier = FakeNotifier::unconfigured();
        let ctx = context_at(fixed_now());

        let reply =
            dispatch(services(&remote, &trigger, &notifier), &ctx, 42, "/update live nope")
                .expect("dispatch");
        assert!(!reply.ok);
        assert_eq!(remote.comments(), vec![(42, reply.message.clone())]);
        assert!(reply.message.contains("no JSON found"));
    }

    #[test]
    fn dispatch_surfaces_post_failure() {
        let remote = FakeRemote::new("main");
        remote.fail_comments();
        let trigger = FakeTrigger::succeeding();
        let notifier = FakeNotifier::unconfigured();
        let ctx = context_at(fixed_now());

        let err = dispatch(services(&remote, &trigger, &notifier), &ctx, 7, "/help").unwrap_err();
        assert!(err.to_string().contains("post reply on issue #7"));
    }
}
