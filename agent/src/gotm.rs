//! `/gotm open` and `/gotm close`: persist the vote window in the repository
//! and tell the outside world about it.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::context::{AgentContext, Services};
use crate::core::gotm::{GotmState, close_vote, open_vote};
use crate::core::starter::to_file_contents;
use crate::core::types::NotifyOutcome;
use crate::io::remote::{FileWrite, RemoteFile, RemoteStore};
use crate::update::trigger_deploy;

pub const OPEN_EVENT: &str = "gotm_open";
pub const CLOSE_EVENT: &str = "gotm_close";

/// Current vote document on the default branch, with its blob sha.
pub fn read_state<R: RemoteStore + ?Sized>(
    remote: &R,
    ctx: &AgentContext,
) -> Result<Option<(GotmState, String)>> {
    let path = &ctx.config.gotm.path;
    let base = &ctx.repo.default_branch;
    let Some(RemoteFile { content, sha }) = remote
        .read_file(path, base)
        .with_context(|| format!("read {path} on {base}"))?
    else {
        return Ok(None);
    };
    let state: GotmState =
        serde_json::from_str(&content).with_context(|| format!("parse {path}"))?;
    Ok(Some((state, sha)))
}

fn write_state(
    services: Services<'_>,
    ctx: &AgentContext,
    state: &GotmState,
    prior_sha: Option<&str>,
    message: &str,
) -> Result<()> {
    let path = &ctx.config.gotm.path;
    let base = &ctx.repo.default_branch;
    let value = serde_json::to_value(state).context("serialize vote state")?;
    let contents = to_file_contents(&value).context("serialize vote state")?;
    let committer = ctx.committer();
    services
        .remote
        .write_file(&FileWrite {
            path,
            branch: base,
            content: &contents,
            message,
            prior_sha,
            committer: &committer,
        })
        .with_context(|| format!("write {path} on {base}"))
}

fn announce(services: Services<'_>, ctx: &AgentContext, event: &str) -> Vec<String> {
    let mut caveats = Vec::new();
    if let NotifyOutcome::Failed { summary } = services.notifier.notify(event) {
        caveats.push(format!("⚠️ Make webhook unreachable ({summary})."));
    }
    caveats.extend(trigger_deploy(services, ctx));
    caveats
}

fn with_caveats(mut reply: String, caveats: Vec<String>) -> String {
    for caveat in caveats {
        reply.push('\n');
        reply.push_str(&caveat);
    }
    reply
}

/// Open a vote; `label` is whatever followed the command word.
#[instrument(skip_all)]
pub fn open(services: Services<'_>, ctx: &AgentContext, label: &str) -> Result<String> {
    let current = read_state(services.remote, ctx)?;
    let (state, sha) = current.unzip();
    let next = open_vote(
        state.as_ref(),
        ctx.started_at,
        ctx.config.gotm.vote_window_days,
        &ctx.config.gotm.channels,
        Some(label),
    )?;
    write_state(
        services,
        ctx,
        &next,
        sha.as_deref(),
        "chore(agent): open GOTM vote",
    )?;
    info!(closes_at = %next.closes_at, "vote opened");

    let reply = format!(
        "✅ GOTM vote{} open until {} ({} days).",
        next.label
            .as_deref()
            .map(|l| format!(" \"{l}\""))
            .unwrap_or_default(),
        next.closes_at.format("%Y-%m-%d %H:%M UTC"),
        ctx.config.gotm.vote_window_days
    );
    Ok(with_caveats(reply, announce(services, ctx, OPEN_EVENT)))
}

#[instrument(skip_all)]
pub fn close(services: Services<'_>, ctx: &AgentContext) -> Result<String> {
    let current = read_state(services.remote, ctx)?;
    let (state, sha) = current.unzip();
    let next = close_vote(state.as_ref(), ctx.started_at)?;
    write_state(
        services,
        ctx,
        &next,
        sha.as_deref(),
        "chore(agent): close GOTM vote",
    )?;
    info!("vote closed");

    let reply = "✅ GOTM vote closed.".to_string();
    Ok(with_caveats(reply, announce(services, ctx, CLOSE_EVENT)))
}
