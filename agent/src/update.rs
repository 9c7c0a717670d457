//! `/update live` and `/update table`: overwrite a site data file from a
//! payload embedded in the command, then kick the deploy workflow.

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument, warn};

use crate::context::{AgentContext, Services};
use crate::core::payload::extract;
use crate::core::starter::to_file_contents;
use crate::io::remote::FileWrite;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTarget {
    Live,
    Table,
}

impl UpdateTarget {
    pub fn path(self, ctx: &AgentContext) -> &str {
        match self {
            UpdateTarget::Live => &ctx.config.site.live_path,
            UpdateTarget::Table => &ctx.config.site.table_path,
        }
    }

    fn command(self) -> &'static str {
        match self {
            UpdateTarget::Live => "/update live",
            UpdateTarget::Table => "/update table",
        }
    }
}

/// Dispatch the deploy workflow on the default branch.
///
/// Returns a caveat line for the reply when the dispatch failed.
pub fn trigger_deploy(services: Services<'_>, ctx: &AgentContext) -> Option<String> {
    let workflow = &ctx.config.deploy.workflow;
    let outcome = services
        .trigger
        .dispatch(workflow, &ctx.repo.default_branch);
    if outcome.ok {
        info!(workflow = %workflow, "deploy dispatched");
        None
    } else {
        warn!(workflow = %workflow, outcome = %outcome.summary(), "deploy dispatch failed");
        Some(format!(
            "⚠️ Deploy workflow `{workflow}` {}; the change goes live with the next deploy.",
            outcome.summary()
        ))
    }
}

fn write_payload(
    services: Services<'_>,
    ctx: &AgentContext,
    target: UpdateTarget,
    contents: &str,
) -> Result<()> {
    let path = target.path(ctx);
    let base = &ctx.repo.default_branch;
    let prior = services
        .remote
        .read_file(path, base)
        .with_context(|| format!("read {path} on {base}"))?;
    let message = format!("chore(agent): update {path} via {}", target.command());
    let committer = ctx.committer();
    services
        .remote
        .write_file(&FileWrite {
            path,
            branch: base,
            content: contents,
            message: &message,
            prior_sha: prior.as_ref().map(|file| file.sha.as_str()),
            committer: &committer,
        })
        .with_context(|| format!("write {path} on {base}"))?;
    info!(path, "data file updated");
    Ok(())
}

/// Apply the payload in `rest` to the target file. Nothing is written when
/// extraction fails.
///
/// Once a payload is extracted the deploy workflow is dispatched whether or
/// not the write went through; a failed write still fails the command.
#[instrument(skip_all, fields(target = ?target))]
pub fn apply_update(
    services: Services<'_>,
    ctx: &AgentContext,
    target: UpdateTarget,
    rest: &str,
) -> Result<String> {
    let value = extract(rest)?;
    let contents = to_file_contents(&value).context("serialize payload")?;

    let written = write_payload(services, ctx, target, &contents);
    let deploy_note = match trigger_deploy(services, ctx) {
        Some(caveat) => format!("\n{caveat}"),
        None => format!(" Deploy `{}` triggered.", ctx.config.deploy.workflow),
    };

    match written {
        Ok(()) => Ok(format!(
            "✅ Updated `{}` on `{}`.{deploy_note}",
            target.path(ctx),
            ctx.repo.default_branch
        )),
        Err(err) => Err(anyhow!("{err:#}.{deploy_note}")),
    }
}
