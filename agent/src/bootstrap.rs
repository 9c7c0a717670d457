//! Non-interactive run: reconcile the desired files, probe the collaborators,
//! then publish the checklist.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::checklist::{SyncOutcome, sync_checklist};
use crate::context::{AgentContext, Services};
use crate::core::checklist::ChecklistReport;
use crate::core::starter::SuffixStarter;
use crate::core::types::{BuildStatus, NotifyOutcome, PathReport};
use crate::io::remote::RemoteStore;
use crate::reconcile::ensure_all;

/// Webhook event type sent on every bootstrap run.
pub const BOOTSTRAP_EVENT: &str = "bootstrap";

#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub paths: Vec<PathReport>,
    pub build: Option<BuildStatus>,
    pub notifier: NotifyOutcome,
    pub checklist: SyncOutcome,
}

impl BootstrapReport {
    /// True when at least one path hard-failed.
    pub fn has_failures(&self) -> bool {
        self.paths
            .iter()
            .any(|report| matches!(report, PathReport::Failed { .. }))
    }
}

/// Latest build on the default branch; probe errors are logged and read as `None`.
pub fn probe_build<R: RemoteStore + ?Sized>(remote: &R, ctx: &AgentContext) -> Option<BuildStatus> {
    match remote.latest_build_status(&ctx.repo.default_branch) {
        Ok(build) => build,
        Err(err) => {
            warn!(error = %err, "build status probe failed");
            None
        }
    }
}

#[instrument(skip_all, fields(repo = %ctx.repo.slug()))]
pub fn run_bootstrap(services: Services<'_>, ctx: &AgentContext) -> Result<BootstrapReport> {
    let starter = SuffixStarter::with_default_rules(ctx.started_at);
    let paths = ensure_all(services.remote, ctx, &starter);
    let build = probe_build(services.remote, ctx);
    let notifier = services.notifier.notify(BOOTSTRAP_EVENT);

    let report = ChecklistReport {
        repo: ctx.repo.clone(),
        build: build.clone(),
        paths: paths.clone(),
        notifier: notifier.clone(),
        config_snapshot: ctx.config.snapshot()?,
        timezone: ctx.config.timezone.clone(),
        generated_at: ctx.started_at,
    };
    let checklist =
        sync_checklist(services.remote, ctx, &report).context("synchronize checklist issue")?;
    info!(
        issue = checklist.issue_number(),
        all_ok = report.all_paths_ok(),
        "bootstrap complete"
    );

    Ok(BootstrapReport {
        paths,
        build,
        notifier,
        checklist,
    })
}
