//! Orchestration for ensuring desired files exist on the default branch.
//!
//! Each pass is probe → branch → commit → pull request → optional merge. No
//! state is kept between runs: the default branch is re-probed every time, so
//! a pass interrupted half-way is either finished or skipped by the next one.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::context::AgentContext;
use crate::core::starter::{StarterGenerator, to_file_contents};
use crate::core::types::{PathReport, ReconcileOutcome, ReconcileStatus};
use crate::io::remote::{BranchCreation, FileWrite, PullRequest, RemoteError, RemoteStore};

/// A file that must exist, and how to produce it when it does not.
pub struct EnsureSpec<'g> {
    pub path: String,
    pub generator: &'g dyn StarterGenerator,
}

impl<'g> EnsureSpec<'g> {
    pub fn new(path: impl Into<String>, generator: &'g dyn StarterGenerator) -> Self {
        Self {
            path: path.into(),
            generator,
        }
    }
}

/// Branch for creating `path`, unique to the minute.
///
/// Two runs in the same minute share the branch; the second one finds it and
/// continues on it.
pub fn branch_name(path: &str, now: DateTime<Utc>) -> String {
    let slug: String = path
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    format!("agent/ensure-{slug}-{}", now.format("%Y%m%d%H%M"))
}

pub fn commit_message(path: &str) -> String {
    format!("chore(agent): ensure {path}")
}

fn pr_title(path: &str) -> String {
    format!("chore(agent): add starter {path}")
}

fn pr_body(path: &str, default_branch: &str) -> String {
    format!(
        "`{path}` is missing from `{default_branch}`.\n\n\
         This pull request adds minimal starter content so the site can render. \
         Opened automatically by the repository agent."
    )
}

/// Ensure `spec.path` exists on the default branch.
#[instrument(skip_all, fields(path = %spec.path))]
pub fn ensure<R: RemoteStore + ?Sized>(
    remote: &R,
    ctx: &AgentContext,
    spec: &EnsureSpec<'_>,
) -> Result<ReconcileOutcome> {
    let base = &ctx.repo.default_branch;
    if remote
        .read_file(&spec.path, base)
        .with_context(|| format!("probe {} on {base}", spec.path))?
        .is_some()
    {
        debug!("present on default branch");
        return Ok(ReconcileOutcome::exists(&spec.path));
    }

    let branch = branch_name(&spec.path, ctx.started_at);
    let head = remote
        .branch_head(base)
        .with_context(|| format!("resolve head of {base}"))?;
    match remote
        .create_branch(&branch, &head)
        .with_context(|| format!("create branch {branch}"))?
    {
        BranchCreation::Created => info!(branch = %branch, "created branch"),
        BranchCreation::AlreadyExists => {
            info!(branch = %branch, "branch already exists, continuing on it");
        }
    }

    commit_starter(remote, ctx, spec, &branch)?;
    let pull = open_or_reuse_pull_request(remote, &spec.path, &branch, base)?;

    if !ctx.config.site.auto_merge {
        return Ok(ReconcileOutcome {
            path: spec.path.clone(),
            status: ReconcileStatus::PrOpened,
            pr_url: Some(pull.url),
            merge_error: None,
        });
    }

    match remote.merge_pull_request(pull.number) {
        Ok(()) => {
            info!(number = pull.number, "merged pull request");
            Ok(ReconcileOutcome {
                path: spec.path.clone(),
                status: ReconcileStatus::Merged,
                pr_url: Some(pull.url),
                merge_error: None,
            })
        }
        Err(err) => {
            warn!(number = pull.number, error = %err, "merge failed, leaving pull request open");
            Ok(ReconcileOutcome {
                path: spec.path.clone(),
                status: ReconcileStatus::PrOpened,
                pr_url: Some(pull.url),
                merge_error: Some(err.to_string()),
            })
        }
    }
}

/// Commit starter content on `branch` unless an earlier run already did.
fn commit_starter<R: RemoteStore + ?Sized>(
    remote: &R,
    ctx: &AgentContext,
    spec: &EnsureSpec<'_>,
    branch: &str,
) -> Result<()> {
    if remote
        .read_file(&spec.path, branch)
        .with_context(|| format!("probe {} on {branch}", spec.path))?
        .is_some()
    {
        debug!(branch, "starter already committed on branch");
        return Ok(());
    }

    let contents = to_file_contents(&spec.generator.generate(&spec.path))
        .context("serialize starter content")?;
    let message = commit_message(&spec.path);
    let committer = ctx.committer();
    let write = FileWrite {
        path: &spec.path,
        branch,
        content: &contents,
        message: &message,
        prior_sha: None,
        committer: &committer,
    };
    match remote.write_file(&write) {
        Ok(()) => {
            info!(branch, "committed starter content");
            Ok(())
        }
        Err(RemoteError::AlreadyExists(_)) => {
            debug!(branch, "starter committed concurrently");
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("commit {} on {branch}", spec.path)),
    }
}

fn open_or_reuse_pull_request<R: RemoteStore + ?Sized>(
    remote: &R,
    path: &str,
    branch: &str,
    base: &str,
) -> Result<PullRequest> {
    match remote.open_pull_request(branch, base, &pr_title(path), &pr_body(path, base)) {
        Ok(pull) => {
            info!(number = pull.number, url = %pull.url, "opened pull request");
            Ok(pull)
        }
        Err(RemoteError::AlreadyExists(_)) => remote
            .find_pull_request(branch, base)
            .with_context(|| format!("look up existing pull request for {branch}"))?
            .ok_or_else(|| anyhow!("pull request for {branch} reported as existing but not found")),
        Err(err) => Err(err).with_context(|| format!("open pull request for {branch}")),
    }
}

/// Ensure every configured file, in order. One failure does not stop the rest.
#[instrument(skip_all, fields(count = ctx.config.site.ensure_files.len()))]
pub fn ensure_all<R: RemoteStore + ?Sized>(
    remote: &R,
    ctx: &AgentContext,
    generator: &dyn StarterGenerator,
) -> Vec<PathReport> {
    ctx.config
        .site
        .ensure_files
        .iter()
        .map(|path| {
            let spec = EnsureSpec::new(path.as_str(), generator);
            match ensure(remote, ctx, &spec) {
                Ok(outcome) => PathReport::Reconciled(outcome),
                Err(err) => {
                    let error = format!("{err:#}");
                    warn!(path = %path, error = %error, "ensure failed");
                    PathReport::Failed {
                        path: path.clone(),
                        error,
                    }
                }
            }
        })
        .collect()
}
