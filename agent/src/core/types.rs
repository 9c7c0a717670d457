//! Shared deterministic types for agent core logic.
//!
//! These types carry no I/O and are rebuilt from the remote repository on every
//! invocation; nothing here is persisted locally.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the repository the agent maintains. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryContext {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
}

impl RepositoryContext {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        default_branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            default_branch: default_branch.into(),
        }
    }

    /// `owner/name`, the form GitHub uses in URLs and `GITHUB_REPOSITORY`.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Terminal state of one ensure pass over a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    /// File already present on the default branch; nothing was touched.
    Exists,
    /// A pull request carrying the starter file is open.
    PrOpened,
    /// The pull request was squash-merged in the same run.
    Merged,
}

impl fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReconcileStatus::Exists => "exists",
            ReconcileStatus::PrOpened => "pr_opened",
            ReconcileStatus::Merged => "merged",
        };
        f.write_str(label)
    }
}

/// Result of `reconcile::ensure` for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub path: String,
    pub status: ReconcileStatus,
    pub pr_url: Option<String>,
    /// Why a requested merge did not happen. Only set with `PrOpened`.
    pub merge_error: Option<String>,
}

impl ReconcileOutcome {
    pub fn exists(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: ReconcileStatus::Exists,
            pr_url: None,
            merge_error: None,
        }
    }
}

/// Per-path entry in a bootstrap or `/ensure site` report.
///
/// A hard failure for one path never prevents the remaining paths from being
/// reconciled, so the error is kept as text next to the successes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathReport {
    Reconciled(ReconcileOutcome),
    Failed { path: String, error: String },
}

impl PathReport {
    pub fn path(&self) -> &str {
        match self {
            PathReport::Reconciled(outcome) => &outcome.path,
            PathReport::Failed { path, .. } => path,
        }
    }
}

/// Latest CI/deploy run on the default branch, as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub url: Option<String>,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.conclusion {
            Some(conclusion) => write!(f, "{}: {} ({})", self.name, self.status, conclusion),
            None => write!(f, "{}: {}", self.name, self.status),
        }
    }
}

/// Result of a webhook delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// No webhook URL configured; a reported condition, not an error.
    Unconfigured,
    Delivered { status: u16 },
    Failed { summary: String },
}

impl NotifyOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, NotifyOutcome::Delivered { .. })
    }

    pub fn summary(&self) -> String {
        match self {
            NotifyOutcome::Unconfigured => "not configured".to_string(),
            NotifyOutcome::Delivered { status } => format!("reachable (HTTP {status})"),
            NotifyOutcome::Failed { summary } => format!("unreachable ({summary})"),
        }
    }
}

/// Result of a fire-and-forget workflow dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    pub ok: bool,
    /// HTTP status when the remote answered at all.
    pub status: Option<u16>,
}

impl TriggerOutcome {
    pub fn summary(&self) -> String {
        match (self.ok, self.status) {
            (true, Some(code)) => format!("dispatched (HTTP {code})"),
            (true, None) => "dispatched".to_string(),
            (false, Some(code)) => format!("failed (HTTP {code})"),
            (false, None) => "failed (no response)".to_string(),
        }
    }
}
