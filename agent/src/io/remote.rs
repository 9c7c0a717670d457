//! Remote repository abstraction.
//!
//! [`RemoteStore`] decouples reconciliation and command handling from the
//! hosting API (currently GitHub REST). Tests use the in-memory fake from
//! `test_support`, which never touches the network.

use thiserror::Error;

use crate::core::types::{BuildStatus, NotifyOutcome, TriggerOutcome};

/// Errors surfaced by remote adapters.
///
/// Callers branch on the variant: `AlreadyExists` is a tolerated race during
/// reconciliation, everything else is reported to the user.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic write lost against a newer revision.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("remote API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// A file read from a ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: String,
    /// Blob revision token, required when overwriting.
    pub sha: String,
}

/// Tri-state branch creation; the third state is `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchCreation {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
}

/// Author recorded on commits made by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

/// A create-or-update file write.
#[derive(Debug, Clone)]
pub struct FileWrite<'a> {
    pub path: &'a str,
    pub branch: &'a str,
    pub content: &'a str,
    pub message: &'a str,
    /// `None` creates the file; `Some(sha)` replaces that exact revision.
    pub prior_sha: Option<&'a str>,
    pub committer: &'a Committer,
}

/// Remote content store with branch/PR/issue semantics.
pub trait RemoteStore {
    /// Default branch as configured on the remote.
    fn default_branch(&self) -> RemoteResult<String>;

    /// Read `path` at `git_ref`; `Ok(None)` when the file does not exist.
    fn read_file(&self, path: &str, git_ref: &str) -> RemoteResult<Option<RemoteFile>>;

    /// Commit sha at the tip of `branch`.
    fn branch_head(&self, branch: &str) -> RemoteResult<String>;

    fn create_branch(&self, name: &str, from_sha: &str) -> RemoteResult<BranchCreation>;

    fn write_file(&self, write: &FileWrite<'_>) -> RemoteResult<()>;

    /// Open pull request from `head` into `base`, if any.
    fn find_pull_request(&self, head: &str, base: &str) -> RemoteResult<Option<PullRequest>>;

    fn open_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> RemoteResult<PullRequest>;

    /// Squash-merge.
    fn merge_pull_request(&self, number: u64) -> RemoteResult<()>;

    fn list_open_issues(&self) -> RemoteResult<Vec<Issue>>;

    fn create_issue(&self, title: &str, body: &str) -> RemoteResult<Issue>;

    fn update_issue_body(&self, number: u64, body: &str) -> RemoteResult<()>;

    fn comment_on_issue(&self, number: u64, body: &str) -> RemoteResult<()>;

    /// Most recent workflow run on `branch`, if any.
    fn latest_build_status(&self, branch: &str) -> RemoteResult<Option<BuildStatus>>;
}

/// Fire-and-forget workflow dispatch. Never fails; the outcome says how it went.
pub trait WorkflowTrigger {
    fn dispatch(&self, workflow: &str, git_ref: &str) -> TriggerOutcome;
}

/// Outbound webhook notifier.
pub trait Notifier {
    /// Whether a destination is configured, without sending anything.
    fn is_configured(&self) -> bool;

    fn notify(&self, event_type: &str) -> NotifyOutcome;
}
