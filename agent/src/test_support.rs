//! Test-only in-memory collaborators and context builders.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone, Utc};

use crate::context::{AgentContext, Services};
use crate::core::types::{BuildStatus, NotifyOutcome, RepositoryContext, TriggerOutcome};
use crate::io::config::AgentConfig;
use crate::io::remote::{
    BranchCreation, FileWrite, Issue, Notifier, PullRequest, RemoteError, RemoteFile,
    RemoteResult, RemoteStore, WorkflowTrigger,
};

/// 2024-03-09 14:05:00 UTC.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0)
        .single()
        .expect("valid fixed time")
}

/// `octo/site` on `main`.
pub fn repo_context() -> RepositoryContext {
    RepositoryContext::new("octo", "site", "main")
}

/// Context with default configuration, started at `now`.
pub fn context_at(now: DateTime<Utc>) -> AgentContext {
    AgentContext::new(repo_context(), AgentConfig::default(), now)
}

#[derive(Debug, Clone)]
struct FakePull {
    number: u64,
    head: String,
    base: String,
    open: bool,
}

#[derive(Debug, Clone)]
struct FakeIssue {
    number: u64,
    title: String,
    body: String,
    open: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    /// branch -> path -> (content, sha)
    branches: BTreeMap<String, BTreeMap<String, (String, String)>>,
    pulls: Vec<FakePull>,
    issues: Vec<FakeIssue>,
    comments: Vec<(u64, String)>,
    commit_messages: Vec<String>,
    mutations: usize,
    next_number: u64,
    next_sha: u64,
    fail_branch_creation: bool,
    merge_rejection: Option<String>,
    failing_reads: BTreeSet<String>,
    fail_comments: bool,
    fail_writes: bool,
    build: Option<BuildStatus>,
    fail_build_probe: bool,
}

/// In-memory [`RemoteStore`] with GitHub-like collision behavior.
#[derive(Debug)]
pub struct FakeRemote {
    default_branch: String,
    state: RefCell<FakeState>,
}

impl FakeRemote {
    pub fn new(default_branch: &str) -> Self {
        let mut state = FakeState {
            next_number: 1,
            next_sha: 1,
            ..FakeState::default()
        };
        state
            .branches
            .insert(default_branch.to_string(), BTreeMap::new());
        Self {
            default_branch: default_branch.to_string(),
            state: RefCell::new(state),
        }
    }

    pub fn seed_file(&self, branch: &str, path: &str, content: &str) {
        let mut state = self.state.borrow_mut();
        let sha = next_sha(&mut state);
        state
            .branches
            .entry(branch.to_string())
            .or_default()
            .insert(path.to_string(), (content.to_string(), sha));
    }

    pub fn seed_branch(&self, branch: &str) {
        let mut state = self.state.borrow_mut();
        let files = state
            .branches
            .get(&self.default_branch)
            .cloned()
            .unwrap_or_default();
        state.branches.insert(branch.to_string(), files);
    }

    pub fn seed_issue(&self, title: &str, body: &str) -> u64 {
        let mut state = self.state.borrow_mut();
        let number = next_number(&mut state);
        state.issues.push(FakeIssue {
            number,
            title: title.to_string(),
            body: body.to_string(),
            open: true,
        });
        number
    }

    pub fn fail_branch_creation(&self) {
        self.state.borrow_mut().fail_branch_creation = true;
    }

    pub fn reject_merges(&self, reason: &str) {
        self.state.borrow_mut().merge_rejection = Some(reason.to_string());
    }

    pub fn fail_reads_for(&self, path: &str) {
        self.state.borrow_mut().failing_reads.insert(path.to_string());
    }

    /// Make every file write fail as the API would on a server error.
    pub fn fail_writes(&self) {
        self.state.borrow_mut().fail_writes = true;
    }

    pub fn fail_comments(&self) {
        self.state.borrow_mut().fail_comments = true;
    }

    pub fn set_build(&self, build: Option<BuildStatus>) {
        self.state.borrow_mut().build = build;
    }

    pub fn fail_build_probe(&self) {
        self.state.borrow_mut().fail_build_probe = true;
    }

    /// Merge every open pull request, as a maintainer would between runs.
    pub fn merge_all_open(&self) {
        let numbers: Vec<u64> = self
            .state
            .borrow()
            .pulls
            .iter()
            .filter(|p| p.open)
            .map(|p| p.number)
            .collect();
        for number in numbers {
            merge_into_base(&mut self.state.borrow_mut(), number);
        }
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        self.state
            .borrow()
            .branches
            .get(branch)
            .and_then(|files| files.get(path))
            .map(|(content, _)| content.clone())
    }

    pub fn mutation_count(&self) -> usize {
        self.state.borrow().mutations
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.state.borrow().commit_messages.clone()
    }

    pub fn open_pull_count(&self) -> usize {
        self.state.borrow().pulls.iter().filter(|p| p.open).count()
    }

    pub fn comments(&self) -> Vec<(u64, String)> {
        self.state.borrow().comments.clone()
    }

    pub fn open_issues_titled(&self, title: &str) -> Vec<(u64, String)> {
        self.state
            .borrow()
            .issues
            .iter()
            .filter(|issue| issue.open && issue.title == title)
            .map(|issue| (issue.number, issue.body.clone()))
            .collect()
    }
}

fn next_number(state: &mut FakeState) -> u64 {
    let number = state.next_number;
    state.next_number += 1;
    number
}

fn next_sha(state: &mut FakeState) -> String {
    let sha = format!("sha{}", state.next_sha);
    state.next_sha += 1;
    sha
}

fn merge_into_base(state: &mut FakeState, number: u64) {
    let Some(pull) = state.pulls.iter_mut().find(|p| p.number == number) else {
        return;
    };
    pull.open = false;
    let (head, base) = (pull.head.clone(), pull.base.clone());
    let head_files = state.branches.get(&head).cloned().unwrap_or_default();
    let base_files = state.branches.entry(base).or_default();
    for (path, entry) in head_files {
        base_files.insert(path, entry);
    }
}

fn pull_url(number: u64) -> String {
    format!("https://github.test/octo/site/pull/{number}")
}

impl RemoteStore for FakeRemote {
    fn default_branch(&self) -> RemoteResult<String> {
        Ok(self.default_branch.clone())
    }

    fn read_file(&self, path: &str, git_ref: &str) -> RemoteResult<Option<RemoteFile>> {
        let state = self.state.borrow();
        if state.failing_reads.contains(path) {
            return Err(RemoteError::Api {
                status: 500,
                message: "Server Error".to_string(),
            });
        }
        Ok(state
            .branches
            .get(git_ref)
            .and_then(|files| files.get(path))
            .map(|(content, sha)| RemoteFile {
                content: content.clone(),
                sha: sha.clone(),
            }))
    }

    fn branch_head(&self, branch: &str) -> RemoteResult<String> {
        if self.state.borrow().branches.contains_key(branch) {
            Ok(format!("head-{branch}"))
        } else {
            Err(RemoteError::NotFound(format!("branch {branch}")))
        }
    }

    fn create_branch(&self, name: &str, _from_sha: &str) -> RemoteResult<BranchCreation> {
        let mut state = self.state.borrow_mut();
        if state.fail_branch_creation {
            return Err(RemoteError::Api {
                status: 403,
                message: "Resource not accessible by integration".to_string(),
            });
        }
        if state.branches.contains_key(name) {
            return Ok(BranchCreation::AlreadyExists);
        }
        let files = state
            .branches
            .get(&self.default_branch)
            .cloned()
            .unwrap_or_default();
        state.branches.insert(name.to_string(), files);
        state.mutations += 1;
        Ok(BranchCreation::Created)
    }

    fn write_file(&self, write: &FileWrite<'_>) -> RemoteResult<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(RemoteError::Api {
                status: 502,
                message: "Bad Gateway".to_string(),
            });
        }
        let sha = next_sha(&mut state);
        let files = state
            .branches
            .get_mut(write.branch)
            .ok_or_else(|| RemoteError::NotFound(format!("branch {}", write.branch)))?;
        match (write.prior_sha, files.get(write.path)) {
            (None, Some(_)) => {
                return Err(RemoteError::AlreadyExists(
                    "Invalid request. \"sha\" wasn't supplied.".to_string(),
                ));
            }
            (Some(prior), Some((_, current))) if prior != current => {
                return Err(RemoteError::Conflict(format!(
                    "{} does not match {prior}",
                    write.path
                )));
            }
            (Some(prior), None) => {
                return Err(RemoteError::Conflict(format!(
                    "{} was deleted after revision {prior}",
                    write.path
                )));
            }
            _ => {}
        }
        files.insert(write.path.to_string(), (write.content.to_string(), sha));
        state.commit_messages.push(write.message.to_string());
        state.mutations += 1;
        Ok(())
    }

    fn find_pull_request(&self, head: &str, base: &str) -> RemoteResult<Option<PullRequest>> {
        Ok(self
            .state
            .borrow()
            .pulls
            .iter()
            .find(|p| p.open && p.head == head && p.base == base)
            .map(|p| PullRequest {
                number: p.number,
                url: pull_url(p.number),
            }))
    }

    fn open_pull_request(
        &self,
        head: &str,
        base: &str,
        _title: &str,
        _body: &str,
    ) -> RemoteResult<PullRequest> {
        let mut state = self.state.borrow_mut();
        if state
            .pulls
            .iter()
            .any(|p| p.open && p.head == head && p.base == base)
        {
            return Err(RemoteError::AlreadyExists(format!(
                "A pull request already exists for octo:{head}."
            )));
        }
        let number = next_number(&mut state);
        state.pulls.push(FakePull {
            number,
            head: head.to_string(),
            base: base.to_string(),
            open: true,
        });
        state.mutations += 1;
        Ok(PullRequest {
            number,
            url: pull_url(number),
        })
    }

    fn merge_pull_request(&self, number: u64) -> RemoteResult<()> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = &state.merge_rejection {
            return Err(RemoteError::Api {
                status: 405,
                message: reason.clone(),
            });
        }
        if !state.pulls.iter().any(|p| p.number == number && p.open) {
            return Err(RemoteError::NotFound(format!("pull {number}")));
        }
        merge_into_base(&mut state, number);
        state.mutations += 1;
        Ok(())
    }

    fn list_open_issues(&self) -> RemoteResult<Vec<Issue>> {
        Ok(self
            .state
            .borrow()
            .issues
            .iter()
            .filter(|issue| issue.open)
            .map(|issue| Issue {
                number: issue.number,
                title: issue.title.clone(),
                body: issue.body.clone(),
            })
            .collect())
    }

    fn create_issue(&self, title: &str, body: &str) -> RemoteResult<Issue> {
        let mut state = self.state.borrow_mut();
        let number = next_number(&mut state);
        state.issues.push(FakeIssue {
            number,
            title: title.to_string(),
            body: body.to_string(),
            open: true,
        });
        state.mutations += 1;
        Ok(Issue {
            number,
            title: title.to_string(),
            body: body.to_string(),
        })
    }

    fn update_issue_body(&self, number: u64, body: &str) -> RemoteResult<()> {
        let mut state = self.state.borrow_mut();
        let issue = state
            .issues
            .iter_mut()
            .find(|issue| issue.number == number)
            .ok_or_else(|| RemoteError::NotFound(format!("issue {number}")))?;
        issue.body = body.to_string();
        state.mutations += 1;
        Ok(())
    }

    fn comment_on_issue(&self, number: u64, body: &str) -> RemoteResult<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_comments {
            return Err(RemoteError::Transport("connection reset".to_string()));
        }
        state.comments.push((number, body.to_string()));
        state.mutations += 1;
        Ok(())
    }

    fn latest_build_status(&self, _branch: &str) -> RemoteResult<Option<BuildStatus>> {
        let state = self.state.borrow();
        if state.fail_build_probe {
            return Err(RemoteError::Transport("timed out".to_string()));
        }
        Ok(state.build.clone())
    }
}

/// Records dispatches and answers with a fixed outcome.
#[derive(Debug)]
pub struct FakeTrigger {
    outcome: TriggerOutcome,
    calls: RefCell<Vec<(String, String)>>,
}

impl FakeTrigger {
    pub fn succeeding() -> Self {
        Self::with_outcome(TriggerOutcome {
            ok: true,
            status: Some(204),
        })
    }

    pub fn failing(status: u16) -> Self {
        Self::with_outcome(TriggerOutcome {
            ok: false,
            status: Some(status),
        })
    }

    fn with_outcome(outcome: TriggerOutcome) -> Self {
        Self {
            outcome,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// `(workflow, ref)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.borrow().clone()
    }
}

impl WorkflowTrigger for FakeTrigger {
    fn dispatch(&self, workflow: &str, git_ref: &str) -> TriggerOutcome {
        self.calls
            .borrow_mut()
            .push((workflow.to_string(), git_ref.to_string()));
        self.outcome.clone()
    }
}

/// Records event types and answers with a fixed outcome.
#[derive(Debug)]
pub struct FakeNotifier {
    outcome: NotifyOutcome,
    sent: RefCell<Vec<String>>,
    probes: Cell<usize>,
}

impl FakeNotifier {
    pub fn new(outcome: NotifyOutcome) -> Self {
        Self {
            outcome,
            sent: RefCell::new(Vec::new()),
            probes: Cell::new(0),
        }
    }

    pub fn unconfigured() -> Self {
        Self::new(NotifyOutcome::Unconfigured)
    }

    pub fn delivering() -> Self {
        Self::new(NotifyOutcome::Delivered { status: 200 })
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.get()
    }
}

impl Notifier for FakeNotifier {
    fn is_configured(&self) -> bool {
        self.probes.set(self.probes.get() + 1);
        self.outcome != NotifyOutcome::Unconfigured
    }

    fn notify(&self, event_type: &str) -> NotifyOutcome {
        if self.outcome != NotifyOutcome::Unconfigured {
            self.sent.borrow_mut().push(event_type.to_string());
        }
        self.outcome.clone()
    }
}

/// Bundle fakes into [`Services`].
pub fn services<'a>(
    remote: &'a FakeRemote,
    trigger: &'a FakeTrigger,
    notifier: &'a FakeNotifier,
) -> Services<'a> {
    Services {
        remote,
        trigger,
        notifier,
    }
}
