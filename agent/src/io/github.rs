//! GitHub REST adapter for [`RemoteStore`] and [`WorkflowTrigger`].
//!
//! Blocking client: every call is one round-trip and the agent never has more
//! than one request in flight.

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::core::types::{BuildStatus, TriggerOutcome};
use crate::io::remote::{
    BranchCreation, FileWrite, Issue, PullRequest, RemoteError, RemoteFile, RemoteResult,
    RemoteStore, WorkflowTrigger,
};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const ISSUES_PAGE_SIZE: usize = 100;

/// Client bound to one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(api_url: &str, owner: &str, repo: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("GITHUB_TOKEN is not a valid header value")?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("repo-agent"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        let http = Client::builder()
            .default_headers(headers)
            .build()
            .context("build github http client")?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn repo_url(&self, tail: &str) -> String {
        if tail.is_empty() {
            format!("{}/repos/{}/{}", self.api_url, self.owner, self.repo)
        } else {
            format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.repo, tail)
        }
    }

    fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = request
            .send()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let err = classify(status, &body);
        debug!(status = status.as_u16(), error = %err, "github request failed");
        Err(err)
    }

    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        self.send(request)?
            .json()
            .map_err(|err| RemoteError::Decode(err.to_string()))
    }
}

/// Map a non-2xx GitHub response onto [`RemoteError`].
///
/// GitHub reports most collisions as 422 with the detail in `errors[].message`;
/// a create-write against an existing file fails with "sha wasn't supplied".
fn classify(status: StatusCode, body: &str) -> RemoteError {
    let message = error_message(body);
    let lowered = message.to_lowercase();
    match status.as_u16() {
        404 => RemoteError::NotFound(message),
        409 => RemoteError::Conflict(message),
        422 if lowered.contains("already exists") || lowered.contains("wasn't supplied") => {
            RemoteError::AlreadyExists(message)
        }
        _ => RemoteError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    let mut parts: Vec<String> = Vec::new();
    if let Some(msg) = value.get("message").and_then(Value::as_str) {
        parts.push(msg.to_string());
    }
    if let Some(errors) = value.get("errors").and_then(Value::as_array) {
        parts.extend(
            errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .map(str::to_string),
        );
    }
    if parts.is_empty() {
        body.trim().to_string()
    } else {
        parts.join(": ")
    }
}

#[derive(Deserialize)]
struct RepoResponse {
    default_branch: String,
}

#[derive(Deserialize)]
struct ContentResponse {
    content: String,
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
}

impl From<PullResponse> for PullRequest {
    fn from(value: PullResponse) -> Self {
        PullRequest {
            number: value.number,
            url: value.html_url,
        }
    }
}

#[derive(Deserialize)]
struct IssueResponse {
    number: u64,
    title: String,
    body: Option<String>,
    /// Present when the "issue" is a pull request.
    pull_request: Option<Value>,
}

impl From<IssueResponse> for Issue {
    fn from(value: IssueResponse) -> Self {
        Issue {
            number: value.number,
            title: value.title,
            body: value.body.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct RunsResponse {
    workflow_runs: Vec<RunResponse>,
}

#[derive(Deserialize)]
struct RunResponse {
    name: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
    html_url: Option<String>,
}

fn decode_content(encoded: &str) -> RemoteResult<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|err| RemoteError::Decode(format!("base64 content: {err}")))?;
    String::from_utf8(bytes).map_err(|err| RemoteError::Decode(format!("utf-8 content: {err}")))
}

impl RemoteStore for GitHubClient {
    #[instrument(skip_all)]
    fn default_branch(&self) -> RemoteResult<String> {
        let repo: RepoResponse = self.send_json(self.http.get(self.repo_url("")))?;
        debug!(branch = %repo.default_branch, "resolved default branch");
        Ok(repo.default_branch)
    }

    #[instrument(skip_all, fields(path = %path, git_ref = %git_ref))]
    fn read_file(&self, path: &str, git_ref: &str) -> RemoteResult<Option<RemoteFile>> {
        let request = self
            .http
            .get(self.repo_url(&format!("contents/{path}")))
            .query(&[("ref", git_ref)]);
        match self.send_json::<ContentResponse>(request) {
            Ok(body) => Ok(Some(RemoteFile {
                content: decode_content(&body.content)?,
                sha: body.sha,
            })),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn branch_head(&self, branch: &str) -> RemoteResult<String> {
        let head: RefResponse =
            self.send_json(self.http.get(self.repo_url(&format!("git/ref/heads/{branch}"))))?;
        Ok(head.object.sha)
    }

    #[instrument(skip_all, fields(name = %name))]
    fn create_branch(&self, name: &str, from_sha: &str) -> RemoteResult<BranchCreation> {
        let request = self
            .http
            .post(self.repo_url("git/refs"))
            .json(&json!({"ref": format!("refs/heads/{name}"), "sha": from_sha}));
        match self.send(request) {
            Ok(_) => Ok(BranchCreation::Created),
            Err(RemoteError::AlreadyExists(_)) => Ok(BranchCreation::AlreadyExists),
            Err(err) => Err(err),
        }
    }

    #[instrument(skip_all, fields(path = write.path, branch = write.branch))]
    fn write_file(&self, write: &FileWrite<'_>) -> RemoteResult<()> {
        let mut body = json!({
            "message": write.message,
            "content": STANDARD.encode(write.content),
            "branch": write.branch,
            "committer": {
                "name": write.committer.name,
                "email": write.committer.email,
            },
        });
        if let Some(sha) = write.prior_sha {
            body["sha"] = Value::String(sha.to_string());
        }
        let request = self
            .http
            .put(self.repo_url(&format!("contents/{}", write.path)))
            .json(&body);
        self.send(request)?;
        Ok(())
    }

    fn find_pull_request(&self, head: &str, base: &str) -> RemoteResult<Option<PullRequest>> {
        let qualified = format!("{}:{head}", self.owner);
        let request = self.http.get(self.repo_url("pulls")).query(&[
            ("head", qualified.as_str()),
            ("base", base),
            ("state", "open"),
        ]);
        let pulls: Vec<PullResponse> = self.send_json(request)?;
        Ok(pulls.into_iter().next().map(PullRequest::from))
    }

    #[instrument(skip_all, fields(head = %head, base = %base))]
    fn open_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> RemoteResult<PullRequest> {
        let request = self.http.post(self.repo_url("pulls")).json(&json!({
            "title": title,
            "head": head,
            "base": base,
            "body": body,
        }));
        let pull: PullResponse = self.send_json(request)?;
        Ok(pull.into())
    }

    #[instrument(skip_all, fields(number = number))]
    fn merge_pull_request(&self, number: u64) -> RemoteResult<()> {
        let request = self
            .http
            .put(self.repo_url(&format!("pulls/{number}/merge")))
            .json(&json!({"merge_method": "squash"}));
        self.send(request)?;
        Ok(())
    }

    fn list_open_issues(&self) -> RemoteResult<Vec<Issue>> {
        let mut issues = Vec::new();
        for page in 1.. {
            let page_param = page.to_string();
            let per_page = ISSUES_PAGE_SIZE.to_string();
            let request = self.http.get(self.repo_url("issues")).query(&[
                ("state", "open"),
                ("per_page", per_page.as_str()),
                ("page", page_param.as_str()),
            ]);
            let batch: Vec<IssueResponse> = self.send_json(request)?;
            let len = batch.len();
            issues.extend(
                batch
                    .into_iter()
                    .filter(|issue| issue.pull_request.is_none())
                    .map(Issue::from),
            );
            if len < ISSUES_PAGE_SIZE {
                break;
            }
        }
        Ok(issues)
    }

    #[instrument(skip_all)]
    fn create_issue(&self, title: &str, body: &str) -> RemoteResult<Issue> {
        let request = self
            .http
            .post(self.repo_url("issues"))
            .json(&json!({"title": title, "body": body}));
        let issue: IssueResponse = self.send_json(request)?;
        Ok(issue.into())
    }

    fn update_issue_body(&self, number: u64, body: &str) -> RemoteResult<()> {
        let request = self
            .http
            .patch(self.repo_url(&format!("issues/{number}")))
            .json(&json!({"body": body}));
        self.send(request)?;
        Ok(())
    }

    fn comment_on_issue(&self, number: u64, body: &str) -> RemoteResult<()> {
        let request = self
            .http
            .post(self.repo_url(&format!("issues/{number}/comments")))
            .json(&json!({"body": body}));
        self.send(request)?;
        Ok(())
    }

    fn latest_build_status(&self, branch: &str) -> RemoteResult<Option<BuildStatus>> {
        let request = self
            .http
            .get(self.repo_url("actions/runs"))
            .query(&[("branch", branch), ("per_page", "1")]);
        let runs: RunsResponse = match self.send_json(request) {
            Ok(runs) => runs,
            // Actions disabled on the repository.
            Err(RemoteError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        Ok(runs.workflow_runs.into_iter().next().map(|run| BuildStatus {
            name: run.name.unwrap_or_else(|| "workflow".to_string()),
            status: run.status.unwrap_or_else(|| "unknown".to_string()),
            conclusion: run.conclusion,
            url: run.html_url,
        }))
    }
}

impl WorkflowTrigger for GitHubClient {
    #[instrument(skip_all, fields(workflow = %workflow, git_ref = %git_ref))]
    fn dispatch(&self, workflow: &str, git_ref: &str) -> TriggerOutcome {
        let request = self
            .http
            .post(self.repo_url(&format!("actions/workflows/{workflow}/dispatches")))
            .json(&json!({"ref": git_ref}));
        match request.send() {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    warn!(status = status.as_u16(), "workflow dispatch rejected");
                }
                TriggerOutcome {
                    ok: status.is_success(),
                    status: Some(status.as_u16()),
                }
            }
            Err(err) => {
                warn!(error = %err, "workflow dispatch failed");
                TriggerOutcome {
                    ok: false,
                    status: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::remote::Committer;
    use mockito::Matcher;

    fn client(server: &mockito::Server) -> GitHubClient {
        GitHubClient::new(&server.url(), "octo", "site", "token").expect("client")
    }

    #[test]
    fn read_file_decodes_wrapped_base64() {
        let mut server = mockito::Server::new();
        let encoded = STANDARD.encode("{\n  \"rows\": []\n}\n");
        let (head, tail) = encoded.split_at(8);
        let mock = server
            .mock("GET", "/repos/octo/site/contents/data/table.json")
            .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_body(json!({"content": format!("{head}\n{tail}"), "sha": "abc"}).to_string())
            .create();

        let file = client(&server)
            .read_file("data/table.json", "main")
            .expect("read")
            .expect("present");
        mock.assert();
        assert_eq!(file.content, "{\n  \"rows\": []\n}\n");
        assert_eq!(file.sha, "abc");
    }

    #[test]
    fn read_file_maps_404_to_none() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/repos/octo/site/contents/data/live.json")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"Not Found"}"#)
            .create();

        let file = client(&server).read_file("data/live.json", "main").expect("read");
        assert!(file.is_none());
    }

    #[test]
    fn create_branch_reports_existing_reference() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/repos/octo/site/git/refs")
            .match_body(Matcher::PartialJson(json!({"ref": "refs/heads/agent/x"})))
            .with_status(422)
            .with_body(r#"{"message":"Reference already exists"}"#)
            .create();

        let result = client(&server).create_branch("agent/x", "deadbeef").expect("create");
        assert_eq!(result, BranchCreation::AlreadyExists);
    }

    #[test]
    fn create_branch_propagates_other_failures() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/repos/octo/site/git/refs")
            .with_status(403)
            .with_body(r#"{"message":"Resource not accessible by integration"}"#)
            .create();

        let err = client(&server).create_branch("agent/x", "deadbeef").unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 403, .. }));
    }

    #[test]
    fn write_file_sends_prior_sha_and_committer() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/repos/octo/site/contents/data/live.json")
            .match_body(Matcher::PartialJson(json!({
                "branch": "main",
                "sha": "old",
                "content": STANDARD.encode("{}\n"),
                "committer": {"name": "bot", "email": "bot@example.com"},
            })))
            .with_status(200)
            .with_body("{}")
            .create();

        let committer = Committer {
            name: "bot".to_string(),
            email: "bot@example.com".to_string(),
        };
        client(&server)
            .write_file(&FileWrite {
                path: "data/live.json",
                branch: "main",
                content: "{}\n",
                message: "update",
                prior_sha: Some("old"),
                committer: &committer,
            })
            .expect("write");
        mock.assert();
    }

    #[test]
    fn duplicate_pull_request_is_already_exists() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/repos/octo/site/pulls")
            .with_status(422)
            .with_body(
                r#"{"message":"Validation Failed","errors":[{"message":"A pull request already exists for octo:agent/x."}]}"#,
            )
            .create();

        let err = client(&server)
            .open_pull_request("agent/x", "main", "t", "b")
            .unwrap_err();
        assert!(matches!(err, RemoteError::AlreadyExists(_)));
    }

    #[test]
    fn list_open_issues_skips_pull_requests() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/repos/octo/site/issues")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("state".into(), "open".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(
                json!([
                    {"number": 1, "title": "Agent Checklist", "body": null},
                    {"number": 2, "title": "PR", "body": "x", "pull_request": {}}
                ])
                .to_string(),
            )
            .create();

        let issues = client(&server).list_open_issues().expect("list");
        assert_eq!(
            issues,
            vec![Issue {
                number: 1,
                title: "Agent Checklist".to_string(),
                body: String::new(),
            }]
        );
    }

    #[test]
    fn latest_build_status_handles_empty_runs() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/repos/octo/site/actions/runs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"total_count":0,"workflow_runs":[]}"#)
            .create();

        assert_eq!(client(&server).latest_build_status("main").expect("probe"), None);
    }

    #[test]
    fn dispatch_reports_status_without_failing() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/repos/octo/site/actions/workflows/deploy.yml/dispatches")
            .match_body(Matcher::Json(json!({"ref": "main"})))
            .with_status(404)
            .create();

        let outcome = client(&server).dispatch("deploy.yml", "main");
        assert_eq!(
            outcome,
            TriggerOutcome {
                ok: false,
                status: Some(404)
            }
        );
    }
}
