//! Process environment: credentials, repository identity and file locations.

use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::io::github::DEFAULT_API_URL;
use crate::io::notify::WEBHOOK_SECRET;

pub const DEFAULT_CONFIG_PATH: &str = "agent.toml";

/// Values read once from the environment at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub token: String,
    pub owner: String,
    pub repo: String,
    /// Overrides the remote's default branch when set.
    pub default_branch: Option<String>,
    pub api_url: String,
    pub webhook_url: Option<String>,
    pub config_path: PathBuf,
    /// GitHub Actions event payload, for `agent command` without `--text`.
    pub event_path: Option<PathBuf>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("default_branch", &self.default_branch)
            .field("api_url", &self.api_url)
            .field("webhook_configured", &self.webhook_url.is_some())
            .field("config_path", &self.config_path)
            .field("event_path", &self.event_path)
            .finish_non_exhaustive()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = get("GITHUB_TOKEN").ok_or_else(|| anyhow!("GITHUB_TOKEN is not set"))?;
        let repository = get("GITHUB_REPOSITORY")
            .ok_or_else(|| anyhow!("GITHUB_REPOSITORY is not set (expected owner/name)"))?;
        let (owner, repo) = parse_repository(&repository)?;

        Ok(Self {
            token,
            owner,
            repo,
            default_branch: get("DEFAULT_BRANCH"),
            api_url: get("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            webhook_url: get(WEBHOOK_SECRET),
            config_path: get("AGENT_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            event_path: get("GITHUB_EVENT_PATH").map(PathBuf::from),
        })
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

fn parse_repository(value: &str) -> Result<(String, String)> {
    match value.split_once('/') {
        Some((owner, name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => Err(anyhow!(
            "GITHUB_REPOSITORY must look like owner/name, got '{value}'"
        )),
    }
}
