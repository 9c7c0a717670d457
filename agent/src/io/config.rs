//! Agent configuration, read from a TOML file (default `agent.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Agent configuration (TOML).
///
/// Edited by humans. Every field has a default, so a missing file or a partial
/// file is never fatal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Display-only timezone shown in the checklist.
    pub timezone: String,
    pub site: SiteConfig,
    pub gotm: GotmConfig,
    pub deploy: DeployConfig,
    pub notify: NotifyConfig,
    pub bot: BotConfig,
    pub checklist: ChecklistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SiteConfig {
    /// Desired-file-set, reconciled in order.
    pub ensure_files: Vec<String>,
    /// Squash-merge reconcile PRs immediately.
    pub auto_merge: bool,
    /// Target of `/update live`.
    pub live_path: String,
    /// Target of `/update table`.
    pub table_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GotmConfig {
    pub vote_window_days: u32,
    pub channels: Vec<String>,
    /// Where the vote state document lives.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeployConfig {
    /// Workflow file dispatched after data updates.
    pub workflow: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotifyConfig {
    /// Upper bound for a single webhook POST.
    pub timeout_secs: u64,
    /// `source` field of every webhook envelope.
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BotConfig {
    pub committer_name: String,
    pub committer_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChecklistConfig {
    pub title: String,
}

/// Longest vote window `gotm.vote_window_days` accepts.
pub const MAX_VOTE_WINDOW_DAYS: u32 = 366;

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/London".to_string(),
            site: SiteConfig::default(),
            gotm: GotmConfig::default(),
            deploy: DeployConfig::default(),
            notify: NotifyConfig::default(),
            bot: BotConfig::default(),
            checklist: ChecklistConfig::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            ensure_files: vec!["data/table.json".to_string(), "data/live.json".to_string()],
            auto_merge: false,
            live_path: "data/live.json".to_string(),
            table_path: "data/table.json".to_string(),
        }
    }
}

impl Default for GotmConfig {
    fn default() -> Self {
        Self {
            vote_window_days: 7,
            channels: Vec::new(),
            path: "data/gotm.json".to_string(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            workflow: "deploy.yml".to_string(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            source: "repo-agent".to_string(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            committer_name: "repo-agent-bot".to_string(),
            committer_email: "bot@example.com".to_string(),
        }
    }
}

impl Default for ChecklistConfig {
    fn default() -> Self {
        Self {
            title: "Agent Checklist".to_string(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        for path in self
            .site
            .ensure_files
            .iter()
            .chain([&self.site.live_path, &self.site.table_path, &self.gotm.path])
        {
            validate_repo_path(path)?;
        }
        if self.gotm.vote_window_days == 0 {
            return Err(anyhow!("gotm.vote_window_days must be > 0"));
        }
        if self.gotm.vote_window_days > MAX_VOTE_WINDOW_DAYS {
            return Err(anyhow!(
                "gotm.vote_window_days must be <= {MAX_VOTE_WINDOW_DAYS}"
            ));
        }
        let gotm_path = self.gotm.path.trim();
        if self
            .site
            .ensure_files
            .iter()
            .chain([&self.site.live_path, &self.site.table_path])
            .any(|path| path.trim() == gotm_path)
        {
            return Err(anyhow!(
                "gotm.path '{gotm_path}' must not also be a site data file"
            ));
        }
        if self.notify.timeout_secs == 0 {
            return Err(anyhow!("notify.timeout_secs must be > 0"));
        }
        if self.deploy.workflow.trim().is_empty() {
            return Err(anyhow!("deploy.workflow must be non-empty"));
        }
        if self.checklist.title.trim().is_empty() {
            return Err(anyhow!("checklist.title must be non-empty"));
        }
        Ok(())
    }

    /// TOML rendering of the active configuration, for reports.
    pub fn snapshot(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serialize config toml")
    }
}

fn validate_repo_path(path: &str) -> Result<()> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("repository paths must be non-empty"));
    }
    if trimmed.starts_with('/') || trimmed.split('/').any(|part| part == "..") {
        return Err(anyhow!(
            "repository path '{path}' must be relative to the repository root"
        ));
    }
    Ok(())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    debug!(path = %path.display(), files = cfg.site.ensure_files.len(), "config loaded");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
        assert_eq!(cfg.gotm.vote_window_days, 7);
        assert!(cfg.gotm.channels.is_empty());
        assert_eq!(
            cfg.site.ensure_files,
            vec!["data/table.json".to_string(), "data/live.json".to_string()]
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent.toml");
        fs::write(
            &path,
            "timezone = \"UTC\"\n\n[site]\nensure_files = [\"data/fixtures.json\"]\n\n[gotm]\nchannels = [\"x\", \"instagram\"]\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.timezone, "UTC");
        assert_eq!(cfg.site.ensure_files, vec!["data/fixtures.json".to_string()]);
        assert_eq!(cfg.site.live_path, "data/live.json");
        assert_eq!(cfg.gotm.vote_window_days, 7);
        assert_eq!(cfg.gotm.channels, vec!["x".to_string(), "instagram".to_string()]);
    }

    #[test]
    fn zero_vote_window_is_rejected() {
        let mut cfg = AgentConfig::default();
        cfg.gotm.vote_window_days = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("vote_window_days"));
    }

    #[test]
    fn vote_window_has_upper_bound() {
        let mut cfg = AgentConfig::default();
        cfg.gotm.vote_window_days = MAX_VOTE_WINDOW_DAYS;
        cfg.validate().expect("max window is valid");
        cfg.gotm.vote_window_days = 200_000_000;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("vote_window_days must be <= 366"));
    }

    #[test]
    fn gotm_path_cannot_be_a_site_file() {
        let mut cfg = AgentConfig::default();
        cfg.site.ensure_files.push("data/gotm.json".to_string());
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("gotm.path 'data/gotm.json'"));

        let mut cfg = AgentConfig::default();
        cfg.gotm.path = cfg.site.live_path.clone();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn absolute_and_parent_paths_are_rejected() {
        let mut cfg = AgentConfig::default();
        cfg.site.ensure_files = vec!["/etc/passwd".to_string()];
        assert!(cfg.validate().is_err());
        cfg.site.ensure_files = vec!["data/../../x.json".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent.toml");
        fs::write(&path, "timezone = [").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parse"));
    }

    #[test]
    fn snapshot_round_trips() {
        let cfg = AgentConfig::default();
        let snapshot = cfg.snapshot().expect("snapshot");
        let parsed: AgentConfig = toml::from_str(&snapshot).expect("parse snapshot");
        assert_eq!(parsed, cfg);
    }
}
