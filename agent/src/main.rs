//! Repository steward agent.
//!
//! One invocation per trigger: `bootstrap` on a schedule or push, `command` for
//! an issue comment. All state is rebuilt from the remote on every run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use agent::bootstrap::run_bootstrap;
use agent::context::{AgentContext, Services};
use agent::core::checklist::render_path_line;
use agent::core::types::RepositoryContext;
use agent::exit_codes;
use agent::interpreter::dispatch;
use agent::io::config::{AgentConfig, load_config};
use agent::io::env::{DEFAULT_CONFIG_PATH, Settings};
use agent::io::event::{CommandEvent, load_event};
use agent::io::github::GitHubClient;
use agent::io::notify::WebhookNotifier;
use agent::io::remote::RemoteStore;
use agent::logging;

#[derive(Parser)]
#[command(
    name = "agent",
    version,
    about = "Chat-command driven steward for a static-site repository"
)]
struct Cli {
    /// Config file (overrides `AGENT_CONFIG`, default `agent.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ensure site files exist, probe build and webhook, refresh the checklist issue.
    Bootstrap,
    /// Interpret one command and reply on its issue.
    Command {
        /// Command text; defaults to the body in `GITHUB_EVENT_PATH`.
        #[arg(long, requires = "issue")]
        text: Option<String>,
        /// Issue to reply on; defaults to the event's issue.
        #[arg(long)]
        issue: Option<u64>,
    },
    /// Print the effective configuration as JSON.
    Config,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Config => cmd_config(cli.config),
        Command::Bootstrap => {
            let settings = Settings::from_env()?;
            let config = load_config(&config_path(cli.config, &settings))?;
            cmd_bootstrap(&settings, config)
        }
        Command::Command { text, issue } => {
            let settings = Settings::from_env()?;
            let config = load_config(&config_path(cli.config, &settings))?;
            cmd_command(&settings, config, text, issue)
        }
    }
}

fn config_path(cli_override: Option<PathBuf>, settings: &Settings) -> PathBuf {
    cli_override.unwrap_or_else(|| settings.config_path.clone())
}

fn cmd_config(cli_override: Option<PathBuf>) -> Result<i32> {
    let path = cli_override
        .or_else(|| {
            std::env::var("AGENT_CONFIG")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&path)?;
    let rendered = serde_json::to_string_pretty(&config).context("serialize config json")?;
    println!("{rendered}");
    Ok(exit_codes::OK)
}

/// Live collaborators plus the run context.
struct Runtime {
    github: GitHubClient,
    notifier: WebhookNotifier,
    ctx: AgentContext,
}

impl Runtime {
    fn connect(settings: &Settings, config: AgentConfig) -> Result<Self> {
        let github =
            GitHubClient::new(&settings.api_url, &settings.owner, &settings.repo, &settings.token)?;
        let default_branch = match &settings.default_branch {
            Some(branch) => branch.clone(),
            None => github
                .default_branch()
                .with_context(|| format!("resolve default branch of {}", settings.slug()))?,
        };
        let notifier = WebhookNotifier::new(
            settings.webhook_url.clone(),
            &config.notify.source,
            &settings.slug(),
            Duration::from_secs(config.notify.timeout_secs),
        )?;
        let repo = RepositoryContext::new(&settings.owner, &settings.repo, default_branch);
        info!(repo = %repo.slug(), branch = %repo.default_branch, "agent context ready");
        Ok(Self {
            github,
            notifier,
            ctx: AgentContext::new(repo, config, Utc::now()),
        })
    }

    fn services(&self) -> Services<'_> {
        Services {
            remote: &self.github,
            trigger: &self.github,
            notifier: &self.notifier,
        }
    }
}

fn cmd_bootstrap(settings: &Settings, config: AgentConfig) -> Result<i32> {
    let runtime = Runtime::connect(settings, config)?;
    let report = run_bootstrap(runtime.services(), &runtime.ctx)?;

    for path in &report.paths {
        println!("{}", render_path_line(path));
    }
    println!("webhook: {}", report.notifier.summary());
    println!("checklist: #{}", report.checklist.issue_number());

    if report.has_failures() {
        return Ok(exit_codes::DEGRADED);
    }
    Ok(exit_codes::OK)
}

fn cmd_command(
    settings: &Settings,
    config: AgentConfig,
    text: Option<String>,
    issue: Option<u64>,
) -> Result<i32> {
    let event = match text {
        Some(text) => CommandEvent {
            issue_number: issue.ok_or_else(|| anyhow!("--issue is required with --text"))?,
            text,
            from_bot: false,
        },
        None => {
            let path = settings
                .event_path
                .as_ref()
                .ok_or_else(|| anyhow!("GITHUB_EVENT_PATH is not set; pass --text and --issue"))?;
            let mut event = load_event(path)?;
            if let Some(number) = issue {
                event.issue_number = number;
            }
            event
        }
    };
    if event.from_bot {
        info!(issue = event.issue_number, "ignoring bot-authored event");
        return Ok(exit_codes::OK);
    }

    let runtime = Runtime::connect(settings, config)?;
    let reply = dispatch(
        runtime.services(),
        &runtime.ctx,
        event.issue_number,
        &event.text,
    )?;
    println!("{}", reply.message);

    if reply.verb.is_some() && !reply.ok {
        return Ok(exit_codes::DEGRADED);
    }
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_with_text() {
        let cli = Cli::parse_from(["agent", "command", "--text", "/help", "--issue", "4"]);
        assert!(matches!(
            cli.command,
            Command::Command { text: Some(ref t), issue: Some(4) } if t == "/help"
        ));
    }

    #[test]
    fn text_requires_issue() {
        assert!(Cli::try_parse_from(["agent", "command", "--text", "/help"]).is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["agent", "bootstrap", "--config", "site.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
        assert!(matches!(cli.command, Command::Bootstrap));
    }
}
