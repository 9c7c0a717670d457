//! Per-invocation context passed explicitly to every component.

use chrono::{DateTime, Utc};

use crate::core::types::RepositoryContext;
use crate::io::config::AgentConfig;
use crate::io::remote::{Committer, Notifier, RemoteStore, WorkflowTrigger};

/// Everything a run knows about itself. Built once in `main`, never mutated.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub repo: RepositoryContext,
    pub config: AgentConfig,
    /// Invocation timestamp; starter content and branch names derive from it.
    pub started_at: DateTime<Utc>,
}

impl AgentContext {
    pub fn new(repo: RepositoryContext, config: AgentConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            repo,
            config,
            started_at,
        }
    }

    pub fn committer(&self) -> Committer {
        Committer {
            name: self.config.bot.committer_name.clone(),
            email: self.config.bot.committer_email.clone(),
        }
    }
}

/// External collaborators for one run.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub remote: &'a dyn RemoteStore,
    pub trigger: &'a dyn WorkflowTrigger,
    pub notifier: &'a dyn Notifier,
}
