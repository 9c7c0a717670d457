//! Chat-command driven steward for a static-site repository.
//!
//! The agent runs once per invocation (a scheduled bootstrap or a comment on an
//! issue), rebuilds everything it needs from the remote repository, acts, and
//! exits. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (payload extraction, verb matching,
//!   starter content, checklist rendering, vote windows). No I/O.
//! - **[`io`]**: Side-effecting adapters (GitHub REST, webhook, config, environment)
//!   behind traits so tests can swap in fakes.
//!
//! Orchestration modules ([`reconcile`], [`checklist`], [`bootstrap`],
//! [`interpreter`], [`update`], [`gotm`]) combine the two to implement CLI modes.

pub mod bootstrap;
pub mod checklist;
pub mod context;
pub mod core;
pub mod exit_codes;
pub mod gotm;
pub mod interpreter;
pub mod io;
pub mod logging;
pub mod reconcile;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod update;
