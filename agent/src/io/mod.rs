//! I/O adapters for agent commands.

pub mod config;
pub mod env;
pub mod event;
pub mod github;
pub mod notify;
pub mod remote;
