//! Deterministic, pure logic shared by the agent.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod checklist;
pub mod command;
pub mod gotm;
pub mod payload;
pub mod starter;
pub mod types;
