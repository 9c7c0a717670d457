//! Stable exit codes for agent CLI commands.

/// Run finished and every step succeeded.
pub const OK: i32 = 0;
/// Startup failed (missing credentials, invalid config, unreachable remote) or
/// the outcome could not be reported.
pub const INVALID: i32 = 1;
/// Run finished but degraded: a command reply was a failure, or a bootstrap
/// path could not be reconciled.
pub const DEGRADED: i32 = 2;
