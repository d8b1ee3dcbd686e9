//! Stable exit codes for agentflow CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed, or a gate/run it reported on did not pass.
pub const FAILURE: i32 = 1;
