//! Multi-project agent orchestration.
//!
//! `agentflow` sequences named agents against registered projects, tracks
//! that progress durably across restarts, fans a single agent out across
//! every enabled project, and automates gitFlow branching behind a pre-push
//! gate. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (transitions, classification,
//!   gate evaluation, status parsing). No I/O.
//! - **[`io`]**: Side-effecting adapters (workspace documents, git, child
//!   processes), each behind a trait or a store so tests can substitute it.
//!
//! Orchestration modules ([`workflow`], [`parallel`], [`gitflow`],
//! [`outcome`]) combine the two to implement CLI commands.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod gitflow;
pub mod io;
pub mod logging;
pub mod outcome;
pub mod parallel;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
