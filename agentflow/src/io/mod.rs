//! Side-effecting adapters: workspace documents, git, child processes.

pub mod agent;
pub mod checks;
pub mod config;
pub mod execution_log;
pub mod git;
pub mod manifest;
pub mod process;
pub mod registry;
pub mod store;
