//! Deterministic, pure logic shared by the orchestration layer.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod batch;
pub mod branch;
pub mod gate;
pub mod ids;
pub mod repo_status;
pub mod types;
pub mod workflow_state;
