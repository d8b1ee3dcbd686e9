//! Agent invocation.
//!
//! An agent is an executable the project ships under `.agentflow/agents/`.
//! Its body is opaque: it receives the tool name and any extra arguments and
//! reports through its exit code.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::error::AgentflowError;
use crate::io::manifest::agents_dir;
use crate::io::process::run_command;

/// Captured result of one agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRun {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl AgentRun {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Combined output for logs.
    pub fn output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Runs an agent against a project. Shared across batch threads.
pub trait AgentInvoker: Sync {
    fn invoke(
        &self,
        project_path: &Path,
        agent: &str,
        tool: &str,
        extra_args: &[String],
    ) -> Result<AgentRun>;
}

/// Production invoker: runs the project's agent script with no timeout.
#[derive(Debug, Clone)]
pub struct ScriptAgentInvoker {
    output_limit_bytes: usize,
}

impl ScriptAgentInvoker {
    pub fn new(output_limit_bytes: usize) -> Self {
        Self { output_limit_bytes }
    }
}

/// Locate `<agent>` or `<agent>.sh` in the project's agents directory.
pub fn resolve_agent_script(project_path: &Path, agent: &str) -> Result<PathBuf> {
    let dir = agents_dir(project_path);
    for candidate in [dir.join(agent), dir.join(format!("{agent}.sh"))] {
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(AgentflowError::AgentNotFound {
        agent: agent.to_string(),
        path: dir,
    }
    .into())
}

impl AgentInvoker for ScriptAgentInvoker {
    #[instrument(skip_all, fields(project = %project_path.display(), agent, tool))]
    fn invoke(
        &self,
        project_path: &Path,
        agent: &str,
        tool: &str,
        extra_args: &[String],
    ) -> Result<AgentRun> {
        let script = resolve_agent_script(project_path, agent)?;
        let mut cmd = if script.extension().is_some_and(|ext| ext == "sh") {
            let mut cmd = Command::new("sh");
            cmd.arg(&script);
            cmd
        } else {
            Command::new(&script)
        };
        cmd.arg(tool).args(extra_args).current_dir(project_path);

        debug!(script = %script.display(), "invoking agent");
        let output = run_command(cmd, None, self.output_limit_bytes)?;
        Ok(AgentRun {
            exit_code: output.status.code(),
            stdout: output.stdout_text(),
            stderr: output.stderr_text(),
        })
    }
}
