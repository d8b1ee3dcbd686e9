//! Domain errors surfaced to the CLI.
//!
//! Functions return `anyhow::Result`; callers that need to branch on a
//! specific failure recover it with `downcast_ref::<AgentflowError>()`.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::workflow_state::WorkflowStatus;

/// Coarse classification used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    PreconditionFailed,
    ExternalFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::PreconditionFailed => "precondition failed",
            Self::ExternalFailure => "external failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AgentflowError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("no workflow found to resume")]
    NoWorkflowFound,

    #[error("agent '{agent}' not found in {}", path.display())]
    AgentNotFound { agent: String, path: PathBuf },

    #[error("project already registered at {}", path.display())]
    AlreadyRegistered { path: PathBuf },

    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),

    #[error("{} is not initialized (missing .agentflow/project.toml)", path.display())]
    NotInitialized { path: PathBuf },

    #[error("project '{project_id}' already has an active workflow ({workflow_id})")]
    ActiveWorkflowExists {
        project_id: String,
        workflow_id: String,
    },

    #[error("workflow {workflow_id} is {status}; pass --force to restart it")]
    RequiresForce {
        workflow_id: String,
        status: WorkflowStatus,
    },

    #[error("invalid workflow transition: {from} -> {event}")]
    InvalidTransition {
        from: WorkflowStatus,
        event: &'static str,
    },

    #[error("{message}")]
    Precondition {
        message: String,
        fix: Option<String>,
    },

    #[error("{command} exited with {}: {stderr}", exit_code.map_or("signal".to_string(), |c| c.to_string()))]
    ExternalFailure {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl AgentflowError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            fix: None,
        }
    }

    pub fn precondition_with_fix(message: impl Into<String>, fix: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            fix: Some(fix.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProjectNotFound(_)
            | Self::WorkflowNotFound(_)
            | Self::NoWorkflowFound
            | Self::AgentNotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyRegistered { .. } | Self::BranchAlreadyExists(_) => {
                ErrorKind::AlreadyExists
            }
            Self::NotInitialized { .. }
            | Self::ActiveWorkflowExists { .. }
            | Self::RequiresForce { .. }
            | Self::InvalidTransition { .. }
            | Self::Precondition { .. } => ErrorKind::PreconditionFailed,
            Self::ExternalFailure { .. } => ErrorKind::ExternalFailure,
        }
    }

    /// Remediation hint printed under the error, when one exists.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Precondition { fix, .. } => fix.clone(),
            Self::AlreadyRegistered { .. } => Some("pass --force to re-register".to_string()),
            Self::NotInitialized { path } => Some(format!(
                "create {}",
                path.join(".agentflow").join("project.toml").display()
            )),
            Self::ActiveWorkflowExists { workflow_id, .. } => Some(format!(
                "resume it with `agentflow workflow resume {workflow_id}` or cancel it first"
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            AgentflowError::ProjectNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AgentflowError::BranchAlreadyExists("feature/x".into()).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            AgentflowError::precondition("dirty").kind(),
            ErrorKind::PreconditionFailed
        );
        assert_eq!(
            AgentflowError::ExternalFailure {
                command: "git push".into(),
                exit_code: Some(1),
                stderr: String::new(),
            }
            .kind()
            .to_string(),
            "external failure"
        );
    }

    #[test]
    fn downcasts_through_anyhow() {
        let err: anyhow::Error = AgentflowError::NoWorkflowFound.into();
        assert!(matches!(
            err.downcast_ref::<AgentflowError>(),
            Some(AgentflowError::NoWorkflowFound)
        ));
    }

    #[test]
    fn precondition_fix_becomes_hint() {
        let err = AgentflowError::precondition_with_fix("behind", "git pull --rebase");
        assert_eq!(err.hint().as_deref(), Some("git pull --rebase"));
    }
}
