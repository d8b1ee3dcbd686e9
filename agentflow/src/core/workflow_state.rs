//! Workflow document model and its transition rules.
//!
//! Everything here is pure: the engine in [`crate::workflow`] loads a
//! [`Workflow`], applies one of these mutations, and persists the result.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AgentflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// `in_progress` or `paused`: at most one per project.
    pub fn is_active(self) -> bool {
        matches!(self, Self::InProgress | Self::Paused)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Checked transition. Every status change goes through here.
    pub fn apply(self, event: WorkflowEvent) -> Result<WorkflowStatus, AgentflowError> {
        use WorkflowEvent as E;
        use WorkflowStatus as S;
        let next = match (self, event) {
            (S::Pending, E::Start) => S::InProgress,
            (S::InProgress, E::Finish) => S::Completed,
            (S::InProgress, E::Pause) => S::Paused,
            (S::Paused, E::Resume) => S::InProgress,
            (S::Pending | S::InProgress | S::Paused, E::Cancel) => S::Cancelled,
            (S::Pending | S::InProgress | S::Paused, E::Fail) => S::Failed,
            (S::Cancelled | S::Failed, E::ForceRestart) => S::InProgress,
            (from, event) => {
                return Err(AgentflowError::InvalidTransition {
                    from,
                    event: event.as_str(),
                });
            }
        };
        Ok(next)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown workflow status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    Start,
    Finish,
    Pause,
    Resume,
    Cancel,
    Fail,
    ForceRestart,
}

impl WorkflowEvent {
    fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Cancel => "cancel",
            Self::Fail => "fail",
            Self::ForceRestart => "force-restart",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Decision for the agent at the current index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    Complete { result: Option<String> },
    Skip,
    Pause,
    Cancel,
    Fail { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowAgent {
    pub name: String,
    pub order: usize,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub project_id: String,
    pub description: String,
    pub status: WorkflowStatus,
    pub agents: Vec<WorkflowAgent>,
    pub current_agent_index: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// What the loop should do after an outcome was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Halt,
}

impl Workflow {
    pub fn new(
        id: String,
        project_id: String,
        description: String,
        agent_names: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        let agents = agent_names
            .iter()
            .enumerate()
            .map(|(order, name)| WorkflowAgent {
                name: name.clone(),
                order,
                status: AgentStatus::Pending,
                started_at: None,
                completed_at: None,
                result: None,
            })
            .collect();
        Self {
            id,
            project_id,
            description,
            status: WorkflowStatus::Pending,
            agents,
            current_agent_index: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn transition(
        &mut self,
        event: WorkflowEvent,
        now: DateTime<Utc>,
    ) -> Result<(), AgentflowError> {
        self.status = self.status.apply(event)?;
        self.updated_at = now;
        Ok(())
    }

    /// The agent the loop would run next, if any remain.
    pub fn current_agent(&self) -> Option<&WorkflowAgent> {
        self.agents.get(self.current_agent_index)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_agent_index >= self.agents.len()
    }

    /// Mark the current agent as started. No-op when the list is exhausted.
    pub fn begin_current(&mut self, now: DateTime<Utc>) {
        if let Some(agent) = self.agents.get_mut(self.current_agent_index) {
            agent.status = AgentStatus::InProgress;
            agent.started_at = Some(now);
            agent.completed_at = None;
            self.updated_at = now;
        }
    }

    /// Record the outcome for the current agent and move the workflow along.
    ///
    /// The index advances only on `Complete`/`Skip`. `Pause` and `Cancel`
    /// leave the agent `in_progress` so a resume restarts it.
    pub fn apply_outcome(
        &mut self,
        outcome: AgentOutcome,
        now: DateTime<Utc>,
    ) -> Result<LoopControl, AgentflowError> {
        let index = self.current_agent_index;
        let Some(agent) = self.agents.get_mut(index) else {
            return Ok(LoopControl::Halt);
        };
        match outcome {
            AgentOutcome::Complete { result } => {
                agent.status = AgentStatus::Completed;
                agent.completed_at = Some(now);
                agent.result = result;
                self.current_agent_index = index + 1;
                self.updated_at = now;
                Ok(LoopControl::Continue)
            }
            AgentOutcome::Skip => {
                agent.status = AgentStatus::Skipped;
                agent.completed_at = Some(now);
                self.current_agent_index = index + 1;
                self.updated_at = now;
                Ok(LoopControl::Continue)
            }
            AgentOutcome::Pause => {
                self.transition(WorkflowEvent::Pause, now)?;
                Ok(LoopControl::Halt)
            }
            AgentOutcome::Cancel => {
                self.transition(WorkflowEvent::Cancel, now)?;
                Ok(LoopControl::Halt)
            }
            AgentOutcome::Fail { reason } => {
                agent.status = AgentStatus::Failed;
                agent.completed_at = Some(now);
                agent.result = Some(reason);
                self.transition(WorkflowEvent::Fail, now)?;
                Ok(LoopControl::Halt)
            }
        }
    }

    /// Close out a workflow whose agent list has been fully processed.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<(), AgentflowError> {
        self.transition(WorkflowEvent::Finish, now)?;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Reset a failed/cancelled workflow so the loop can run again.
    ///
    /// The agent at the current index goes back to `pending`; earlier agents
    /// keep their recorded status.
    pub fn force_restart(&mut self, now: DateTime<Utc>) -> Result<(), AgentflowError> {
        self.transition(WorkflowEvent::ForceRestart, now)?;
        self.completed_at = None;
        if let Some(agent) = self.agents.get_mut(self.current_agent_index) {
            agent.status = AgentStatus::Pending;
            agent.completed_at = None;
            agent.result = None;
        }
        Ok(())
    }

    /// Structural invariants checked after load.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.current_agent_index > self.agents.len() {
            errors.push(format!(
                "currentAgentIndex {} exceeds agent count {}",
                self.current_agent_index,
                self.agents.len()
            ));
        }
        for (index, agent) in self.agents.iter().enumerate() {
            if agent.order != index {
                errors.push(format!(
                    "agent '{}' has order {} at index {}",
                    agent.name, agent.order, index
                ));
            }
        }
        errors
    }
}
