//! Shared data model for registry, configuration, and execution log documents.
//!
//! These types only describe persisted shapes and pure merges; loading and
//! storing them lives in [`crate::io`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered project. Identity is the canonical absolute `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub adapter: String,
    pub enabled: bool,
    pub metadata: ProjectMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_flow: Option<GitFlowOverride>,
    pub registered_at: DateTime<Utc>,
}

/// Snapshot of the project's own manifest taken at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectMetadata {
    pub description: String,
    pub version: String,
    pub features: Vec<String>,
}

/// Branch naming and guardrail rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitFlowPolicy {
    pub production_branch: String,
    pub development_branch: String,
    pub feature_prefix: String,
    pub release_prefix: String,
    pub hotfix_prefix: String,
    pub require_clean_worktree: bool,
    pub require_upstream: bool,
    pub pre_push_checks: Vec<String>,
}

impl Default for GitFlowPolicy {
    fn default() -> Self {
        Self {
            production_branch: "main".to_string(),
            development_branch: "develop".to_string(),
            feature_prefix: "feature/".to_string(),
            release_prefix: "release/".to_string(),
            hotfix_prefix: "hotfix/".to_string(),
            require_clean_worktree: true,
            require_upstream: true,
            pre_push_checks: Vec::new(),
        }
    }
}

impl GitFlowPolicy {
    /// Apply a per-project override; every present field wins.
    pub fn merged(&self, over: Option<&GitFlowOverride>) -> GitFlowPolicy {
        let Some(over) = over else {
            return self.clone();
        };
        GitFlowPolicy {
            production_branch: pick(&over.production_branch, &self.production_branch),
            development_branch: pick(&over.development_branch, &self.development_branch),
            feature_prefix: pick(&over.feature_prefix, &self.feature_prefix),
            release_prefix: pick(&over.release_prefix, &self.release_prefix),
            hotfix_prefix: pick(&over.hotfix_prefix, &self.hotfix_prefix),
            require_clean_worktree: over
                .require_clean_worktree
                .unwrap_or(self.require_clean_worktree),
            require_upstream: over.require_upstream.unwrap_or(self.require_upstream),
            pre_push_checks: pick(&over.pre_push_checks, &self.pre_push_checks),
        }
    }
}

fn pick<T: Clone>(over: &Option<T>, base: &T) -> T {
    over.clone().unwrap_or_else(|| base.clone())
}

/// Partial [`GitFlowPolicy`] stored on a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitFlowOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub development_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotfix_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_clean_worktree: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_upstream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_push_checks: Option<Vec<String>>,
}

/// Outcome class recorded for one agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    Success,
    Failure,
}

impl RunResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// One line of a project's execution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub project_id: String,
    pub agent_id: String,
    pub tool_id: String,
    /// `None` when the agent could not be spawned or was killed by a signal.
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub result: RunResult,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_without_override_is_global() {
        let global = GitFlowPolicy::default();
        assert_eq!(global.merged(None), global);
    }

    #[test]
    fn project_override_wins_per_key() {
        let global = GitFlowPolicy::default();
        let over = GitFlowOverride {
            development_branch: Some("dev".to_string()),
            require_upstream: Some(false),
            pre_push_checks: Some(vec!["test".to_string()]),
            ..GitFlowOverride::default()
        };

        let merged = global.merged(Some(&over));
        assert_eq!(merged.development_branch, "dev");
        assert!(!merged.require_upstream);
        assert_eq!(merged.pre_push_checks, vec!["test"]);
        assert_eq!(merged.production_branch, "main");
        assert_eq!(merged.feature_prefix, "feature/");
        assert!(merged.require_clean_worktree);
    }

    #[test]
    fn override_serializes_only_present_fields() {
        let over = GitFlowOverride {
            hotfix_prefix: Some("fix/".to_string()),
            ..GitFlowOverride::default()
        };
        let json = serde_json::to_string(&over).expect("serialize");
        assert_eq!(json, r#"{"hotfixPrefix":"fix/"}"#);
    }
}
