//! Pre-push gate and health evaluation over a parsed [`RepoStatus`].
//!
//! Only `Error` issues block a push. Health reporting reuses the gate's git
//! findings and adds repository-state problems that matter for display.

use serde::Serialize;

use crate::core::branch::{BranchKind, classify_branch};
use crate::core::repo_status::RepoStatus;
use crate::core::types::GitFlowPolicy;

/// More commits than this ahead of upstream earns a health warning.
pub const MAX_AHEAD_BEFORE_WARNING: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl Issue {
    pub fn error(message: impl Into<String>, fix: Option<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            fix,
        }
    }

    pub fn warning(message: impl Into<String>, fix: Option<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            fix,
        }
    }
}

/// Outcome of one configured pre-push check command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Short reason shown in the issue (exit code, timeout, spawn error).
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateReport {
    pub passed: bool,
    pub issues: Vec<Issue>,
}

impl GateReport {
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let passed = !issues.iter().any(|i| i.severity == Severity::Error);
        Self { passed, issues }
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }
}

/// Git-state findings shared by the gate and health reporting.
fn git_state_issues(status: &RepoStatus, policy: &GitFlowPolicy) -> Vec<Issue> {
    let mut issues = Vec::new();
    let branch = status.branch.as_deref().unwrap_or("HEAD");

    if policy.require_clean_worktree && !status.is_clean() {
        issues.push(Issue::error(
            format!(
                "working tree has {} uncommitted change(s)",
                status.entries.len()
            ),
            Some("commit or stash your changes".to_string()),
        ));
    }

    if policy.require_upstream && status.upstream.is_none() {
        issues.push(Issue::error(
            format!("branch '{branch}' has no upstream"),
            Some(format!("git push -u origin {branch}")),
        ));
    }

    if let Some(name) = status.branch.as_deref()
        && classify_branch(name, policy).kind == BranchKind::Protected
    {
        issues.push(Issue::warning(
            format!("pushing directly to protected branch '{name}'"),
            Some(format!(
                "push a {}<name> branch and open a pull request",
                policy.feature_prefix
            )),
        ));
    }

    if status.behind > 0 {
        let upstream = status.upstream.as_deref().unwrap_or("upstream");
        issues.push(Issue::error(
            format!("branch is {} commit(s) behind {upstream}", status.behind),
            Some("git pull --rebase".to_string()),
        ));
    }

    issues
}

/// Evaluate the pre-push gate from repository state plus check outcomes.
pub fn evaluate_pre_push(
    status: &RepoStatus,
    policy: &GitFlowPolicy,
    checks: &[CheckResult],
) -> GateReport {
    let mut issues = git_state_issues(status, policy);
    for check in checks.iter().filter(|c| !c.passed) {
        issues.push(Issue::error(
            format!("pre-push check '{}' failed: {}", check.name, check.detail),
            Some(format!("run the '{}' check locally and fix it", check.name)),
        ));
    }
    GateReport::from_issues(issues)
}

/// Health findings for status display. Never gates anything.
pub fn evaluate_health(
    status: &RepoStatus,
    policy: &GitFlowPolicy,
    rebase_in_progress: bool,
) -> Vec<Issue> {
    let mut issues = Vec::new();
    if status.is_detached() {
        issues.push(Issue::error(
            "HEAD is detached",
            Some(format!("git checkout {}", policy.development_branch)),
        ));
    }
    if rebase_in_progress {
        issues.push(Issue::error(
            "rebase in progress",
            Some("git rebase --continue or git rebase --abort".to_string()),
        ));
    }
    if status.conflicts > 0 {
        issues.push(Issue::error(
            format!("{} unresolved merge conflict(s)", status.conflicts),
            Some("resolve the conflicts, then git add the files".to_string()),
        ));
    }
    issues.extend(git_state_issues(status, policy));
    if status.ahead > MAX_AHEAD_BEFORE_WARNING {
        issues.push(Issue::warning(
            format!("{} commits ahead of upstream", status.ahead),
            Some("push your work".to_string()),
        ));
    }
    issues
}
