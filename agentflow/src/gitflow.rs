//! Branch lifecycle automation and the pre-push gate.
//!
//! Everything takes a [`Git`] over any [`VcsRunner`], so the same code runs
//! against a real checkout or scripted git output.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::branch::{BranchKind, FlowKind, classify_branch, validate_flow_name};
use crate::core::gate::{GateReport, Issue, evaluate_health, evaluate_pre_push};
use crate::core::repo_status::RepoStatus;
use crate::core::types::GitFlowPolicy;
use crate::error::AgentflowError;
use crate::io::checks::{CheckRunner, run_checks};
use crate::io::git::{Git, PullOutcome, VcsRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchStart {
    pub branch: String,
    pub base: String,
    pub pull: PullOutcome,
}

/// How the configured pre-push checks are run.
pub struct CheckContext<'a, C: ?Sized> {
    pub runner: &'a C,
    pub workdir: &'a Path,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFinish {
    pub branch: String,
    pub report: GateReport,
    /// True when the gate passed and the branch was pushed.
    pub pushed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    NoUpstream,
    UpToDate,
    /// Behind upstream but the worktree has local changes; nothing pulled.
    DirtyWorktree { behind: u32 },
    Pulled(PullOutcome),
}

pub fn status<R: VcsRunner>(git: &Git<R>) -> Result<RepoStatus> {
    git.status()
}

#[instrument(skip_all, fields(kind = ?kind, name))]
fn start_branch<R: VcsRunner>(
    git: &Git<R>,
    kind: FlowKind,
    name: &str,
    policy: &GitFlowPolicy,
) -> Result<BranchStart> {
    validate_flow_name(name).map_err(AgentflowError::precondition)?;
    let branch = kind.branch_name(name, policy);
    if git.branch_exists(&branch)? {
        return Err(AgentflowError::BranchAlreadyExists(branch).into());
    }

    let base = kind.base_branch(policy).to_string();
    git.checkout(&base)?;
    let pull = git.pull_ff_only()?;
    if let PullOutcome::Failed(stderr) = &pull {
        warn!(base = %base, %stderr, "could not update base branch, continuing");
    }
    git.checkout_new_branch(&branch)?;
    info!(branch = %branch, base = %base, "branch created");
    Ok(BranchStart { branch, base, pull })
}

pub fn start_feature<R: VcsRunner>(
    git: &Git<R>,
    name: &str,
    policy: &GitFlowPolicy,
) -> Result<BranchStart> {
    start_branch(git, FlowKind::Feature, name, policy)
}

pub fn start_release<R: VcsRunner>(
    git: &Git<R>,
    version: &str,
    policy: &GitFlowPolicy,
) -> Result<BranchStart> {
    start_branch(git, FlowKind::Release, version, policy)
}

pub fn start_hotfix<R: VcsRunner>(
    git: &Git<R>,
    name: &str,
    policy: &GitFlowPolicy,
) -> Result<BranchStart> {
    start_branch(git, FlowKind::Hotfix, name, policy)
}

/// Repository state plus every configured check.
#[instrument(skip_all)]
pub fn run_pre_push_gate<R: VcsRunner, C: CheckRunner + ?Sized>(
    git: &Git<R>,
    policy: &GitFlowPolicy,
    checks: &CheckContext<'_, C>,
) -> Result<GateReport> {
    let status = git.status()?;
    let results = run_checks(
        checks.runner,
        &policy.pre_push_checks,
        checks.workdir,
        checks.timeout,
        checks.output_limit_bytes,
    );
    let report = evaluate_pre_push(&status, policy, &results);
    info!(
        passed = report.passed,
        errors = report.error_count(),
        issues = report.issues.len(),
        "pre-push gate evaluated"
    );
    Ok(report)
}

/// Gate the current feature branch and push it when the gate passes.
#[instrument(skip_all)]
pub fn finish_feature<R: VcsRunner, C: CheckRunner + ?Sized>(
    git: &Git<R>,
    policy: &GitFlowPolicy,
    checks: &CheckContext<'_, C>,
) -> Result<FeatureFinish> {
    let branch = git.current_branch()?.ok_or_else(|| {
        AgentflowError::precondition_with_fix(
            "HEAD is detached",
            format!("git checkout {}<name>", policy.feature_prefix),
        )
    })?;
    if classify_branch(&branch, policy).kind != BranchKind::Feature {
        return Err(AgentflowError::precondition_with_fix(
            format!("'{branch}' is not a feature branch"),
            format!("git checkout {}<name>", policy.feature_prefix),
        )
        .into());
    }

    // The push below sets the upstream.
    let gate_policy = GitFlowPolicy {
        require_upstream: false,
        ..policy.clone()
    };
    let report = run_pre_push_gate(git, &gate_policy, checks)?;
    let pushed = report.passed;
    if pushed {
        git.push(&branch, true)?;
        info!(branch = %branch, "feature branch pushed");
    }
    Ok(FeatureFinish {
        branch,
        report,
        pushed,
    })
}

/// Fetch, then fast-forward when behind with a clean worktree.
#[instrument(skip_all)]
pub fn sync<R: VcsRunner>(git: &Git<R>) -> Result<SyncOutcome> {
    git.fetch_prune()?;
    let status = git.status()?;
    if status.upstream.is_none() {
        return Ok(SyncOutcome::NoUpstream);
    }
    if status.behind == 0 {
        return Ok(SyncOutcome::UpToDate);
    }
    if !status.is_clean() {
        warn!(behind = status.behind, "worktree dirty, not pulling");
        return Ok(SyncOutcome::DirtyWorktree {
            behind: status.behind,
        });
    }
    Ok(SyncOutcome::Pulled(git.pull_ff_only()?))
}

/// Health findings for display; never blocks anything.
pub fn health_issues<R: VcsRunner>(git: &Git<R>, policy: &GitFlowPolicy) -> Result<Vec<Issue>> {
    let status = git.status()?;
    let rebasing = git.rebase_in_progress()?;
    Ok(evaluate_health(&status, policy, rebasing))
}
