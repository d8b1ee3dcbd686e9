//! Git adapter.
//!
//! Every git interaction goes through [`VcsRunner`] so branch automation and
//! the pre-push gate can be exercised against scripted output. Production
//! code uses [`GitCli`], which spawns `git` in the project directory.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::core::repo_status::{RepoStatus, parse_porcelain_v2};
use crate::error::AgentflowError;

/// Raw result of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcsOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl VcsOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
        }
    }
}

/// Executes git with the given arguments. `Err` only when git cannot be run.
pub trait VcsRunner {
    fn exec(&self, args: &[&str]) -> Result<VcsOutput>;
}

impl<T: VcsRunner + ?Sized> VcsRunner for &T {
    fn exec(&self, args: &[&str]) -> Result<VcsOutput> {
        (**self).exec(args)
    }
}

/// Spawns the `git` binary in a working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl VcsRunner for GitCli {
    fn exec(&self, args: &[&str]) -> Result<VcsOutput> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        Ok(VcsOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        })
    }
}

/// Result of a best-effort `git pull --ff-only`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Updated,
    /// Nothing to pull from (no tracking branch, no remote ref, no remote).
    NoUpstream,
    Failed(String),
}

static NO_UPSTREAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)no tracking information|no such ref|couldn't find remote ref|does not appear to be a git repository|no upstream",
    )
    .expect("valid regex")
});

/// Map a failed pull's stderr to an outcome.
pub fn classify_pull_failure(stderr: &str) -> PullOutcome {
    if NO_UPSTREAM_RE.is_match(stderr) {
        PullOutcome::NoUpstream
    } else {
        PullOutcome::Failed(stderr.trim().to_string())
    }
}

/// Typed git operations over a [`VcsRunner`].
#[derive(Debug, Clone)]
pub struct Git<R = GitCli> {
    runner: R,
}

impl Git<GitCli> {
    pub fn open(workdir: impl Into<PathBuf>) -> Self {
        Self::new(GitCli::new(workdir))
    }
}

impl<R: VcsRunner> Git<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    #[instrument(skip_all)]
    pub fn status(&self) -> Result<RepoStatus> {
        let out = self.run_capture(&["status", "--porcelain=v2", "--branch"])?;
        let status = parse_porcelain_v2(&out).map_err(|e| anyhow!("git status: {e}"))?;
        debug!(
            branch = ?status.branch,
            ahead = status.ahead,
            behind = status.behind,
            changes = status.entries.len(),
            "repository status"
        );
        Ok(status)
    }

    /// Current branch name; `None` on detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Ok(None);
        }
        Ok(Some(name.to_string()))
    }

    fn ref_exists(&self, full_ref: &str) -> Result<bool> {
        let out = self
            .runner
            .exec(&["show-ref", "--verify", "--quiet", full_ref])?;
        Ok(out.success)
    }

    /// True if the branch exists locally or as `origin/<branch>`.
    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.ref_exists(&format!("refs/heads/{branch}"))?
            || self.ref_exists(&format!("refs/remotes/origin/{branch}"))?)
    }

    #[instrument(skip_all, fields(branch))]
    pub fn checkout(&self, branch: &str) -> Result<()> {
        debug!(branch, "checking out branch");
        self.run_checked(&["checkout", branch])?;
        Ok(())
    }

    #[instrument(skip_all, fields(branch))]
    pub fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "creating and checking out new branch");
        self.run_checked(&["checkout", "-b", branch])?;
        Ok(())
    }

    /// Fast-forward pull. Failures are classified, never returned as errors.
    #[instrument(skip_all)]
    pub fn pull_ff_only(&self) -> Result<PullOutcome> {
        let out = self.runner.exec(&["pull", "--ff-only"])?;
        if out.success {
            return Ok(PullOutcome::Updated);
        }
        let outcome = classify_pull_failure(&out.stderr);
        debug!(?outcome, "pull did not update");
        Ok(outcome)
    }

    #[instrument(skip_all)]
    pub fn fetch_prune(&self) -> Result<()> {
        self.run_checked(&["fetch", "--prune"])?;
        Ok(())
    }

    #[instrument(skip_all, fields(branch, set_upstream))]
    pub fn push(&self, branch: &str, set_upstream: bool) -> Result<()> {
        if set_upstream {
            self.run_checked(&["push", "-u", "origin", branch])?;
        } else {
            self.run_checked(&["push", "origin", branch])?;
        }
        Ok(())
    }

    /// True while an interactive or apply-style rebase is stopped.
    pub fn rebase_in_progress(&self) -> Result<bool> {
        let out = self.run_capture(&["rev-parse", "--absolute-git-dir"])?;
        let git_dir = PathBuf::from(out.trim());
        Ok(git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        Ok(self.run_checked(args)?.stdout)
    }

    fn run_checked(&self, args: &[&str]) -> Result<VcsOutput> {
        let out = self.runner.exec(args)?;
        if !out.success {
            return Err(AgentflowError::ExternalFailure {
                command: format!("git {}", args.join(" ")),
                exit_code: out.exit_code,
                stderr: out.stderr.trim().to_string(),
            }
            .into());
        }
        Ok(out)
    }
}
