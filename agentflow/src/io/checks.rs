//! Pre-push check commands.
//!
//! A check name resolves to the argv configured under `checks` in the
//! workspace config; unknown names run as a shell command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::gate::CheckResult;
use crate::io::process::run_command;

#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub name: String,
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

pub trait CheckRunner {
    fn run(&self, request: &CheckRequest) -> Result<CheckResult>;
}

/// Runs checks as child processes in the project directory.
#[derive(Debug, Clone, Default)]
pub struct CommandCheckRunner {
    checks: BTreeMap<String, Vec<String>>,
}

impl CommandCheckRunner {
    pub fn new(checks: BTreeMap<String, Vec<String>>) -> Self {
        Self { checks }
    }

    fn command_for(&self, name: &str, workdir: &Path) -> Result<Command> {
        let mut cmd = match self.checks.get(name) {
            Some(argv) => {
                let (program, args) = argv
                    .split_first()
                    .ok_or_else(|| anyhow!("check '{name}' has an empty command"))?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            None => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(name);
                cmd
            }
        };
        cmd.current_dir(workdir);
        Ok(cmd)
    }
}

impl CheckRunner for CommandCheckRunner {
    #[instrument(skip_all, fields(check = %request.name))]
    fn run(&self, request: &CheckRequest) -> Result<CheckResult> {
        let cmd = self.command_for(&request.name, &request.workdir)?;
        let output = match run_command(cmd, Some(request.timeout), request.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "check failed to start");
                return Ok(CheckResult {
                    name: request.name.clone(),
                    passed: false,
                    detail: format!("failed to start: {err:#}"),
                });
            }
        };

        let (passed, detail) = if output.timed_out {
            (
                false,
                format!("timed out after {}s", request.timeout.as_secs()),
            )
        } else if output.status.success() {
            (true, "ok".to_string())
        } else {
            let code = output
                .status
                .code()
                .map_or("signal".to_string(), |c| c.to_string());
            let stderr = output.stderr_text();
            match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
                Some(last) => (false, format!("exit {code}: {}", last.trim())),
                None => (false, format!("exit {code}")),
            }
        };
        info!(passed, %detail, "check finished");
        Ok(CheckResult {
            name: request.name.clone(),
            passed,
            detail,
        })
    }
}

/// Run each named check in order. Runner errors count as failed checks.
pub fn run_checks<C: CheckRunner + ?Sized>(
    runner: &C,
    names: &[String],
    workdir: &Path,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Vec<CheckResult> {
    names
        .iter()
        .map(|name| {
            let request = CheckRequest {
                name: name.clone(),
                workdir: workdir.to_path_buf(),
                timeout,
                output_limit_bytes,
            };
            runner.run(&request).unwrap_or_else(|err| CheckResult {
                name: name.clone(),
                passed: false,
                detail: format!("{err:#}"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, workdir: &Path) -> CheckRequest {
        CheckRequest {
            name: name.to_string(),
            workdir: workdir.to_path_buf(),
            timeout: Duration::from_secs(10),
            output_limit_bytes: 4096,
        }
    }

    #[test]
    fn configured_argv_runs_in_project_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("marker"), "").expect("write");
        let mut checks = BTreeMap::new();
        checks.insert(
            "has-marker".to_string(),
            vec!["test".to_string(), "-f".to_string(), "marker".to_string()],
        );
        let runner = CommandCheckRunner::new(checks);

        let result = runner
            .run(&request("has-marker", temp.path()))
            .expect("run");
        assert!(result.passed, "{result:?}");
        assert_eq!(result.detail, "ok");
    }

    #[test]
    fn unknown_name_runs_through_shell_and_reports_stderr() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = CommandCheckRunner::default();
        let result = runner
            .run(&request("echo broken >&2; exit 2", temp.path()))
            .expect("run");
        assert!(!result.passed);
        assert_eq!(result.detail, "exit 2: broken");
    }

    #[test]
    fn timeout_counts_as_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = CommandCheckRunner::default();
        let mut req = request("exec sleep 5", temp.path());
        req.timeout = Duration::from_millis(100);
        let result = runner.run(&req).expect("run");
        assert!(!result.passed);
        assert!(result.detail.starts_with("timed out"));
    }

    #[test]
    fn missing_program_is_a_failed_check() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut checks = BTreeMap::new();
        checks.insert(
            "ghost".to_string(),
            vec!["/nonexistent/check-binary".to_string()],
        );
        let results = run_checks(
            &CommandCheckRunner::new(checks),
            &["ghost".to_string(), "true".to_string()],
            temp.path(),
            Duration::from_secs(5),
            1024,
        );
        assert_eq!(results.len(), 2);
        assert!(!results[0].passed);
        assert!(results[0].detail.starts_with("failed to start"));
        assert!(results[1].passed);
    }
}
