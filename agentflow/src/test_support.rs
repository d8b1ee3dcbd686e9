//! Test helpers: temp workspaces, project fixtures, and scripted fakes for
//! every collaborator trait.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};

use crate::core::gate::CheckResult;
use crate::core::types::Project;
use crate::core::workflow_state::{AgentOutcome, Workflow, WorkflowAgent};
use crate::io::agent::{AgentInvoker, AgentRun};
use crate::io::checks::{CheckRequest, CheckRunner};
use crate::io::git::{VcsOutput, VcsRunner};
use crate::io::manifest::{ProjectManifest, agents_dir, write_manifest};
use crate::io::registry::{RegisterOptions, Registry};
use crate::io::store::WorkspaceStore;
use crate::workflow::AgentOutcomeProvider;

/// Create `<parent>/<name>` with a project manifest and return its path.
pub fn init_project(parent: &Path, name: &str, adapter: &str) -> PathBuf {
    let root = parent.join(name);
    fs::create_dir_all(&root).expect("create project dir");
    write_manifest(
        &root,
        &ProjectManifest {
            adapter: adapter.to_string(),
            version: "0.1.0".to_string(),
            description: format!("{name} fixture"),
            features: vec!["test".to_string()],
        },
    )
    .expect("write manifest");
    root
}

/// Write an executable agent script under the project's agents directory.
pub fn write_agent_script(project_root: &Path, file_name: &str, body: &str) -> PathBuf {
    let dir = agents_dir(project_root);
    fs::create_dir_all(&dir).expect("create agents dir");
    let path = dir.join(file_name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write agent script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod agent");
    }
    path
}

/// Run git in `dir`, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Initialize a repository with one commit on `main` and a `develop` branch.
pub fn init_git_repo(dir: &Path) {
    fs::create_dir_all(dir).expect("create repo dir");
    git(dir, &["init", "-q"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(dir, &["config", "user.email", "dev@example.com"]);
    git(dir, &["config", "user.name", "Dev"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["commit", "-q", "--allow-empty", "-m", "init"]);
    git(dir, &["branch", "develop"]);
}

/// A workspace in a temp dir, with projects created beside it.
pub struct TestWorkspace {
    temp: tempfile::TempDir,
    store: WorkspaceStore,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = WorkspaceStore::open(temp.path().join("workspace")).expect("open workspace");
        Self { temp, store }
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.temp.path().join("projects")
    }

    /// Create and register a project named `name` (its id is `name` too).
    pub fn register(&self, name: &str) -> Project {
        let path = init_project(&self.projects_dir(), name, "node");
        Registry::new(&self.store)
            .register(&path, &RegisterOptions::default())
            .expect("register project")
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Plays back a fixed list of outcomes, then falls back to `fallback` if set.
pub struct ScriptedOutcomeProvider {
    outcomes: VecDeque<AgentOutcome>,
    fallback: Option<AgentOutcome>,
    seen: Vec<String>,
}

impl ScriptedOutcomeProvider {
    pub fn new(outcomes: Vec<AgentOutcome>) -> Self {
        Self {
            outcomes: outcomes.into(),
            fallback: None,
            seen: Vec::new(),
        }
    }

    pub fn all_complete() -> Self {
        Self {
            outcomes: VecDeque::new(),
            fallback: Some(AgentOutcome::Complete { result: None }),
            seen: Vec::new(),
        }
    }

    /// Agent names the provider was asked about, in order.
    pub fn seen(&self) -> &[String] {
        &self.seen
    }
}

impl AgentOutcomeProvider for ScriptedOutcomeProvider {
    fn outcome(&mut self, _workflow: &Workflow, agent: &WorkflowAgent) -> Result<AgentOutcome> {
        self.seen.push(agent.name.clone());
        self.outcomes
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| anyhow!("no scripted outcome for agent '{}'", agent.name))
    }
}

/// Start/finish instants of one fake invocation.
#[derive(Debug, Clone)]
pub struct InvokeSpan {
    pub project: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Agent invoker keyed by project directory name. Exits 0 unless told otherwise.
#[derive(Default)]
pub struct FakeInvoker {
    exit_codes: HashMap<String, i32>,
    errors: HashMap<String, String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    spans: Mutex<Vec<InvokeSpan>>,
}

impl FakeInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exit_code(mut self, project: &str, code: i32) -> Self {
        self.exit_codes.insert(project.to_string(), code);
        self
    }

    pub fn error(mut self, project: &str, message: &str) -> Self {
        self.errors.insert(project.to_string(), message.to_string());
        self
    }

    /// Sleep this long inside every invocation.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `project:agent:tool args...` per invocation, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn spans(&self) -> Vec<InvokeSpan> {
        self.spans.lock().expect("spans lock").clone()
    }
}

impl AgentInvoker for FakeInvoker {
    fn invoke(
        &self,
        project_path: &Path,
        agent: &str,
        tool: &str,
        extra_args: &[String],
    ) -> Result<AgentRun> {
        let started = Instant::now();
        let key = project_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut command = vec![tool.to_string()];
        command.extend(extra_args.iter().cloned());
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("{key}:{agent}:{}", command.join(" ")));

        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let result = match self.errors.get(&key) {
            Some(message) => Err(anyhow!("{message}")),
            None => {
                let code = self.exit_codes.get(&key).copied().unwrap_or(0);
                Ok(AgentRun {
                    exit_code: Some(code),
                    stdout: format!("{agent} {tool} on {key}\n"),
                    stderr: String::new(),
                })
            }
        };
        self.spans.lock().expect("spans lock").push(InvokeSpan {
            project: key,
            started,
            finished: Instant::now(),
        });
        result
    }
}

/// Git runner answering from a table keyed by the joined argument list.
///
/// A key scripted several times answers in order and repeats its last answer.
#[derive(Default)]
pub struct ScriptedVcs {
    responses: Mutex<HashMap<String, VecDeque<VcsOutput>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, args: &str, output: VcsOutput) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .entry(args.to_string())
            .or_default()
            .push_back(output);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl VcsRunner for ScriptedVcs {
    fn exec(&self, args: &[&str]) -> Result<VcsOutput> {
        let key = args.join(" ");
        self.calls.lock().expect("calls lock").push(key.clone());
        let mut responses = self.responses.lock().expect("responses lock");
        let queue = responses
            .get_mut(&key)
            .ok_or_else(|| anyhow!("unscripted git call: git {key}"))?;
        let output = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        output.ok_or_else(|| anyhow!("no output scripted for git {key}"))
    }
}

/// Check runner that passes every check except the ones marked failing.
#[derive(Default)]
pub struct ScriptedChecks {
    failing: HashSet<String>,
    ran: Mutex<Vec<String>>,
}

impl ScriptedChecks {
    pub fn fail(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn ran(&self) -> Vec<String> {
        self.ran.lock().expect("ran lock").clone()
    }
}

impl CheckRunner for ScriptedChecks {
    fn run(&self, request: &CheckRequest) -> Result<CheckResult> {
        self.ran
            .lock()
            .expect("ran lock")
            .push(request.name.clone());
        let passed = !self.failing.contains(&request.name);
        Ok(CheckResult {
            name: request.name.clone(),
            passed,
            detail: if passed { "ok" } else { "exit 1" }.to_string(),
        })
    }
}
