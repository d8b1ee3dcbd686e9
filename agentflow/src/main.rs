//! agentflow CLI.
//!
//! Commands resolve a project (or every enabled project) from the registry
//! and hand off to the workflow engine, the parallel runner, or gitFlow
//! automation. Exit code 0 on success, 1 on any reported failure.

use std::io::{self, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use agentflow::core::gate::{GateReport, Issue};
use agentflow::core::types::{GitFlowOverride, GitFlowPolicy, Project};
use agentflow::core::workflow_state::{Workflow, WorkflowStatus};
use agentflow::error::AgentflowError;
use agentflow::exit_codes;
use agentflow::gitflow::{self, BranchStart, CheckContext, SyncOutcome};
use agentflow::io::agent::ScriptAgentInvoker;
use agentflow::io::checks::CommandCheckRunner;
use agentflow::io::config::{WorkspaceConfig, load_config, update_config};
use agentflow::io::execution_log;
use agentflow::io::git::{Git, PullOutcome};
use agentflow::io::registry::{ListFilter, RegisterOptions, Registry};
use agentflow::io::store::{HOME_ENV, WorkspaceStore, default_root};
use agentflow::logging;
use agentflow::outcome::{AgentInvocation, InvokingOutcomeProvider, PromptOutcomeProvider};
use agentflow::parallel::{RunRequest, run_across_projects};
use agentflow::workflow::{AgentOutcomeProvider, ResumeOutcome, StatusFilter, Workflows};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "agentflow",
    version,
    about = "Coordinate agents across projects and automate gitFlow"
)]
struct Cli {
    /// Workspace directory [default: ~/.agentflow]
    #[arg(long, global = true, env = HOME_ENV, value_name = "DIR")]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage registered projects.
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// Show or change workspace settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Run an ordered list of agents against one project.
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
    /// Run one agent against every enabled project.
    RunAll {
        agent: String,
        tool: String,
        /// Run projects concurrently, up to `maxParallelJobs` at a time.
        #[arg(long)]
        parallel: bool,
        /// Extra arguments passed to the agent after the tool name.
        #[arg(last = true)]
        extra: Vec<String>,
    },
    /// Show recent agent executions for a project.
    Logs {
        #[arg(long)]
        project: Option<String>,
        #[arg(short = 'n', long = "lines", default_value_t = 20)]
        limit: usize,
    },
    /// Print repository status.
    GitStatus(Target),
    /// Report repository health problems.
    GitHealth(Target),
    /// Fetch and fast-forward when safe.
    GitSync(Target),
    /// Create a feature branch from the development branch.
    FeatureStart {
        name: String,
        #[arg(long)]
        project: Option<String>,
    },
    /// Run the pre-push gate on the current feature branch and push it.
    FeatureFinish {
        #[arg(long)]
        project: Option<String>,
    },
    /// Create a release branch from the development branch.
    ReleaseCut {
        version: String,
        #[arg(long)]
        project: Option<String>,
    },
    /// Create a hotfix branch from the production branch.
    HotfixStart {
        name: String,
        #[arg(long)]
        project: Option<String>,
    },
    /// Run a git hook gate.
    GitGate {
        #[command(subcommand)]
        hook: GateHook,
    },
}

#[derive(Args)]
struct Target {
    #[arg(long, conflicts_with = "all")]
    project: Option<String>,
    /// Every enabled project.
    #[arg(long)]
    all: bool,
}

#[derive(Subcommand)]
enum ProjectCommand {
    Register {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
        /// Replace an existing registration for the same path.
        #[arg(long)]
        force: bool,
    },
    Unregister {
        project: String,
    },
    List {
        #[arg(long, conflicts_with = "disabled")]
        enabled: bool,
        #[arg(long)]
        disabled: bool,
        #[arg(long)]
        adapter: Option<String>,
    },
    /// Make a project the default target.
    Use {
        project: String,
    },
    Enable {
        project: String,
    },
    Disable {
        project: String,
    },
    /// Replace the project's gitFlow override. With no flags the override
    /// is removed and the workspace policy applies.
    SetFlow {
        project: String,
        #[command(flatten)]
        flow: FlowArgs,
    },
}

/// Unset flags fall back to the workspace gitFlow policy.
#[derive(Args, Debug, Default)]
struct FlowArgs {
    #[arg(long)]
    production_branch: Option<String>,
    #[arg(long)]
    development_branch: Option<String>,
    #[arg(long)]
    feature_prefix: Option<String>,
    #[arg(long)]
    release_prefix: Option<String>,
    #[arg(long)]
    hotfix_prefix: Option<String>,
    #[arg(long, value_name = "BOOL")]
    require_clean_worktree: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    require_upstream: Option<bool>,
    /// Check to run before pushing; repeat for several.
    #[arg(long = "pre-push-check", value_name = "CHECK", conflicts_with = "no_pre_push_checks")]
    pre_push_checks: Vec<String>,
    /// Run no checks before pushing, whatever the workspace policy says.
    #[arg(long)]
    no_pre_push_checks: bool,
}

impl FlowArgs {
    fn into_override(self) -> Option<GitFlowOverride> {
        let pre_push_checks = if self.no_pre_push_checks {
            Some(Vec::new())
        } else {
            (!self.pre_push_checks.is_empty()).then_some(self.pre_push_checks)
        };
        let over = GitFlowOverride {
            production_branch: self.production_branch,
            development_branch: self.development_branch,
            feature_prefix: self.feature_prefix,
            release_prefix: self.release_prefix,
            hotfix_prefix: self.hotfix_prefix,
            require_clean_worktree: self.require_clean_worktree,
            require_upstream: self.require_upstream,
            pre_push_checks,
        };
        (over != GitFlowOverride::default()).then_some(over)
    }
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    SetJobs { jobs: usize },
}

#[derive(Subcommand)]
enum WorkflowCommand {
    Start {
        #[arg(required = true)]
        agents: Vec<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[command(flatten)]
        run: RunOptions,
    },
    Resume {
        id: Option<String>,
        /// Restart a failed or cancelled workflow.
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        run: RunOptions,
    },
    Pause {
        id: String,
    },
    Status {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        status: Option<WorkflowStatus>,
    },
    Cancel {
        id: String,
    },
}

#[derive(Args)]
struct RunOptions {
    /// Tool name passed to each agent.
    #[arg(long, default_value = "run")]
    tool: String,
    /// Run every agent without asking.
    #[arg(long)]
    auto: bool,
}

#[derive(Subcommand)]
enum GateHook {
    PrePush {
        #[arg(long)]
        project: Option<String>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let domain = err.downcast_ref::<AgentflowError>();
            match domain.map(AgentflowError::kind) {
                Some(kind) => eprintln!("error[{kind}]: {err:#}"),
                None => eprintln!("error: {err:#}"),
            }
            if let Some(hint) = domain.and_then(AgentflowError::hint) {
                eprintln!("hint: {hint}");
            }
            std::process::exit(exit_codes::FAILURE);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = match cli.workspace {
        Some(dir) => dir,
        None => default_root()?,
    };
    let store = WorkspaceStore::open(root)?;

    match cli.command {
        Command::Project { command } => cmd_project(&store, command),
        Command::Config { command } => cmd_config(&store, command),
        Command::Workflow { command } => cmd_workflow(&store, command),
        Command::RunAll {
            agent,
            tool,
            parallel,
            extra,
        } => cmd_run_all(
            &store,
            &RunRequest {
                agent,
                tool,
                extra_args: extra,
                parallel,
            },
        ),
        Command::Logs { project, limit } => cmd_logs(&store, project.as_deref(), limit),
        Command::GitStatus(target) => for_each_target(&store, &target, |_, project| {
            let status = gitflow::status(&Git::open(&project.path))?;
            println!("{}: {}", project.name, status.summary());
            Ok(true)
        }),
        Command::GitHealth(target) => for_each_target(&store, &target, |registry, project| {
            let policy = registry.effective_policy(project)?;
            let issues = gitflow::health_issues(&Git::open(&project.path), &policy)?;
            if issues.is_empty() {
                println!("{}: healthy", project.name);
            } else {
                println!("{}:", project.name);
                print_issues(&issues);
            }
            Ok(true)
        }),
        Command::GitSync(target) => for_each_target(&store, &target, |_, project| {
            let outcome = gitflow::sync(&Git::open(&project.path))?;
            println!("{}: {}", project.name, describe_sync(&outcome));
            Ok(!matches!(outcome, SyncOutcome::Pulled(PullOutcome::Failed(_))))
        }),
        Command::FeatureStart { name, project } => {
            cmd_branch_start(&store, project.as_deref(), |git, policy| {
                gitflow::start_feature(git, &name, policy)
            })
        }
        Command::ReleaseCut { version, project } => {
            cmd_branch_start(&store, project.as_deref(), |git, policy| {
                gitflow::start_release(git, &version, policy)
            })
        }
        Command::HotfixStart { name, project } => {
            cmd_branch_start(&store, project.as_deref(), |git, policy| {
                gitflow::start_hotfix(git, &name, policy)
            })
        }
        Command::FeatureFinish { project } => cmd_feature_finish(&store, project.as_deref()),
        Command::GitGate {
            hook: GateHook::PrePush { project },
        } => cmd_pre_push(&store, project.as_deref()),
    }
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("determine current directory")
}

fn cmd_project(store: &WorkspaceStore, command: ProjectCommand) -> Result<i32> {
    let registry = Registry::new(store);
    match command {
        ProjectCommand::Register { path, name, force } => {
            let project = registry.register(&path, &RegisterOptions { name, force })?;
            println!(
                "registered {} ({}) at {}",
                project.id,
                project.adapter,
                project.path.display()
            );
        }
        ProjectCommand::Unregister { project } => {
            let removed = registry.unregister(&project)?;
            println!("unregistered {}", removed.id);
        }
        ProjectCommand::List {
            enabled,
            disabled,
            adapter,
        } => {
            let filter = ListFilter {
                enabled: match (enabled, disabled) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                adapter,
            };
            let current = load_config(store)?.current_project_id;
            let projects = registry.list(&filter)?;
            if projects.is_empty() {
                println!("no projects registered");
            }
            for project in projects {
                let marker = if current.as_deref() == Some(project.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {:<20} {:<10} {:<8} {}",
                    project.id,
                    project.adapter,
                    if project.enabled {
                        "enabled"
                    } else {
                        "disabled"
                    },
                    project.path.display()
                );
            }
        }
        ProjectCommand::Use { project } => {
            let project = registry.set_current(&project)?;
            println!("current project: {}", project.id);
        }
        ProjectCommand::Enable { project } => {
            let project = registry.set_enabled(&project, true)?;
            println!("enabled {}", project.id);
        }
        ProjectCommand::Disable { project } => {
            let project = registry.set_enabled(&project, false)?;
            println!("disabled {}", project.id);
        }
        ProjectCommand::SetFlow { project, flow } => {
            let project = registry.set_git_flow_override(&project, flow.into_override())?;
            let policy = registry.effective_policy(&project)?;
            let json = serde_json::to_string_pretty(&policy).context("serialize policy")?;
            println!("gitFlow policy for {}:\n{json}", project.id);
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_config(store: &WorkspaceStore, command: ConfigCommand) -> Result<i32> {
    match command {
        ConfigCommand::Show => {
            let config = load_config(store)?;
            let json = serde_json::to_string_pretty(&config).context("serialize config")?;
            println!("{json}");
        }
        ConfigCommand::SetJobs { jobs } => {
            update_config(store, |cfg: &mut WorkspaceConfig| {
                cfg.settings.max_parallel_jobs = jobs;
                Ok(())
            })?;
            println!("maxParallelJobs = {jobs}");
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_workflow(store: &WorkspaceStore, command: WorkflowCommand) -> Result<i32> {
    let workflows = Workflows::new(store);
    match command {
        WorkflowCommand::Start {
            agents,
            project,
            description,
            run,
        } => {
            let project = Registry::new(store).resolve(project.as_deref(), &current_dir()?)?;
            let workflow = workflows.create(&project.id, &description, &agents)?;
            println!("created {} for {}", workflow.id, project.id);
            let invoker = agent_invoker(store)?;
            let mut provider = outcome_provider(store, &invoker, &run);
            let workflow = workflows.start(&workflow.id, provider.as_mut())?;
            Ok(report_workflow(&workflow))
        }
        WorkflowCommand::Resume { id, force, run } => {
            let invoker = agent_invoker(store)?;
            let mut provider = outcome_provider(store, &invoker, &run);
            match workflows.resume(id.as_deref(), force, provider.as_mut())? {
                ResumeOutcome::AlreadyCompleted(workflow) => {
                    println!("{} already completed", workflow.id);
                    Ok(exit_codes::OK)
                }
                ResumeOutcome::Ran(workflow) => Ok(report_workflow(&workflow)),
            }
        }
        WorkflowCommand::Pause { id } => {
            let workflow = workflows.pause(&id)?;
            println!("{} {}", workflow.id, workflow.status);
            Ok(exit_codes::OK)
        }
        WorkflowCommand::Status { project, status } => {
            let project_id = match project {
                Some(selector) => Some(Registry::new(store).require(&selector)?.id),
                None => None,
            };
            let list = workflows.status(&StatusFilter { project_id, status })?;
            if list.is_empty() {
                println!("no workflows");
            }
            for workflow in list {
                print_workflow_line(&workflow);
            }
            Ok(exit_codes::OK)
        }
        WorkflowCommand::Cancel { id } => {
            let workflow = workflows.cancel(&id)?;
            println!("{} {}", workflow.id, workflow.status);
            Ok(exit_codes::OK)
        }
    }
}

fn agent_invoker(store: &WorkspaceStore) -> Result<ScriptAgentInvoker> {
    let config = load_config(store)?;
    Ok(ScriptAgentInvoker::new(config.settings.output_limit_bytes))
}

fn outcome_provider<'a>(
    store: &'a WorkspaceStore,
    invoker: &'a ScriptAgentInvoker,
    run: &RunOptions,
) -> Box<dyn AgentOutcomeProvider + 'a> {
    let invocation = AgentInvocation {
        store,
        invoker,
        tool: run.tool.clone(),
        extra_args: Vec::new(),
    };
    if run.auto {
        Box::new(InvokingOutcomeProvider::new(invocation))
    } else {
        Box::new(PromptOutcomeProvider::new(
            BufReader::new(io::stdin()),
            io::stdout(),
            invocation,
        ))
    }
}

fn print_workflow_line(workflow: &Workflow) {
    println!(
        "{}  {:<11} {:<16} {}/{}  {}",
        workflow.id,
        workflow.status.as_str(),
        workflow.project_id,
        workflow.current_agent_index,
        workflow.agents.len(),
        workflow.description
    );
}

/// Print the final state; failed workflows exit non-zero.
fn report_workflow(workflow: &Workflow) -> i32 {
    print_workflow_line(workflow);
    for agent in &workflow.agents {
        match &agent.result {
            Some(result) => println!("  {:<20} {} ({result})", agent.name, agent.status.as_str()),
            None => println!("  {:<20} {}", agent.name, agent.status.as_str()),
        }
    }
    if workflow.status == WorkflowStatus::Failed {
        exit_codes::FAILURE
    } else {
        exit_codes::OK
    }
}

fn cmd_run_all(store: &WorkspaceStore, request: &RunRequest) -> Result<i32> {
    let invoker = agent_invoker(store)?;
    let summary = run_across_projects(store, &invoker, request)?;
    if summary.results.is_empty() {
        eprintln!("warning: no enabled projects");
        return Ok(exit_codes::OK);
    }
    for result in &summary.results {
        let millis = result.duration.as_millis();
        match &result.outcome {
            Ok(run) if run.succeeded() => println!("ok    {} ({millis} ms)", result.project_name),
            Ok(run) => println!(
                "fail  {} (exit {}, {millis} ms)",
                result.project_name,
                run.exit_code
                    .map_or("signal".to_string(), |c| c.to_string())
            ),
            Err(err) => println!("error {}: {err}", result.project_name),
        }
    }
    println!(
        "{}/{} succeeded in {} batch(es)",
        summary.results.len() - summary.failures(),
        summary.results.len(),
        summary.batches.len()
    );
    Ok(if summary.all_succeeded() {
        exit_codes::OK
    } else {
        exit_codes::FAILURE
    })
}

fn cmd_logs(store: &WorkspaceStore, project: Option<&str>, limit: usize) -> Result<i32> {
    let project = Registry::new(store).resolve(project, &current_dir()?)?;
    let entries = execution_log::recent(store, &project.id, limit)?;
    if entries.is_empty() {
        println!("no executions recorded for {}", project.id);
    }
    for entry in entries {
        println!(
            "{}  {:<7} {} {}  exit={}  {} ms",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.result.as_str(),
            entry.agent_id,
            entry.tool_id,
            entry
                .exit_code
                .map_or("-".to_string(), |c| c.to_string()),
            entry.duration_ms
        );
    }
    Ok(exit_codes::OK)
}

/// Run `f` for the resolved project, or every enabled project with `--all`.
///
/// Per-project errors are printed and turn the exit code into a failure;
/// remaining projects still run.
fn for_each_target<F>(store: &WorkspaceStore, target: &Target, mut f: F) -> Result<i32>
where
    F: FnMut(&Registry<'_>, &Project) -> Result<bool>,
{
    let registry = Registry::new(store);
    let projects = if target.all {
        registry.list(&ListFilter {
            enabled: Some(true),
            adapter: None,
        })?
    } else {
        vec![registry.resolve(target.project.as_deref(), &current_dir()?)?]
    };
    if projects.is_empty() {
        eprintln!("warning: no enabled projects");
    }

    let mut code = exit_codes::OK;
    for project in &projects {
        match f(&registry, project) {
            Ok(true) => {}
            Ok(false) => code = exit_codes::FAILURE,
            Err(err) if target.all => {
                eprintln!("{}: error: {err:#}", project.name);
                code = exit_codes::FAILURE;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(code)
}

fn describe_sync(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::NoUpstream => "fetched (no upstream)".to_string(),
        SyncOutcome::UpToDate => "up to date".to_string(),
        SyncOutcome::DirtyWorktree { behind } => {
            format!("{behind} commit(s) behind, worktree dirty; not pulled")
        }
        SyncOutcome::Pulled(PullOutcome::Updated) => "fast-forwarded".to_string(),
        SyncOutcome::Pulled(PullOutcome::NoUpstream) => "nothing to pull".to_string(),
        SyncOutcome::Pulled(PullOutcome::Failed(stderr)) => format!("pull failed: {stderr}"),
    }
}

fn cmd_branch_start<F>(store: &WorkspaceStore, project: Option<&str>, start: F) -> Result<i32>
where
    F: FnOnce(&Git, &GitFlowPolicy) -> Result<BranchStart>,
{
    let registry = Registry::new(store);
    let project = registry.resolve(project, &current_dir()?)?;
    let policy = registry.effective_policy(&project)?;
    let started = start(&Git::open(&project.path), &policy)?;
    if let PullOutcome::Failed(stderr) = &started.pull {
        eprintln!("warning: could not update {}: {stderr}", started.base);
    }
    println!("created {} from {}", started.branch, started.base);
    Ok(exit_codes::OK)
}

fn with_checks<T>(
    store: &WorkspaceStore,
    project: &Project,
    f: impl FnOnce(&CheckContext<'_, CommandCheckRunner>) -> Result<T>,
) -> Result<T> {
    let config = load_config(store)?;
    let runner = CommandCheckRunner::new(config.checks.clone());
    let context = CheckContext {
        runner: &runner,
        workdir: &project.path,
        timeout: Duration::from_secs(config.settings.check_timeout_secs),
        output_limit_bytes: config.settings.output_limit_bytes,
    };
    f(&context)
}

fn cmd_feature_finish(store: &WorkspaceStore, project: Option<&str>) -> Result<i32> {
    let registry = Registry::new(store);
    let project = registry.resolve(project, &current_dir()?)?;
    let policy = registry.effective_policy(&project)?;
    let finish = with_checks(store, &project, |checks| {
        gitflow::finish_feature(&Git::open(&project.path), &policy, checks)
    })?;
    print_report(&finish.report);
    if finish.pushed {
        println!("pushed {} to origin", finish.branch);
        Ok(exit_codes::OK)
    } else {
        println!("not pushed: fix the errors above");
        Ok(exit_codes::FAILURE)
    }
}

fn cmd_pre_push(store: &WorkspaceStore, project: Option<&str>) -> Result<i32> {
    let registry = Registry::new(store);
    let project = registry.resolve(project, &current_dir()?)?;
    let policy = registry.effective_policy(&project)?;
    let report = with_checks(store, &project, |checks| {
        gitflow::run_pre_push_gate(&Git::open(&project.path), &policy, checks)
    })?;
    print_report(&report);
    Ok(if report.passed {
        exit_codes::OK
    } else {
        exit_codes::FAILURE
    })
}

fn print_report(report: &GateReport) {
    print_issues(&report.issues);
    if report.passed {
        println!("pre-push gate passed");
    } else {
        println!("pre-push gate failed with {} error(s)", report.error_count());
    }
}

fn print_issues(issues: &[Issue]) {
    for issue in issues {
        println!("  {:<7} {}", issue.severity.as_str(), issue.message);
        if let Some(fix) = &issue.fix {
            println!("          fix: {fix}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_all_with_extra_args() {
        let cli = Cli::parse_from([
            "agentflow", "run-all", "builder", "build", "--parallel", "--", "--fast", "x",
        ]);
        match cli.command {
            Command::RunAll {
                agent,
                tool,
                parallel,
                extra,
            } => {
                assert_eq!(agent, "builder");
                assert_eq!(tool, "build");
                assert!(parallel);
                assert_eq!(extra, vec!["--fast", "x"]);
            }
            _ => panic!("expected run-all"),
        }
    }

    #[test]
    fn parse_project_set_flow() {
        let cli = Cli::parse_from([
            "agentflow",
            "project",
            "set-flow",
            "web",
            "--feature-prefix",
            "feat/",
            "--require-upstream",
            "false",
            "--pre-push-check",
            "lint",
            "--pre-push-check",
            "test",
        ]);
        let Command::Project {
            command: ProjectCommand::SetFlow { project, flow },
        } = cli.command
        else {
            panic!("expected project set-flow");
        };
        assert_eq!(project, "web");
        let over = flow.into_override().expect("override");
        assert_eq!(over.feature_prefix.as_deref(), Some("feat/"));
        assert_eq!(over.require_upstream, Some(false));
        assert_eq!(over.pre_push_checks, Some(vec!["lint".to_string(), "test".to_string()]));
        assert!(over.production_branch.is_none());

        assert!(FlowArgs::default().into_override().is_none());
        let none = FlowArgs {
            no_pre_push_checks: true,
            ..FlowArgs::default()
        };
        assert_eq!(none.into_override().and_then(|o| o.pre_push_checks), Some(vec![]));
    }

    #[test]
    fn parse_workflow_start_defaults() {
        let cli = Cli::parse_from(["agentflow", "workflow", "start", "plan", "build"]);
        match cli.command {
            Command::Workflow {
                command:
                    WorkflowCommand::Start {
                        agents,
                        project,
                        description,
                        run,
                    },
            } => {
                assert_eq!(agents, vec!["plan", "build"]);
                assert!(project.is_none());
                assert_eq!(description, "");
                assert_eq!(run.tool, "run");
                assert!(!run.auto);
            }
            _ => panic!("expected workflow start"),
        }
    }

    #[test]
    fn workflow_start_requires_an_agent() {
        assert!(Cli::try_parse_from(["agentflow", "workflow", "start"]).is_err());
    }

    #[test]
    fn parse_status_filter() {
        let cli = Cli::parse_from(["agentflow", "workflow", "status", "--status", "in_progress"]);
        assert!(matches!(
            cli.command,
            Command::Workflow {
                command: WorkflowCommand::Status {
                    status: Some(WorkflowStatus::InProgress),
                    ..
                }
            }
        ));
    }

    #[test]
    fn parse_global_workspace_after_subcommand() {
        let cli = Cli::parse_from(["agentflow", "git-status", "--all", "--workspace", "/tmp/ws"]);
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert!(matches!(cli.command, Command::GitStatus(Target { all: true, .. })));
    }

    #[test]
    fn project_and_all_conflict() {
        assert!(
            Cli::try_parse_from(["agentflow", "git-sync", "--all", "--project", "web"]).is_err()
        );
    }

    #[test]
    fn parse_pre_push_gate() {
        let cli = Cli::parse_from(["agentflow", "git-gate", "pre-push"]);
        assert!(matches!(
            cli.command,
            Command::GitGate {
                hook: GateHook::PrePush { project: None }
            }
        ));
    }
}
