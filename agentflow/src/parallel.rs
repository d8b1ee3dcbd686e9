//! Fan an agent invocation out across every enabled project.
//!
//! Projects are split into consecutive batches. Every invocation in a batch
//! runs on its own scoped thread and the batch is joined before the next
//! one starts. Results stay in registry order.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::core::batch::{batch_size, batch_sizes};
use crate::core::types::{ExecutionLogEntry, Project, RunResult};
use crate::io::agent::{AgentInvoker, AgentRun};
use crate::io::config::load_config;
use crate::io::execution_log::append_best_effort;
use crate::io::registry::{ListFilter, Registry};
use crate::io::store::WorkspaceStore;

/// Longest output excerpt kept in an execution log entry.
pub const LOG_EXCERPT_BYTES: usize = 2000;

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub agent: String,
    pub tool: String,
    pub extra_args: Vec<String>,
    pub parallel: bool,
}

/// One project's invocation result.
#[derive(Debug)]
pub struct ProjectRun {
    pub project_id: String,
    pub project_name: String,
    pub duration: Duration,
    /// The agent's captured run, or why it could not be invoked.
    pub outcome: Result<AgentRun, String>,
}

impl ProjectRun {
    pub fn succeeded(&self) -> bool {
        matches!(&self.outcome, Ok(run) if run.succeeded())
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.outcome.as_ref().ok().and_then(|run| run.exit_code)
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub results: Vec<ProjectRun>,
    /// Size of each batch, in execution order.
    pub batches: Vec<usize>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(ProjectRun::succeeded)
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded()).count()
    }
}

/// Invoke one agent against one project and record it in the project's log.
#[instrument(skip_all, fields(project = %project.id, agent, tool))]
pub fn run_one<I: AgentInvoker + ?Sized>(
    store: &WorkspaceStore,
    invoker: &I,
    project: &Project,
    agent: &str,
    tool: &str,
    extra_args: &[String],
) -> ProjectRun {
    let started = Instant::now();
    let outcome = invoker
        .invoke(&project.path, agent, tool, extra_args)
        .map_err(|err| format!("{err:#}"));
    let duration = started.elapsed();

    let (exit_code, result, output) = match &outcome {
        Ok(run) => (
            run.exit_code,
            if run.succeeded() {
                RunResult::Success
            } else {
                RunResult::Failure
            },
            excerpt(&run.output(), LOG_EXCERPT_BYTES),
        ),
        Err(err) => (None, RunResult::Failure, excerpt(err, LOG_EXCERPT_BYTES)),
    };
    append_best_effort(
        store,
        &ExecutionLogEntry {
            timestamp: Utc::now(),
            project_id: project.id.clone(),
            agent_id: agent.to_string(),
            tool_id: tool.to_string(),
            exit_code,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            result,
            output,
        },
    );
    if let Err(err) = &outcome {
        warn!(err = %err, "agent invocation failed");
    }

    ProjectRun {
        project_id: project.id.clone(),
        project_name: project.name.clone(),
        duration,
        outcome,
    }
}

/// Run `request` against every enabled project.
#[instrument(skip_all, fields(agent = %request.agent, tool = %request.tool, parallel = request.parallel))]
pub fn run_across_projects<I: AgentInvoker + ?Sized>(
    store: &WorkspaceStore,
    invoker: &I,
    request: &RunRequest,
) -> Result<RunSummary> {
    let config = load_config(store)?;
    let projects = Registry::new(store).list(&ListFilter {
        enabled: Some(true),
        adapter: None,
    })?;
    if projects.is_empty() {
        warn!("no enabled projects");
        return Ok(RunSummary::default());
    }

    let size = batch_size(
        request.parallel,
        config.settings.parallel_execution,
        config.settings.max_parallel_jobs,
    );
    let batches = batch_sizes(projects.len(), size);
    info!(projects = projects.len(), batch_size = size, batches = batches.len(), "fan-out");

    let mut results = Vec::with_capacity(projects.len());
    for (index, batch) in projects.chunks(size).enumerate() {
        info!(batch = index + 1, size = batch.len(), "starting batch");
        let batch_results = thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|project| {
                    let handle = scope.spawn(move || {
                        run_one(
                            store,
                            invoker,
                            project,
                            &request.agent,
                            &request.tool,
                            &request.extra_args,
                        )
                    });
                    (project, handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(project, handle)| {
                    handle.join().unwrap_or_else(|_| ProjectRun {
                        project_id: project.id.clone(),
                        project_name: project.name.clone(),
                        duration: Duration::ZERO,
                        outcome: Err("agent invocation panicked".to_string()),
                    })
                })
                .collect::<Vec<_>>()
        });
        results.extend(batch_results);
    }

    Ok(RunSummary { results, batches })
}

/// Tail of `text`, at most `max` bytes, cut on a char boundary.
fn excerpt(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
