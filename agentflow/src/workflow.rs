//! Durable workflow engine.
//!
//! A workflow is one JSON document under `workflows/`. The engine loads it,
//! applies a checked transition from [`crate::core::workflow_state`], and
//! persists it again after every change, so an interrupted process leaves a
//! document that `resume` can pick up at the agent that was running.
//!
//! Every change is a locked read-modify-write of that document. Activating a
//! workflow also holds a per-project lock across the one-active check.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::core::ids::{is_workflow_id, workflow_id};
use crate::core::workflow_state::{
    AgentOutcome, LoopControl, Workflow, WorkflowAgent, WorkflowEvent, WorkflowStatus,
};
use crate::error::AgentflowError;
use crate::io::registry::Registry;
use crate::io::store::{DocLock, WorkspaceStore};

/// Decides what happens to the agent at the current index.
pub trait AgentOutcomeProvider {
    fn outcome(&mut self, workflow: &Workflow, agent: &WorkflowAgent) -> Result<AgentOutcome>;
}

impl<P: AgentOutcomeProvider + ?Sized> AgentOutcomeProvider for &mut P {
    fn outcome(&mut self, workflow: &Workflow, agent: &WorkflowAgent) -> Result<AgentOutcome> {
        (**self).outcome(workflow, agent)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusFilter {
    pub project_id: Option<String>,
    pub status: Option<WorkflowStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The workflow had already completed; nothing ran.
    AlreadyCompleted(Workflow),
    /// The execution loop ran; the workflow is in whatever state it halted in.
    Ran(Workflow),
}

impl ResumeOutcome {
    pub fn workflow(&self) -> &Workflow {
        match self {
            Self::AlreadyCompleted(wf) | Self::Ran(wf) => wf,
        }
    }
}

pub struct Workflows<'a> {
    store: &'a WorkspaceStore,
}

impl<'a> Workflows<'a> {
    pub fn new(store: &'a WorkspaceStore) -> Self {
        Self { store }
    }

    /// Document path for `id`. Anything not shaped like a generated id is
    /// rejected before it reaches the filesystem.
    fn document_path(&self, id: &str) -> Result<PathBuf> {
        if !is_workflow_id(id) {
            return Err(AgentflowError::precondition_with_fix(
                format!("'{id}' is not a workflow id"),
                "agentflow workflow status",
            )
            .into());
        }
        Ok(self.store.paths().workflow_path(id))
    }

    pub fn load(&self, id: &str) -> Result<Workflow> {
        let path = self.document_path(id)?;
        let workflow: Workflow = self
            .store
            .read_json(&path)?
            .ok_or_else(|| AgentflowError::WorkflowNotFound(id.to_string()))?;
        ensure_valid(&workflow)?;
        Ok(workflow)
    }

    /// Locked read-modify-write of one workflow document.
    ///
    /// `f` sees the document as it is on disk right now; it is written back
    /// only when `f` succeeds.
    fn modify<R>(&self, id: &str, f: impl FnOnce(&mut Workflow) -> Result<R>) -> Result<R> {
        let path = self.document_path(id)?;
        self.store
            .update_existing_json(&path, |workflow: &mut Workflow| {
                ensure_valid(workflow)?;
                let out = f(workflow)?;
                debug!(
                    id = %workflow.id,
                    status = %workflow.status,
                    index = workflow.current_agent_index,
                    "workflow saved"
                );
                Ok(out)
            })?
            .ok_or_else(|| AgentflowError::WorkflowNotFound(id.to_string()).into())
    }

    /// Serializes the active-workflow check with the write that activates one.
    fn lock_project(&self, project_id: &str) -> Result<DocLock> {
        self.store
            .lock(&self.store.paths().project_lock_path(project_id))
    }

    /// Every readable workflow document. Unreadable files are skipped.
    fn all(&self) -> Result<Vec<Workflow>> {
        let mut workflows = Vec::new();
        for path in self.store.list_json_files(&self.store.paths().workflows_dir)? {
            match self.store.read_json::<Workflow>(&path) {
                Ok(Some(wf)) => workflows.push(wf),
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %path.display(), err = %format!("{err:#}"), "skipping unreadable workflow");
                }
            }
        }
        Ok(workflows)
    }

    /// Create a pending workflow for `project` (id, name, or path).
    #[instrument(skip_all, fields(project, agents = agent_names.len()))]
    pub fn create(
        &self,
        project: &str,
        description: &str,
        agent_names: &[String],
    ) -> Result<Workflow> {
        if agent_names.is_empty() {
            return Err(AgentflowError::precondition_with_fix(
                "a workflow needs at least one agent",
                "agentflow workflow start <agent>...",
            )
            .into());
        }
        let project = Registry::new(self.store).require(project)?;
        let _guard = self.lock_project(&project.id)?;
        self.ensure_no_active(&project.id, None)?;

        let now = Utc::now();
        let workflow = loop {
            let candidate = Workflow::new(
                workflow_id(now, rand::random::<u16>()),
                project.id.clone(),
                description.to_string(),
                agent_names,
                now,
            );
            let path = self.store.paths().workflow_path(&candidate.id);
            if self.store.create_json(&path, &candidate)? {
                break candidate;
            }
            debug!(id = %candidate.id, "workflow id taken, retrying");
        };
        info!(id = %workflow.id, project = %project.id, "workflow created");
        Ok(workflow)
    }

    /// Move a pending workflow to `in_progress` and run its agents.
    #[instrument(skip_all, fields(id))]
    pub fn start<P: AgentOutcomeProvider + ?Sized>(
        &self,
        id: &str,
        provider: &mut P,
    ) -> Result<Workflow> {
        let project_id = self.load(id)?.project_id;
        {
            let _guard = self.lock_project(&project_id)?;
            self.ensure_no_active(&project_id, Some(id))?;
            self.modify(id, |wf| Ok(wf.transition(WorkflowEvent::Start, Utc::now())?))?;
        }
        info!(id, "workflow started");
        self.run_loop(id, provider)
    }

    /// Continue a workflow where it stopped.
    ///
    /// Without an id this picks the current project's active workflow, else
    /// the most recently updated active workflow anywhere in the workspace.
    #[instrument(skip_all, fields(id = ?id, force))]
    pub fn resume<P: AgentOutcomeProvider + ?Sized>(
        &self,
        id: Option<&str>,
        force: bool,
        provider: &mut P,
    ) -> Result<ResumeOutcome> {
        let found = match id {
            Some(id) => self.load(id)?,
            None => self.resolve_resumable()?,
        };
        let id = found.id.as_str();
        {
            let _guard = self.lock_project(&found.project_id)?;
            let current = self.load(id)?;
            match current.status {
                WorkflowStatus::Completed => {
                    info!(id, "workflow already completed");
                    return Ok(ResumeOutcome::AlreadyCompleted(current));
                }
                WorkflowStatus::Cancelled | WorkflowStatus::Failed if !force => {
                    return Err(AgentflowError::RequiresForce {
                        workflow_id: current.id,
                        status: current.status,
                    }
                    .into());
                }
                WorkflowStatus::Cancelled | WorkflowStatus::Failed | WorkflowStatus::Pending => {
                    self.ensure_no_active(&current.project_id, Some(id))?;
                }
                WorkflowStatus::Paused | WorkflowStatus::InProgress => {}
            }

            // Pause and cancel do not take the project lock, so decide again
            // on the document as it is now.
            self.modify(id, |wf| {
                let now = Utc::now();
                match wf.status {
                    WorkflowStatus::Completed => {}
                    WorkflowStatus::Cancelled | WorkflowStatus::Failed => {
                        if !force {
                            return Err(AgentflowError::RequiresForce {
                                workflow_id: wf.id.clone(),
                                status: wf.status,
                            }
                            .into());
                        }
                        wf.force_restart(now)?;
                        info!(id = %wf.id, "workflow force-restarted");
                    }
                    WorkflowStatus::Paused => wf.transition(WorkflowEvent::Resume, now)?,
                    WorkflowStatus::Pending => wf.transition(WorkflowEvent::Start, now)?,
                    // Left behind by an interrupted process.
                    WorkflowStatus::InProgress => {}
                }
                Ok(())
            })?;
        }
        self.run_loop(id, provider).map(ResumeOutcome::Ran)
    }

    fn resolve_resumable(&self) -> Result<Workflow> {
        if let Some(project) = Registry::new(self.store).get_current()?
            && let Some(active) = self.get_active(&project.id)?
        {
            return Ok(active);
        }
        self.all()?
            .into_iter()
            .filter(|wf| wf.status.is_active())
            .max_by_key(|wf| wf.updated_at)
            .ok_or_else(|| AgentflowError::NoWorkflowFound.into())
    }

    /// Mark an `in_progress` workflow paused. Pausing a paused workflow is a no-op.
    ///
    /// A loop running this workflow in another process stops after its
    /// current agent returns.
    #[instrument(skip_all, fields(id))]
    pub fn pause(&self, id: &str) -> Result<Workflow> {
        let workflow = self.modify(id, |wf| {
            if wf.status != WorkflowStatus::Paused {
                wf.transition(WorkflowEvent::Pause, Utc::now())?;
            }
            Ok(wf.clone())
        })?;
        info!(id = %workflow.id, "workflow paused");
        Ok(workflow)
    }

    /// Cancel a workflow. Terminal workflows are returned unchanged.
    #[instrument(skip_all, fields(id))]
    pub fn cancel(&self, id: &str) -> Result<Workflow> {
        self.modify(id, |wf| {
            if wf.status.is_terminal() {
                debug!(id = %wf.id, status = %wf.status, "cancel is a no-op");
            } else {
                wf.transition(WorkflowEvent::Cancel, Utc::now())?;
                info!(id = %wf.id, "workflow cancelled");
            }
            Ok(wf.clone())
        })
    }

    /// Workflows matching `filter`, most recently updated first.
    pub fn status(&self, filter: &StatusFilter) -> Result<Vec<Workflow>> {
        let mut workflows: Vec<Workflow> = self
            .all()?
            .into_iter()
            .filter(|wf| {
                filter
                    .project_id
                    .as_ref()
                    .is_none_or(|p| &wf.project_id == p)
            })
            .filter(|wf| filter.status.is_none_or(|s| wf.status == s))
            .collect();
        workflows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(workflows)
    }

    /// The project's `in_progress` or `paused` workflow.
    pub fn get_active(&self, project_id: &str) -> Result<Option<Workflow>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|wf| wf.project_id == project_id && wf.status.is_active())
            .max_by_key(|wf| wf.updated_at))
    }

    /// Callers hold the project lock.
    fn ensure_no_active(&self, project_id: &str, except: Option<&str>) -> Result<()> {
        if let Some(active) = self.get_active(project_id)?
            && Some(active.id.as_str()) != except
        {
            return Err(AgentflowError::ActiveWorkflowExists {
                project_id: project_id.to_string(),
                workflow_id: active.id,
            }
            .into());
        }
        Ok(())
    }

    /// Run agents until the workflow halts.
    ///
    /// Every step re-reads the document under its lock, so a pause or cancel
    /// written by another process is honored rather than overwritten. The
    /// provider runs with no lock held.
    fn run_loop<P: AgentOutcomeProvider + ?Sized>(
        &self,
        id: &str,
        provider: &mut P,
    ) -> Result<Workflow> {
        loop {
            let workflow = self.modify(id, |wf| {
                if wf.status == WorkflowStatus::InProgress {
                    if wf.is_exhausted() {
                        wf.finish(Utc::now())?;
                    } else {
                        wf.begin_current(Utc::now());
                    }
                }
                Ok(wf.clone())
            })?;
            match workflow.status {
                WorkflowStatus::InProgress => {}
                WorkflowStatus::Completed => {
                    info!(id, "workflow completed");
                    return Ok(workflow);
                }
                status => {
                    info!(id, %status, "workflow halted");
                    return Ok(workflow);
                }
            }

            let index = workflow.current_agent_index;
            let agent = workflow.agents[index].clone();
            debug!(agent = %agent.name, index, "agent started");

            let outcome = match provider.outcome(&workflow, &agent) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(agent = %agent.name, err = %format!("{err:#}"), "outcome provider failed");
                    AgentOutcome::Fail {
                        reason: format!("{err:#}"),
                    }
                }
            };
            debug!(agent = %agent.name, ?outcome, "agent outcome");

            let (workflow, control) = self.modify(id, |wf| {
                if wf.status != WorkflowStatus::InProgress || wf.current_agent_index != index {
                    debug!(id, status = %wf.status, "workflow changed while the agent ran");
                    return Ok((wf.clone(), LoopControl::Halt));
                }
                let control = wf.apply_outcome(outcome, Utc::now())?;
                Ok((wf.clone(), control))
            })?;
            if control == LoopControl::Halt {
                info!(id, status = %workflow.status, "workflow halted");
                return Ok(workflow);
            }
        }
    }
}

fn ensure_valid(workflow: &Workflow) -> Result<()> {
    let errors = workflow.validate();
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!(
        "workflow {} is corrupt:\n- {}",
        workflow.id,
        errors.join("\n- ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::workflow_state::AgentStatus;
    use crate::test_support::{ScriptedOutcomeProvider, TestWorkspace};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn create_validates_project_and_agents() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let workflows = Workflows::new(ws.store());

        let err = workflows.create("web", "", &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgentflowError>(),
            Some(AgentflowError::Precondition { .. })
        ));

        let err = workflows.create("nope", "", &names(&["a"])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgentflowError>(),
            Some(AgentflowError::ProjectNotFound(_))
        ));

        let wf = workflows
            .create("web", "ship it", &names(&["a", "b"]))
            .expect("create");
        assert!(wf.id.starts_with("wf-"));
        assert_eq!(wf.status, WorkflowStatus::Pending);
        assert_eq!(workflows.load(&wf.id).expect("load"), wf);
    }

    #[test]
    fn all_complete_runs_to_completion() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let workflows = Workflows::new(ws.store());
        let wf = workflows
            .create("web", "", &names(&["a", "b", "c"]))
            .expect("create");

        let mut provider = ScriptedOutcomeProvider::all_complete();
        let done = workflows.start(&wf.id, &mut provider).expect("start");
        assert_eq!(done.status, WorkflowStatus::Completed);
        assert_eq!(done.current_agent_index, 3);
        assert!(done.completed_at.is_some());
        assert!(
            done.agents
                .iter()
                .all(|a| a.status == AgentStatus::Completed)
        );
        assert_eq!(provider.seen(), &["a", "b", "c"]);
    }

    #[test]
    fn pause_then_resume_restarts_interrupted_agent() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let workflows = Workflows::new(ws.store());
        let wf = workflows
            .create("web", "", &names(&["a", "b", "c"]))
            .expect("create");

        let mut first = ScriptedOutcomeProvider::new(vec![
            AgentOutcome::Complete { result: None },
            AgentOutcome::Pause,
        ]);
        let paused = workflows.start(&wf.id, &mut first).expect("start");
        assert_eq!(paused.status, WorkflowStatus::Paused);
        assert_eq!(paused.current_agent_index, 1);
        assert_eq!(paused.agents[1].status, AgentStatus::InProgress);

        let mut second = ScriptedOutcomeProvider::all_complete();
        let resumed = workflows
            .resume(Some(wf.id.as_str()), false, &mut second)
            .expect("resume");
        let ResumeOutcome::Ran(done) = resumed else {
            panic!("expected the loop to run");
        };
        assert_eq!(done.status, WorkflowStatus::Completed);
        assert_eq!(second.seen(), &["b", "c"]);
    }

    #[test]
    fn provider_error_fails_the_workflow() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let workflows = Workflows::new(ws.store());
        let wf = workflows.create("web", "", &names(&["a"])).expect("create");

        let mut provider = ScriptedOutcomeProvider::new(vec![]);
        let failed = workflows.start(&wf.id, &mut provider).expect("start");
        assert_eq!(failed.status, WorkflowStatus::Failed);
        assert_eq!(failed.agents[0].status, AgentStatus::Failed);
        assert!(failed.agents[0].result.is_some());
    }

    #[test]
    fn failed_workflow_requires_force() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let workflows = Workflows::new(ws.store());
        let wf = workflows
            .create("web", "", &names(&["a", "b"]))
            .expect("create");
        let mut provider = ScriptedOutcomeProvider::new(vec![
            AgentOutcome::Complete { result: None },
            AgentOutcome::Fail {
                reason: "boom".to_string(),
            },
        ]);
        workflows.start(&wf.id, &mut provider).expect("start");

        let err = workflows
            .resume(Some(wf.id.as_str()), false, &mut ScriptedOutcomeProvider::all_complete())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgentflowError>(),
            Some(AgentflowError::RequiresForce {
                status: WorkflowStatus::Failed,
                ..
            })
        ));

        let mut retry = ScriptedOutcomeProvider::all_complete();
        let outcome = workflows
            .resume(Some(wf.id.as_str()), true, &mut retry)
            .expect("force resume");
        assert_eq!(outcome.workflow().status, WorkflowStatus::Completed);
        assert_eq!(retry.seen(), &["b"]);
    }

    #[test]
    fn resume_completed_is_a_no_op() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let workflows = Workflows::new(ws.store());
        let wf = workflows.create("web", "", &names(&["a"])).expect("create");
        workflows
            .start(&wf.id, &mut ScriptedOutcomeProvider::all_complete())
            .expect("start");

        let mut provider = ScriptedOutcomeProvider::all_complete();
        let outcome = workflows
            .resume(Some(wf.id.as_str()), false, &mut provider)
            .expect("resume");
        assert!(matches!(outcome, ResumeOutcome::AlreadyCompleted(_)));
        assert!(provider.seen().is_empty());
    }

    #[test]
    fn one_active_workflow_per_project() {
        let ws = TestWorkspace::new();
        ws.register("web");
        ws.register("api");
        let workflows = Workflows::new(ws.store());
        let first = workflows.create("web", "", &names(&["a"])).expect("create");
        workflows
            .start(&first.id, &mut ScriptedOutcomeProvider::new(vec![AgentOutcome::Pause]))
            .expect("start");

        let err = workflows.create("web", "", &names(&["b"])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgentflowError>(),
            Some(AgentflowError::ActiveWorkflowExists { .. })
        ));
        assert!(workflows.create("api", "", &names(&["b"])).is_ok());
    }

    #[test]
    fn resume_without_id_prefers_current_project() {
        let ws = TestWorkspace::new();
        ws.register("web");
        ws.register("api");
        let workflows = Workflows::new(ws.store());
        let pause = || ScriptedOutcomeProvider::new(vec![AgentOutcome::Pause]);

        let web = workflows.create("web", "", &names(&["a"])).expect("create");
        workflows.start(&web.id, &mut pause()).expect("start");
        let api = workflows.create("api", "", &names(&["a"])).expect("create");
        workflows.start(&api.id, &mut pause()).expect("start");

        Registry::new(ws.store()).set_current("web").expect("use");
        let outcome = workflows
            .resume(None, false, &mut ScriptedOutcomeProvider::all_complete())
            .expect("resume");
        assert_eq!(outcome.workflow().id, web.id);
    }

    #[test]
    fn resume_without_any_active_workflow_fails() {
        let ws = TestWorkspace::new();
        let err = Workflows::new(ws.store())
            .resume(None, false, &mut ScriptedOutcomeProvider::all_complete())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgentflowError>(),
            Some(AgentflowError::NoWorkflowFound)
        ));
    }

    #[test]
    fn cancel_is_idempotent_on_terminal_workflows() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let workflows = Workflows::new(ws.store());
        let wf = workflows.create("web", "", &names(&["a"])).expect("create");

        let cancelled = workflows.cancel(&wf.id).expect("cancel");
        assert_eq!(cancelled.status, WorkflowStatus::Cancelled);
        let again = workflows.cancel(&wf.id).expect("cancel again");
        assert_eq!(again, cancelled);
    }

    #[test]
    fn pause_requires_in_progress() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let workflows = Workflows::new(ws.store());
        let wf = workflows.create("web", "", &names(&["a"])).expect("create");

        let err = workflows.pause(&wf.id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgentflowError>(),
            Some(AgentflowError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn status_filters_and_orders_by_update() {
        let ws = TestWorkspace::new();
        ws.register("web");
        ws.register("api");
        let workflows = Workflows::new(ws.store());
        let older = workflows.create("web", "", &names(&["a"])).expect("create");
        let newer = workflows.create("api", "", &names(&["a"])).expect("create");
        workflows.cancel(&newer.id).expect("cancel");

        let all = workflows.status(&StatusFilter::default()).expect("status");
        let ids: Vec<&str> = all.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);

        let pending = workflows
            .status(&StatusFilter {
                project_id: None,
                status: Some(WorkflowStatus::Pending),
            })
            .expect("status");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, older.id);
    }

    #[test]
    fn missing_workflow_is_not_found() {
        let ws = TestWorkspace::new();
        let err = Workflows::new(ws.store())
            .cancel("wf-20260101000000-0000")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgentflowError>(),
            Some(AgentflowError::WorkflowNotFound(_))
        ));
    }

    #[test]
    fn malformed_ids_never_reach_the_filesystem() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let config = ws.store().paths().config_path.clone();
        let before = std::fs::read_to_string(&config).ok();
        let workflows = Workflows::new(ws.store());

        for bad in ["../config", "../projects", "wf-missing", "a/b"] {
            for err in [
                workflows.cancel(bad).unwrap_err(),
                workflows.pause(bad).unwrap_err(),
                workflows.load(bad).unwrap_err(),
            ] {
                assert!(
                    matches!(
                        err.downcast_ref::<AgentflowError>(),
                        Some(AgentflowError::Precondition { .. })
                    ),
                    "{bad}: {err:#}"
                );
            }
        }
        assert_eq!(std::fs::read_to_string(&config).ok(), before);
    }

    #[test]
    fn cancel_leaves_completed_and_failed_workflows_untouched() {
        let ws = TestWorkspace::new();
        ws.register("web");
        ws.register("api");
        let workflows = Workflows::new(ws.store());

        let done = workflows.create("web", "", &names(&["a"])).expect("create");
        let done = workflows
            .start(&done.id, &mut ScriptedOutcomeProvider::all_complete())
            .expect("start");
        assert_eq!(done.status, WorkflowStatus::Completed);

        let failed = workflows.create("api", "", &names(&["a"])).expect("create");
        let failed = workflows
            .start(
                &failed.id,
                &mut ScriptedOutcomeProvider::new(vec![AgentOutcome::Fail {
                    reason: "boom".to_string(),
                }]),
            )
            .expect("start");
        assert_eq!(failed.status, WorkflowStatus::Failed);

        for before in [done, failed] {
            let returned = workflows.cancel(&before.id).expect("cancel");
            assert_eq!(returned, before);
            assert_eq!(workflows.load(&before.id).expect("load"), before);
        }
    }

    /// Cancels or pauses the workflow through a separate handle while its
    /// first agent is running, then reports success for that agent.
    struct InterruptingProvider<'s> {
        store: &'s WorkspaceStore,
        event: WorkflowEvent,
        seen: Vec<String>,
    }

    impl AgentOutcomeProvider for InterruptingProvider<'_> {
        fn outcome(&mut self, workflow: &Workflow, agent: &WorkflowAgent) -> Result<AgentOutcome> {
            if self.seen.is_empty() {
                let other = Workflows::new(self.store);
                match self.event {
                    WorkflowEvent::Pause => other.pause(&workflow.id)?,
                    _ => other.cancel(&workflow.id)?,
                };
            }
            self.seen.push(agent.name.clone());
            Ok(AgentOutcome::Complete { result: None })
        }
    }

    #[test]
    fn cancel_from_elsewhere_stops_the_running_loop() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let workflows = Workflows::new(ws.store());
        let wf = workflows
            .create("web", "", &names(&["a", "b"]))
            .expect("create");

        let mut provider = InterruptingProvider {
            store: ws.store(),
            event: WorkflowEvent::Cancel,
            seen: Vec::new(),
        };
        let result = workflows.start(&wf.id, &mut provider).expect("start");
        assert_eq!(result.status, WorkflowStatus::Cancelled);
        assert_eq!(provider.seen, ["a"]);

        let stored = workflows.load(&wf.id).expect("load");
        assert_eq!(stored.status, WorkflowStatus::Cancelled);
        assert_eq!(stored.current_agent_index, 0);
        assert_ne!(stored.agents[0].status, AgentStatus::Completed);
        assert_eq!(stored.agents[1].status, AgentStatus::Pending);
    }

    #[test]
    fn pause_from_elsewhere_keeps_the_agent_for_resume() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let workflows = Workflows::new(ws.store());
        let wf = workflows
            .create("web", "", &names(&["a", "b"]))
            .expect("create");

        let mut provider = InterruptingProvider {
            store: ws.store(),
            event: WorkflowEvent::Pause,
            seen: Vec::new(),
        };
        let paused = workflows.start(&wf.id, &mut provider).expect("start");
        assert_eq!(paused.status, WorkflowStatus::Paused);
        assert_eq!(paused.current_agent_index, 0);
        assert_eq!(paused.agents[0].status, AgentStatus::InProgress);

        let mut rest = ScriptedOutcomeProvider::all_complete();
        let outcome = workflows
            .resume(Some(wf.id.as_str()), false, &mut rest)
            .expect("resume");
        assert_eq!(outcome.workflow().status, WorkflowStatus::Completed);
        assert_eq!(rest.seen(), &["a", "b"]);
    }

    #[test]
    fn concurrent_starts_activate_one_workflow() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let workflows = Workflows::new(ws.store());
        let ids: Vec<String> = (0..4)
            .map(|_| {
                workflows
                    .create("web", "", &names(&["a"]))
                    .expect("create")
                    .id
            })
            .collect();

        let started: Vec<Result<Workflow>> = std::thread::scope(|scope| {
            let handles: Vec<_> = ids
                .iter()
                .map(|id| {
                    let store = ws.store();
                    scope.spawn(move || {
                        let mut pausing = ScriptedOutcomeProvider::new(vec![AgentOutcome::Pause]);
                        Workflows::new(store).start(id, &mut pausing)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("join"))
                .collect()
        });

        let ok = started.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1);
        for err in started.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(
                err.downcast_ref::<AgentflowError>(),
                Some(AgentflowError::ActiveWorkflowExists { .. })
            ));
        }
        let active = workflows
            .status(&StatusFilter::default())
            .expect("status")
            .into_iter()
            .filter(|wf| wf.status.is_active())
            .count();
        assert_eq!(active, 1);
    }
}
