//! Production [`AgentOutcomeProvider`]s.
//!
//! `--auto` runs every agent without asking. Otherwise the user is asked
//! per agent on a line-based prompt.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::workflow_state::{AgentOutcome, Workflow, WorkflowAgent};
use crate::io::agent::AgentInvoker;
use crate::io::registry::Registry;
use crate::io::store::WorkspaceStore;
use crate::parallel::run_one;
use crate::workflow::AgentOutcomeProvider;

/// Everything needed to invoke a workflow's agents against its project.
pub struct AgentInvocation<'a, I: AgentInvoker + ?Sized> {
    pub store: &'a WorkspaceStore,
    pub invoker: &'a I,
    pub tool: String,
    pub extra_args: Vec<String>,
}

impl<I: AgentInvoker + ?Sized> AgentInvocation<'_, I> {
    /// Run the agent in the workflow's project: exit 0 completes it,
    /// anything else fails it.
    fn run(&self, workflow: &Workflow, agent: &str) -> AgentOutcome {
        let project = match Registry::new(self.store).require(&workflow.project_id) {
            Ok(project) => project,
            Err(err) => {
                return AgentOutcome::Fail {
                    reason: format!("{err:#}"),
                };
            }
        };
        let run = run_one(
            self.store,
            self.invoker,
            &project,
            agent,
            &self.tool,
            &self.extra_args,
        );
        match run.outcome {
            Ok(agent_run) if agent_run.succeeded() => AgentOutcome::Complete {
                result: Some("exit 0".to_string()),
            },
            Ok(agent_run) => AgentOutcome::Fail {
                reason: match agent_run.exit_code {
                    Some(code) => format!("exit {code}"),
                    None => "terminated by signal".to_string(),
                },
            },
            Err(reason) => AgentOutcome::Fail { reason },
        }
    }
}

/// Runs every agent through the invoker.
pub struct InvokingOutcomeProvider<'a, I: AgentInvoker + ?Sized> {
    invocation: AgentInvocation<'a, I>,
}

impl<'a, I: AgentInvoker + ?Sized> InvokingOutcomeProvider<'a, I> {
    pub fn new(invocation: AgentInvocation<'a, I>) -> Self {
        Self { invocation }
    }
}

impl<I: AgentInvoker + ?Sized> AgentOutcomeProvider for InvokingOutcomeProvider<'_, I> {
    fn outcome(&mut self, workflow: &Workflow, agent: &WorkflowAgent) -> Result<AgentOutcome> {
        Ok(self.invocation.run(workflow, &agent.name))
    }
}

/// Asks on `output` and reads one choice per line from `input`.
///
/// End of input pauses the workflow so it can be resumed later.
pub struct PromptOutcomeProvider<'a, R, W, I: AgentInvoker + ?Sized> {
    input: R,
    output: W,
    invocation: AgentInvocation<'a, I>,
}

impl<'a, R: BufRead, W: Write, I: AgentInvoker + ?Sized> PromptOutcomeProvider<'a, R, W, I> {
    pub fn new(input: R, output: W, invocation: AgentInvocation<'a, I>) -> Self {
        Self {
            input,
            output,
            invocation,
        }
    }
}

impl<R: BufRead, W: Write, I: AgentInvoker + ?Sized> AgentOutcomeProvider
    for PromptOutcomeProvider<'_, R, W, I>
{
    fn outcome(&mut self, workflow: &Workflow, agent: &WorkflowAgent) -> Result<AgentOutcome> {
        loop {
            write!(
                self.output,
                "[{}/{}] {}: [r]un, [d]one, [s]kip, [p]ause, [c]ancel? ",
                agent.order + 1,
                workflow.agents.len(),
                agent.name
            )
            .context("write prompt")?;
            self.output.flush().context("flush prompt")?;

            let mut line = String::new();
            let read = self.input.read_line(&mut line).context("read choice")?;
            if read == 0 {
                writeln!(self.output).context("write prompt")?;
                debug!(agent = %agent.name, "input closed, pausing");
                return Ok(AgentOutcome::Pause);
            }

            let choice = line.trim().to_ascii_lowercase();
            let outcome = match choice.as_str() {
                "r" | "run" => self.invocation.run(workflow, &agent.name),
                "d" | "done" => AgentOutcome::Complete { result: None },
                "s" | "skip" => AgentOutcome::Skip,
                "p" | "pause" => AgentOutcome::Pause,
                "c" | "cancel" => AgentOutcome::Cancel,
                other => {
                    writeln!(self.output, "unrecognized choice '{other}'")
                        .context("write prompt")?;
                    continue;
                }
            };
            return Ok(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::execution_log::recent;
    use crate::test_support::{FakeInvoker, TestWorkspace};
    use chrono::Utc;
    use std::io::Cursor;

    fn workflow(names: &[&str]) -> Workflow {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        Workflow::new(
            "wf-test".to_string(),
            "web".to_string(),
            String::new(),
            &names,
            Utc::now(),
        )
    }

    #[test]
    fn prompt_maps_choices_and_reprompts_on_garbage() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let invoker = FakeInvoker::new();
        let wf = workflow(&["a"]);
        let mut out = Vec::new();
        let mut provider = PromptOutcomeProvider::new(
            Cursor::new("x\nS\nd\np\nc\n"),
            &mut out,
            AgentInvocation {
                store: ws.store(),
                invoker: &invoker,
                tool: "t".to_string(),
                extra_args: Vec::new(),
            },
        );

        let agent = &wf.agents[0];
        assert_eq!(provider.outcome(&wf, agent).unwrap(), AgentOutcome::Skip);
        assert_eq!(
            provider.outcome(&wf, agent).unwrap(),
            AgentOutcome::Complete { result: None }
        );
        assert_eq!(provider.outcome(&wf, agent).unwrap(), AgentOutcome::Pause);
        assert_eq!(provider.outcome(&wf, agent).unwrap(), AgentOutcome::Cancel);
        assert_eq!(provider.outcome(&wf, agent).unwrap(), AgentOutcome::Pause);
        drop(provider);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("unrecognized choice 'x'"));
        assert!(text.contains("[1/1] a:"));
        assert!(invoker.calls().is_empty());
    }

    #[test]
    fn run_choice_invokes_agent_and_maps_exit_code() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let invoker = FakeInvoker::new().exit_code("web", 3);
        let wf = workflow(&["lint"]);
        let mut provider = PromptOutcomeProvider::new(
            Cursor::new("r\n"),
            Vec::new(),
            AgentInvocation {
                store: ws.store(),
                invoker: &invoker,
                tool: "check".to_string(),
                extra_args: vec!["--all".to_string()],
            },
        );

        let outcome = provider.outcome(&wf, &wf.agents[0]).unwrap();
        assert_eq!(
            outcome,
            AgentOutcome::Fail {
                reason: "exit 3".to_string()
            }
        );
        assert_eq!(invoker.calls(), vec!["web:lint:check --all".to_string()]);
        assert_eq!(recent(ws.store(), "web", 5).unwrap().len(), 1);
    }

    #[test]
    fn unregistered_project_fails_the_agent() {
        let ws = TestWorkspace::new();
        let invoker = FakeInvoker::new();
        let wf = workflow(&["a"]);
        let mut provider = InvokingOutcomeProvider::new(AgentInvocation {
            store: ws.store(),
            invoker: &invoker,
            tool: "build".to_string(),
            extra_args: Vec::new(),
        });
        let outcome = provider.outcome(&wf, &wf.agents[0]).unwrap();
        assert!(matches!(outcome, AgentOutcome::Fail { reason } if reason.contains("project not found")));
        assert!(invoker.calls().is_empty());
    }

    #[test]
    fn invoking_provider_completes_on_success() {
        let ws = TestWorkspace::new();
        ws.register("web");
        let invoker = FakeInvoker::new();
        let wf = workflow(&["a"]);
        let mut provider = InvokingOutcomeProvider::new(AgentInvocation {
            store: ws.store(),
            invoker: &invoker,
            tool: "build".to_string(),
            extra_args: Vec::new(),
        });
        assert_eq!(
            provider.outcome(&wf, &wf.agents[0]).unwrap(),
            AgentOutcome::Complete {
                result: Some("exit 0".to_string())
            }
        );
    }
}
