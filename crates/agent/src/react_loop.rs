//! The loop controller: Thought → Action → Observation until done.
//!
//! One run moves through `INIT → REASONING → ACTING → OBSERVING` and back to
//! REASONING until it reaches a terminal status:
//!
//! - `Completed`: the backend gave a final answer
//! - `Failed`: the iteration budget ran out, or the backend failed fatally
//! - `Aborted`: the cancel token was set at an iteration boundary
//!
//! Malformed replies, unknown or gated tools, tool failures and timeouts are
//! recorded as observations and the loop carries on. Every recorded step
//! counts against `max_iterations`.

use std::path::PathBuf;
use std::sync::Arc;

use stepwise_core::{
    ActionInput, Backend, FailureReason, ObservationKind, RunConfig, RunState, RunStatus, Step,
    truncate_text,
};
use stepwise_tools::ToolRegistry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::parser::{Decision, ParsedReply, extract_thought, parse_reply};
use crate::prompt::{PromptContext, build_prompt};
use crate::stream_event::RunEvent;

const PREVIEW_CHARS: usize = 100;
const EVENT_BUFFER: usize = 64;

/// Drives runs against a shared backend and tool registry.
#[derive(Clone)]
pub struct ReactLoop {
    backend: Arc<dyn Backend>,
    tools: Arc<ToolRegistry>,
    config: Arc<RunConfig>,
    working_dir: PathBuf,
}

/// A run executing on its own task.
pub struct RunHandle {
    /// Live events, ending with `RunEvent::Finished`.
    pub events: mpsc::Receiver<RunEvent>,
    pub cancel: CancelToken,
    pub task: JoinHandle<RunState>,
}

impl ReactLoop {
    pub fn new(backend: Arc<dyn Backend>, tools: Arc<ToolRegistry>, config: Arc<RunConfig>) -> Self {
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            backend,
            tools,
            config,
            working_dir,
        }
    }

    /// Set the directory reported to the backend in the prompt.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run `goal` to a terminal state.
    pub async fn run(&self, goal: &str) -> RunState {
        self.run_with(goal, &CancelToken::new(), None).await
    }

    /// Run `goal` on a spawned task, streaming events as steps are recorded.
    pub fn run_stream(&self, goal: impl Into<String>) -> RunHandle {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancelToken::new();
        let this = self.clone();
        let goal = goal.into();
        let token = cancel.clone();
        let task = tokio::spawn(async move { this.run_with(&goal, &token, Some(&tx)).await });
        RunHandle {
            events: rx,
            cancel,
            task,
        }
    }

    /// Run `goal`, honoring `cancel` and reporting to `events` if given.
    pub async fn run_with(
        &self,
        goal: &str,
        cancel: &CancelToken,
        events: Option<&mpsc::Sender<RunEvent>>,
    ) -> RunState {
        let mut state = RunState::new(goal);
        info!(
            run_id = %state.run_id,
            backend = %self.backend.name(),
            model = %self.backend.model(),
            max_iterations = self.config.max_iterations,
            "Run starting"
        );
        emit(
            events,
            RunEvent::Started {
                run_id: state.run_id,
                goal: goal.to_string(),
            },
        )
        .await;

        let status = loop {
            if cancel.is_cancelled() {
                info!(run_id = %state.run_id, "Run aborted");
                break RunStatus::Aborted;
            }
            if state.iteration_count() >= self.config.max_iterations {
                warn!(
                    run_id = %state.run_id,
                    max_iterations = self.config.max_iterations,
                    "Iteration limit reached"
                );
                break RunStatus::Failed {
                    reason: FailureReason::IterationLimitExceeded {
                        max_iterations: self.config.max_iterations,
                    },
                };
            }

            let iteration = state.iteration_count() + 1;
            let prompt = self.prompt_for(&state);
            debug!(iteration, prompt_chars = prompt.chars().count(), "Reasoning");

            let reply = match self.backend.generate(&prompt).await {
                Ok(reply) => reply,
                Err(err) => {
                    error!(run_id = %state.run_id, iteration, error = %err, "Backend failed");
                    break RunStatus::Failed {
                        reason: FailureReason::BackendError {
                            message: err.to_string(),
                        },
                    };
                }
            };
            debug!(iteration, reply = %truncate_text(&reply, PREVIEW_CHARS), "Backend replied");

            let step = match parse_reply(&reply) {
                Ok(ParsedReply {
                    thought,
                    decision: Decision::Finish { answer },
                }) => {
                    debug!(iteration, thought = %truncate_text(&thought, PREVIEW_CHARS), "Final answer");
                    break RunStatus::Completed { answer };
                }
                Ok(ParsedReply {
                    thought,
                    decision: Decision::Act { tool, input },
                }) => self.act(thought, tool, input).await,
                Err(err) => {
                    warn!(iteration, error = %err, "Could not parse backend reply");
                    Step::parse_error(
                        extract_thought(&reply),
                        truncate_text(&format!("Error: {err}"), self.config.max_error_chars),
                    )
                }
            };

            let index = state.transcript().len();
            if let Err(err) = state.record(step.clone()) {
                error!(run_id = %state.run_id, error = %err, "Could not record step");
                break RunStatus::Aborted;
            }
            emit(events, RunEvent::Step { index, step }).await;
        };

        if let Err(err) = state.finish(status) {
            error!(run_id = %state.run_id, error = %err, "Could not finish run");
        }

        let elapsed_ms = state.elapsed().num_milliseconds();
        info!(
            run_id = %state.run_id,
            status = state.status().label(),
            iterations = state.iteration_count(),
            elapsed_ms,
            "Run finished"
        );
        emit(
            events,
            RunEvent::Finished {
                run_id: state.run_id,
                status: state.status().clone(),
                iterations: state.iteration_count(),
            },
        )
        .await;
        state
    }

    fn prompt_for(&self, state: &RunState) -> String {
        let catalog = self.tools.catalog(&self.config);
        build_prompt(&PromptContext {
            goal: &state.goal,
            tools: &catalog,
            transcript: state.transcript(),
            working_dir: &self.working_dir,
        })
    }

    /// ACTING and OBSERVING: dispatch through the registry and build the step.
    async fn act(&self, thought: String, tool: String, input: ActionInput) -> Step {
        info!(tool = %tool, input = %truncate_text(&input.to_string(), PREVIEW_CHARS), "Acting");
        let observation = self.tools.invoke(&tool, &input, &self.config).await;

        let text = if observation.kind == ObservationKind::ToolNotAvailable {
            // Only list what the backend is allowed to see.
            let names = self
                .tools
                .catalog(&self.config)
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            truncate_text(
                &format!("{} Available tools: {names}.", observation.text),
                self.config.max_error_chars,
            )
        } else {
            observation.text
        };

        Step::acted(thought, tool, input, text, observation.kind)
    }
}

async fn emit(events: Option<&mpsc::Sender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events
        && tx.send(event).await.is_err()
    {
        debug!("Run event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedBackend;
    use async_trait::async_trait;
    use stepwise_core::{BackendError, Tool, ToolError};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes its input"
        }
        async fn execute(&self, input: &ActionInput) -> Result<String, ToolError> {
            Ok(format!("echo: {input}"))
        }
    }

    struct Shell;

    #[async_trait]
    impl Tool for Shell {
        fn name(&self) -> &str {
            "shell"
        }
        fn description(&self) -> &str {
            "Runs a command"
        }
        fn dangerous(&self) -> bool {
            true
        }
        async fn execute(&self, _input: &ActionInput) -> Result<String, ToolError> {
            Ok("ran".into())
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register_builtin(Arc::new(Echo)).unwrap();
        registry.register_builtin(Arc::new(Shell)).unwrap();
        Arc::new(registry)
    }

    fn agent(backend: Arc<ScriptedBackend>, config: RunConfig) -> ReactLoop {
        ReactLoop::new(backend, registry(), Arc::new(config)).with_working_dir("/tmp")
    }

    #[tokio::test]
    async fn answer_on_first_reply() {
        let backend = ScriptedBackend::replies(["Thought: easy\nFinal Answer: 42"]);
        let state = agent(backend.clone(), RunConfig::default()).run("what is 6*7").await;

        assert_eq!(state.answer(), Some("42"));
        assert!(state.transcript().is_empty());
        assert_eq!(state.iteration_count(), 0);
        assert_eq!(backend.call_count(), 1);
        assert!(state.finished_at.is_some());
    }

    #[tokio::test]
    async fn observation_feeds_next_prompt() {
        let backend = ScriptedBackend::replies([
            "Thought: try echo\nAction: echo\nAction Input: ping",
            "Thought: got it\nFinal Answer: pong",
        ]);
        let state = agent(backend.clone(), RunConfig::default()).run("ping").await;

        assert_eq!(state.answer(), Some("pong"));
        let step = &state.transcript().steps()[0];
        assert_eq!(step.action.as_deref(), Some("echo"));
        assert_eq!(step.observation, "echo: ping");
        assert_eq!(step.kind, ObservationKind::Output);

        let prompts = backend.prompts();
        assert!(prompts[0].contains("No history yet."));
        assert!(prompts[1].contains("Observation: echo: ping"));
    }

    #[tokio::test]
    async fn gated_tool_is_hidden_and_refused() {
        let backend = ScriptedBackend::replies([
            "Thought: run it\nAction: shell\nAction Input: ls",
            "Final Answer: gave up",
        ]);
        let state = agent(backend.clone(), RunConfig::default()).run("ls").await;

        let step = &state.transcript().steps()[0];
        assert_eq!(step.kind, ObservationKind::ToolNotAvailable);
        assert!(step.observation.contains("Available tools: echo."));
        assert!(!backend.prompts()[0].contains("- shell:"));
        assert_eq!(state.answer(), Some("gave up"));
    }

    #[tokio::test]
    async fn parse_error_is_recorded_and_counted() {
        let backend = ScriptedBackend::replies(["I think I am done?", "Final Answer: done"]);
        let state = agent(backend, RunConfig::default()).run("goal").await;

        assert_eq!(state.iteration_count(), 1);
        let step = &state.transcript().steps()[0];
        assert_eq!(step.kind, ObservationKind::ParseError);
        assert_eq!(step.thought, "I think I am done?");
        assert!(step.action.is_none());
        assert!(step.observation.starts_with("Error: No action was specified"));
    }

    #[tokio::test]
    async fn parse_error_text_is_bounded() {
        let long = format!("Action: echo\nAction Input: {{{}", "x".repeat(2000));
        let backend = ScriptedBackend::replies([long.as_str()]);
        let config = RunConfig {
            max_error_chars: 50,
            ..RunConfig::default()
        }
        .with_max_iterations(1);
        let state = agent(backend, config).run("goal").await;
        let step = &state.transcript().steps()[0];
        assert!(step.observation.chars().count() <= 50 + stepwise_core::transcript::TRUNCATION_MARKER.len());
    }

    #[tokio::test]
    async fn fatal_backend_error_fails_without_a_step() {
        let backend = ScriptedBackend::new(vec![Err(BackendError::AuthenticationFailed(
            "bad key".into(),
        ))]);
        let state = agent(backend, RunConfig::default()).run("goal").await;

        match state.status() {
            RunStatus::Failed {
                reason: FailureReason::BackendError { message },
            } => assert!(message.contains("bad key")),
            other => panic!("expected backend failure, got {other:?}"),
        }
        assert!(state.transcript().is_empty());
        assert_eq!(state.iteration_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_first_reasoning() {
        let backend = ScriptedBackend::replies(["Final Answer: never"]);
        let token = CancelToken::new();
        token.cancel();
        let state = agent(backend.clone(), RunConfig::default())
            .run_with("goal", &token, None)
            .await;

        assert_eq!(state.status(), &RunStatus::Aborted);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn stream_reports_every_step_in_order() {
        let backend = ScriptedBackend::replies([
            "Action: echo\nAction Input: one",
            "Action: echo\nAction Input: two",
            "Final Answer: done",
        ]);
        let mut handle = agent(backend, RunConfig::default()).run_stream("twice");

        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            events.push(event);
        }
        let state = handle.task.await.unwrap();

        let kinds: Vec<_> = events.iter().map(RunEvent::event_type).collect();
        assert_eq!(kinds, ["started", "step", "step", "finished"]);
        match &events[2] {
            RunEvent::Step { index, step } => {
                assert_eq!(*index, 1);
                assert_eq!(step.observation, "echo: two");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(state.answer(), Some("done"));
    }
}
