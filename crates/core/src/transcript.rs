//! Run bookkeeping: steps, the append-only transcript, and run state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StateError, ToolError};
use crate::tool::ActionInput;

/// Marker appended to text cut by [`truncate_text`].
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Cut `text` to at most `max_chars` characters, appending
/// [`TRUNCATION_MARKER`] when anything was dropped.
///
/// Counts characters, not bytes, so the cut never splits a code point.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..byte_idx]),
    }
}

/// What produced a step's observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    /// Normal tool output.
    Output,
    /// The backend reply did not follow the action grammar.
    ParseError,
    /// Unknown tool, or a dangerous tool while dangerous tools are disabled.
    ToolNotAvailable,
    /// The tool failed or panicked.
    ToolExecutionError,
    /// The tool call exceeded its deadline.
    Timeout,
}

impl ObservationKind {
    pub fn is_error(self) -> bool {
        !matches!(self, ObservationKind::Output)
    }
}

impl From<&ToolError> for ObservationKind {
    fn from(err: &ToolError) -> Self {
        match err {
            ToolError::NotAvailable(_) => ObservationKind::ToolNotAvailable,
            ToolError::Timeout { .. } => ObservationKind::Timeout,
            ToolError::ExecutionFailed { .. } | ToolError::InvalidInput(_) => {
                ObservationKind::ToolExecutionError
            }
        }
    }
}

/// One loop iteration's record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub thought: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_input: Option<ActionInput>,
    pub observation: String,
    pub kind: ObservationKind,
    pub timestamp: DateTime<Utc>,
}

impl Step {
    /// A step that dispatched a tool.
    pub fn acted(
        thought: impl Into<String>,
        action: impl Into<String>,
        action_input: ActionInput,
        observation: impl Into<String>,
        kind: ObservationKind,
    ) -> Self {
        Self {
            thought: thought.into(),
            action: Some(action.into()),
            action_input: Some(action_input),
            observation: observation.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// A synthetic step for a reply the parser rejected.
    pub fn parse_error(thought: impl Into<String>, observation: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            action: None,
            action_input: None,
            observation: observation.into(),
            kind: ObservationKind::ParseError,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, append-only sequence of steps.
///
/// Only [`Transcript::push`] changes it; earlier entries are never
/// reordered, removed, or edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    steps: Vec<Step>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Why a run ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    IterationLimitExceeded { max_iterations: u32 },
    BackendError { message: String },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::IterationLimitExceeded { max_iterations } => {
                write!(f, "iteration limit of {max_iterations} exceeded")
            }
            FailureReason::BackendError { message } => write!(f, "backend error: {message}"),
        }
    }
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed { answer: String },
    Failed { reason: FailureReason },
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed { .. } => "completed",
            RunStatus::Failed { .. } => "failed",
            RunStatus::Aborted => "aborted",
        }
    }
}

/// The state of one run, owned by the loop controller for its duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub goal: String,
    transcript: Transcript,
    iteration_count: u32,
    status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    /// A fresh run in `Running` status.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            goal: goal.into(),
            transcript: Transcript::new(),
            iteration_count: 0,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The terminal answer, if the run completed.
    pub fn answer(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Completed { answer } => Some(answer),
            _ => None,
        }
    }

    /// Append a step and count it against the iteration budget.
    pub fn record(&mut self, step: Step) -> Result<(), StateError> {
        if self.status.is_terminal() {
            return Err(StateError::AlreadyTerminal(self.status.label().into()));
        }
        self.transcript.push(step);
        self.iteration_count += 1;
        Ok(())
    }

    /// Move to a terminal status. Allowed exactly once.
    pub fn finish(&mut self, status: RunStatus) -> Result<(), StateError> {
        if !status.is_terminal() {
            return Err(StateError::NotTerminal);
        }
        if self.status.is_terminal() {
            return Err(StateError::AlreadyTerminal(self.status.label().into()));
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Wall-clock duration of the run so far (or in total, once finished).
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }
}
