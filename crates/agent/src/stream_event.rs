//! Run-level streaming events.
//!
//! `RunEvent` is what a front end sees while a run is in progress: one
//! `started`, one `step` per transcript entry in append order, then one
//! `finished` carrying the terminal state.

use serde::{Deserialize, Serialize};
use stepwise_core::{RunStatus, Step};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// The run has begun.
    Started { run_id: Uuid, goal: String },

    /// A step was appended; `index` is its position in the transcript.
    Step { index: usize, step: Step },

    /// The run reached a terminal status.
    Finished {
        run_id: Uuid,
        status: RunStatus,
        iterations: u32,
    },
}

impl RunEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Step { .. } => "step",
            Self::Finished { .. } => "finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::FailureReason;

    #[test]
    fn started_serialization() {
        let event = RunEvent::Started {
            run_id: Uuid::nil(),
            goal: "list files".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"started""#));
        assert!(json.contains(r#""goal":"list files""#));
    }

    #[test]
    fn finished_carries_reason() {
        let event = RunEvent::Finished {
            run_id: Uuid::nil(),
            status: RunStatus::Failed {
                reason: FailureReason::IterationLimitExceeded { max_iterations: 3 },
            },
            iterations: 3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""status":"failed""#));
        assert!(json.contains(r#""type":"iteration_limit_exceeded""#));
        assert_eq!(event.event_type(), "finished");
    }
}
