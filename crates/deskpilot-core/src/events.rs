//! Events streamed by the agent loop.

use deskpilot_providers::{ComputerAction, Display, SafetyCheck};
use serde::{Deserialize, Serialize};

/// Message used when a run is interrupted
pub const STOPPED_BY_USER: &str = "Generation stopped by user";

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model finished without requesting more actions
    Completed,
    /// The cancellation token fired
    Interrupted,
    /// `max_iterations` model turns were used up
    IterationLimit,
    /// A transport, capture or safety-check failure
    #[default]
    Failed,
}

/// One step of a run, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Started {
        run_id: String,
        display: Display,
    },
    Reasoning {
        content: String,
    },
    Message {
        content: String,
    },
    Action {
        call_id: String,
        action: ComputerAction,
    },
    ActionCompleted {
        call_id: String,
    },
    ActionFailed {
        call_id: String,
        error: String,
    },
    SafetyCheck {
        call_id: String,
        check: SafetyCheck,
    },
    Done {
        content: String,
        iterations: usize,
        reason: StopReason,
    },
    Error {
        content: String,
    },
}

impl AgentEvent {
    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done { .. } | AgentEvent::Error { .. })
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutcome {
    pub run_id: Option<String>,
    /// Final model text, or the error message for failed runs
    pub text: String,
    /// Model turns requested
    pub iterations: usize,
    /// Actions dispatched, failed ones included
    pub actions: usize,
    pub failed_actions: usize,
    pub stop_reason: StopReason,
}

impl AgentOutcome {
    /// Fold one event into the summary.
    pub fn record(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::Started { run_id, .. } => self.run_id = Some(run_id.clone()),
            AgentEvent::Action { .. } => self.actions += 1,
            AgentEvent::ActionFailed { .. } => self.failed_actions += 1,
            AgentEvent::Done {
                content,
                iterations,
                reason,
            } => {
                self.text = content.clone();
                self.iterations = *iterations;
                self.stop_reason = *reason;
            }
            AgentEvent::Error { content } => {
                self.text = content.clone();
                self.stop_reason = StopReason::Failed;
            }
            AgentEvent::Reasoning { .. }
            | AgentEvent::Message { .. }
            | AgentEvent::ActionCompleted { .. }
            | AgentEvent::SafetyCheck { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = AgentEvent::Action {
            call_id: "call_1".to_string(),
            action: ComputerAction::Type {
                text: "hi".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "action",
                "call_id": "call_1",
                "action": {"type": "type", "text": "hi"}
            })
        );

        let done = AgentEvent::Done {
            content: STOPPED_BY_USER.to_string(),
            iterations: 2,
            reason: StopReason::Interrupted,
        };
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            json!({
                "type": "done",
                "content": "Generation stopped by user",
                "iterations": 2,
                "reason": "interrupted"
            })
        );
    }

    #[test]
    fn outcome_folds_events() {
        let mut outcome = AgentOutcome::default();
        let events = [
            AgentEvent::Started {
                run_id: "r1".to_string(),
                display: Display::new(1024, 768),
            },
            AgentEvent::Action {
                call_id: "a".to_string(),
                action: ComputerAction::Screenshot,
            },
            AgentEvent::ActionFailed {
                call_id: "a".to_string(),
                error: "boom".to_string(),
            },
            AgentEvent::Done {
                content: "finished".to_string(),
                iterations: 3,
                reason: StopReason::Completed,
            },
        ];
        for event in &events {
            outcome.record(event);
        }

        assert_eq!(outcome.run_id.as_deref(), Some("r1"));
        assert_eq!(outcome.actions, 1);
        assert_eq!(outcome.failed_actions, 1);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.text, "finished");
        assert_eq!(outcome.stop_reason, StopReason::Completed);
        assert!(events[3].is_terminal());
        assert!(!events[0].is_terminal());
    }
}
