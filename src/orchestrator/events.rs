//! Progress events emitted while a run executes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::session::{SessionId, SessionStatus};
use crate::types::{Message, Role, ToolCall, ToolResultBlock};

/// Milestones of a run, in emission order.
///
/// Events are observational: consuming them (or not) never changes how the
/// run proceeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    RunStarted {
        session_id: SessionId,
    },
    StepStart {
        step: usize,
    },
    MessageStart {
        role: Role,
    },
    TextDelta {
        text: String,
    },
    ToolCallStart {
        id: String,
        name: String,
    },
    ToolCallDelta {
        id: String,
        arguments_fragment: String,
    },
    ToolCallEnd {
        call: ToolCall,
    },
    ToolResult {
        result: ToolResultBlock,
    },
    MessageEnd {
        message: Message,
    },
    StepEnd {
        step: usize,
        tool_calls: usize,
    },
    Error {
        message: String,
    },
    RunFinished {
        status: SessionStatus,
        steps: usize,
    },
}

/// Callback receiving run progress.
pub type AgentEventSink = Arc<dyn Fn(AgentEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct AgentEventEmitter {
    sink: Option<AgentEventSink>,
}

impl AgentEventEmitter {
    pub(crate) fn new(sink: Option<AgentEventSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn emit(&self, event: AgentEvent) {
        if let Some(sink) = &self.sink {
            (sink)(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_with_snake_case_tag() {
        let event = AgentEvent::StepEnd {
            step: 2,
            tool_calls: 1,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "step_end", "step": 2, "tool_calls": 1})
        );
    }

    #[test]
    fn emitter_without_sink_is_silent() {
        AgentEventEmitter::default().emit(AgentEvent::StepStart { step: 1 });
    }
}
