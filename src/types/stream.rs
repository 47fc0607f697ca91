//! Incremental inference events.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;
use super::usage::Usage;

/// One primitive event of a streamed assistant turn.
///
/// Events for distinct tool-call ids may interleave. `ToolCallEnd` may carry
/// the complete arguments; when it does not, the concatenated
/// `ToolCallDelta` fragments for that id are used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InferenceEvent {
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
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<serde_json::Value>,
    },
    Finish {
        reason: FinishReason,
        #[serde(default)]
        usage: Usage,
    },
    Error {
        error: String,
    },
}

impl InferenceEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    pub fn finish(reason: FinishReason) -> Self {
        Self::Finish {
            reason,
            usage: Usage::default(),
        }
    }
}
