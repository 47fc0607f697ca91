//! Folding inference events into an assistant turn.
//!
//! Both execution modes end up here: streamed events are fed in as they
//! arrive, and a batch response is first expanded by [`response_events`].
//! That keeps the assembled assistant message identical across modes.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::StepwiseError;
use crate::types::{ContentBlock, FinishReason, InferenceEvent, ToolCall, Usage};

use super::InferenceResponse;

/// Expand a batch response into the primitive event sequence a streaming
/// provider would have produced for it.
pub fn response_events(response: &InferenceResponse) -> Vec<InferenceEvent> {
    let mut events = Vec::new();
    for block in &response.content {
        match block {
            ContentBlock::Text { text } if !text.is_empty() => {
                events.push(InferenceEvent::text(text.clone()));
            }
            ContentBlock::ToolCall(call) => {
                events.push(InferenceEvent::ToolCallStart {
                    id: call.id.clone(),
                    name: call.name.clone(),
                });
                events.push(InferenceEvent::ToolCallEnd {
                    id: call.id.clone(),
                    name: Some(call.name.clone()),
                    arguments: Some(call.arguments.clone()),
                });
            }
            _ => {}
        }
    }
    events.push(InferenceEvent::Finish {
        reason: response.finish_reason,
        usage: response.usage,
    });
    events
}

/// The sealed result of one assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTurn {
    /// Text first (when any), then tool calls in the order they started.
    pub content: Vec<ContentBlock>,
    pub tool_calls: Vec<ToolCall>,
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

#[derive(Debug)]
struct PendingCall {
    id: String,
    name: String,
    buffer: String,
    arguments: Option<Value>,
}

impl PendingCall {
    fn seal(self) -> ToolCall {
        let arguments = match self.arguments {
            Some(arguments) => arguments,
            None => parse_arguments(&self.buffer),
        };
        ToolCall {
            id: self.id,
            name: self.name,
            arguments,
        }
    }
}

/// Parse accumulated argument text, keeping the raw text when it is not JSON.
pub fn parse_arguments(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Accumulates one turn's events.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    text: String,
    calls: Vec<PendingCall>,
    by_id: HashMap<String, usize>,
    finish: Option<(FinishReason, Usage)>,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn call_mut(&mut self, id: &str) -> &mut PendingCall {
        let index = match self.by_id.get(id).copied() {
            Some(index) => index,
            None => {
                self.calls.push(PendingCall {
                    id: id.to_string(),
                    name: String::new(),
                    buffer: String::new(),
                    arguments: None,
                });
                self.by_id.insert(id.to_string(), self.calls.len() - 1);
                self.calls.len() - 1
            }
        };
        &mut self.calls[index]
    }

    /// Apply one event.
    ///
    /// Returns the completed call on `ToolCallEnd`. An `Error` event aborts
    /// the turn.
    pub fn apply(&mut self, event: &InferenceEvent) -> Result<Option<ToolCall>, StepwiseError> {
        if self.finish.is_some() {
            tracing::debug!(?event, "ignoring event after finish");
            return Ok(None);
        }
        match event {
            InferenceEvent::TextDelta { text } => self.text.push_str(text),
            InferenceEvent::ToolCallStart { id, name } => {
                // A call seen only through early deltas may still be named here.
                if let Some(index) = self.by_id.get(id) {
                    let known = &self.calls[*index];
                    if !known.name.is_empty() || known.arguments.is_some() {
                        return Err(StepwiseError::Inference(format!(
                            "duplicate tool call id '{id}' in one turn"
                        )));
                    }
                }
                let call = self.call_mut(id);
                call.name = name.clone();
            }
            InferenceEvent::ToolCallDelta {
                id,
                arguments_fragment,
            } => self.call_mut(id).buffer.push_str(arguments_fragment),
            InferenceEvent::ToolCallEnd {
                id,
                name,
                arguments,
            } => {
                let call = self.call_mut(id);
                if let Some(name) = name {
                    call.name = name.clone();
                }
                let arguments = match arguments {
                    Some(arguments) => arguments.clone(),
                    None => parse_arguments(&call.buffer),
                };
                call.arguments = Some(arguments.clone());
                return Ok(Some(ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments,
                }));
            }
            InferenceEvent::Finish { reason, usage } => {
                self.finish = Some((*reason, *usage));
            }
            InferenceEvent::Error { error } => {
                return Err(StepwiseError::Inference(error.clone()));
            }
        }
        Ok(None)
    }

    pub fn is_finished(&self) -> bool {
        self.finish.is_some()
    }

    /// Seal the turn. A turn without `Finish` is sealed as `stop`.
    pub fn finish(self) -> AssembledTurn {
        let (finish_reason, usage) = self.finish.unwrap_or((FinishReason::Stop, Usage::default()));
        let tool_calls: Vec<ToolCall> = self.calls.into_iter().map(PendingCall::seal).collect();

        let mut content = Vec::with_capacity(tool_calls.len() + 1);
        if !self.text.is_empty() {
            content.push(ContentBlock::Text {
                text: self.text.clone(),
            });
        }
        content.extend(tool_calls.iter().cloned().map(ContentBlock::ToolCall));

        AssembledTurn {
            content,
            tool_calls,
            text: self.text,
            finish_reason,
            usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fold(events: &[InferenceEvent]) -> AssembledTurn {
        let mut acc = TurnAccumulator::new();
        for event in events {
            acc.apply(event).unwrap();
        }
        acc.finish()
    }

    #[test]
    fn text_deltas_merge_into_one_block() {
        let turn = fold(&[
            InferenceEvent::text("Hel"),
            InferenceEvent::text("lo"),
            InferenceEvent::finish(FinishReason::Stop),
        ]);
        assert_eq!(turn.content, vec![ContentBlock::Text { text: "Hello".into() }]);
        assert!(turn.tool_calls.is_empty());
    }

    #[test]
    fn interleaved_calls_keep_start_order() {
        let turn = fold(&[
            InferenceEvent::ToolCallStart {
                id: "a".into(),
                name: "first".into(),
            },
            InferenceEvent::ToolCallStart {
                id: "b".into(),
                name: "second".into(),
            },
            InferenceEvent::ToolCallDelta {
                id: "b".into(),
                arguments_fragment: r#"{"y":"#.into(),
            },
            InferenceEvent::ToolCallDelta {
                id: "a".into(),
                arguments_fragment: r#"{"x":1}"#.into(),
            },
            InferenceEvent::ToolCallDelta {
                id: "b".into(),
                arguments_fragment: "2}".into(),
            },
            InferenceEvent::text("thinking"),
            InferenceEvent::ToolCallEnd {
                id: "b".into(),
                name: None,
                arguments: None,
            },
            InferenceEvent::ToolCallEnd {
                id: "a".into(),
                name: None,
                arguments: None,
            },
            InferenceEvent::finish(FinishReason::ToolCalls),
        ]);

        assert_eq!(
            turn.tool_calls,
            vec![
                ToolCall {
                    id: "a".into(),
                    name: "first".into(),
                    arguments: json!({"x": 1}),
                },
                ToolCall {
                    id: "b".into(),
                    name: "second".into(),
                    arguments: json!({"y": 2}),
                },
            ]
        );
        assert!(matches!(turn.content[0], ContentBlock::Text { .. }));
        assert_eq!(turn.finish_reason, FinishReason::ToolCalls);
    }

    #[test]
    fn unparseable_arguments_fall_back_to_raw_string() {
        let mut acc = TurnAccumulator::new();
        acc.apply(&InferenceEvent::ToolCallStart {
            id: "c".into(),
            name: "t".into(),
        })
        .unwrap();
        acc.apply(&InferenceEvent::ToolCallDelta {
            id: "c".into(),
            arguments_fragment: "{\"broken\": ".into(),
        })
        .unwrap();
        let ended = acc
            .apply(&InferenceEvent::ToolCallEnd {
                id: "c".into(),
                name: None,
                arguments: None,
            })
            .unwrap();
        assert_eq!(ended.unwrap().arguments, json!("{\"broken\": "));
    }

    #[test]
    fn error_event_aborts_turn() {
        let mut acc = TurnAccumulator::new();
        let err = acc
            .apply(&InferenceEvent::Error {
                error: "overloaded".into(),
            })
            .unwrap_err();
        assert!(matches!(err, StepwiseError::Inference(ref m) if m == "overloaded"));
    }

    #[test]
    fn duplicate_call_ids_are_rejected() {
        let response = InferenceResponse {
            content: vec![
                ContentBlock::ToolCall(ToolCall {
                    id: "c1".into(),
                    name: "echo".into(),
                    arguments: json!({"text": "a"}),
                }),
                ContentBlock::ToolCall(ToolCall {
                    id: "c1".into(),
                    name: "echo".into(),
                    arguments: json!({"text": "b"}),
                }),
            ],
            finish_reason: FinishReason::ToolCalls,
            usage: Usage::default(),
        };
        let mut acc = TurnAccumulator::new();
        let err = response_events(&response)
            .iter()
            .find_map(|event| acc.apply(event).err())
            .unwrap();
        assert!(matches!(err, StepwiseError::Inference(ref m) if m.contains("'c1'")));
    }

    #[test]
    fn delta_before_start_still_takes_the_name() {
        let turn = fold(&[
            InferenceEvent::ToolCallDelta {
                id: "c".into(),
                arguments_fragment: "{}".into(),
            },
            InferenceEvent::ToolCallStart {
                id: "c".into(),
                name: "late".into(),
            },
            InferenceEvent::finish(FinishReason::ToolCalls),
        ]);
        assert_eq!(turn.tool_calls[0].name, "late");
    }

    #[test]
    fn missing_finish_seals_as_stop() {
        let turn = fold(&[InferenceEvent::text("partial")]);
        assert_eq!(turn.finish_reason, FinishReason::Stop);
        assert_eq!(turn.text, "partial");
    }

    #[test]
    fn batch_response_folds_to_same_turn_as_stream() {
        let response = InferenceResponse {
            content: vec![
                ContentBlock::Text {
                    text: "Looking up".into(),
                },
                ContentBlock::ToolCall(ToolCall {
                    id: "c1".into(),
                    name: "lookup".into(),
                    arguments: json!({"q": "rust"}),
                }),
            ],
            finish_reason: FinishReason::ToolCalls,
            usage: Usage::new(12, 4),
        };
        let from_batch = fold(&response_events(&response));
        let from_stream = fold(&[
            InferenceEvent::text("Looking "),
            InferenceEvent::text("up"),
            InferenceEvent::ToolCallStart {
                id: "c1".into(),
                name: "lookup".into(),
            },
            InferenceEvent::ToolCallDelta {
                id: "c1".into(),
                arguments_fragment: r#"{"q":"rust"}"#.into(),
            },
            InferenceEvent::ToolCallEnd {
                id: "c1".into(),
                name: None,
                arguments: None,
            },
            InferenceEvent::Finish {
                reason: FinishReason::ToolCalls,
                usage: Usage::new(12, 4),
            },
        ]);
        assert_eq!(from_batch, from_stream);
        assert_eq!(from_batch.content, response.content);
    }
}
