//! Shared test helpers: a scripted provider and a few canned tools.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use stepwise::error::StepwiseError;
use stepwise::provider::{
    response_events, InferenceProvider, InferenceRequest, InferenceResponse, TurnAccumulator,
};
use stepwise::tools::{AgentTool, Tool, ToolOutput, ToolParameters};
use stepwise::types::*;

/// One scripted turn.
pub enum Turn {
    Respond(InferenceResponse),
    Events(Vec<InferenceEvent>),
    Fail(String),
}

/// A provider that plays back queued turns and records every request.
#[derive(Default)]
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Turn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_turn(&self, request: &InferenceRequest) -> Result<Turn, StepwiseError> {
        self.requests.lock().unwrap().push(request.clone());
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| StepwiseError::Inference("script exhausted".into()))
    }
}

#[async_trait]
impl InferenceProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, StepwiseError> {
        match self.next_turn(request)? {
            Turn::Respond(response) => Ok(response),
            Turn::Events(events) => {
                let mut acc = TurnAccumulator::new();
                for event in &events {
                    acc.apply(event)?;
                }
                let turn = acc.finish();
                Ok(InferenceResponse {
                    content: turn.content,
                    finish_reason: turn.finish_reason,
                    usage: turn.usage,
                })
            }
            Turn::Fail(message) => Err(StepwiseError::Inference(message)),
        }
    }

    async fn stream(
        &self,
        request: &InferenceRequest,
    ) -> Result<BoxStream<'static, Result<InferenceEvent, StepwiseError>>, StepwiseError> {
        let events = match self.next_turn(request)? {
            Turn::Respond(response) => response_events(&response),
            Turn::Events(events) => events,
            Turn::Fail(message) => return Err(StepwiseError::Inference(message)),
        };
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}

pub fn text_turn(text: &str) -> Turn {
    Turn::Respond(InferenceResponse {
        content: vec![ContentBlock::Text { text: text.into() }],
        finish_reason: FinishReason::Stop,
        usage: Usage::new(10, 5),
    })
}

pub fn tool_turn(calls: &[(&str, &str, Value)]) -> Turn {
    Turn::Respond(InferenceResponse {
        content: calls
            .iter()
            .map(|(id, name, arguments)| {
                ContentBlock::ToolCall(ToolCall {
                    id: (*id).into(),
                    name: (*name).into(),
                    arguments: arguments.clone(),
                })
            })
            .collect(),
        finish_reason: FinishReason::ToolCalls,
        usage: Usage::new(10, 3),
    })
}

pub fn model() -> ModelConfig {
    ModelConfig::new("test-model")
}

/// Echoes `text` back.
pub fn echo_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "echo",
        "Echo the input",
        ToolParameters::object()
            .string("text", "Text to echo", true)
            .build(),
        |args, _ctx| async move { Ok(ToolOutput::text(args.get_str("text")?)) },
    ))
}

/// Always fails with `boom`.
pub fn boom_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "explode",
        "Always fails",
        ToolParameters::empty(),
        |_args, _ctx| async move {
            Err(StepwiseError::ToolExecution {
                tool_name: "explode".into(),
                message: "boom".into(),
            })
        },
    ))
}

/// Sleeps `ms`, records `label` once done, and answers with it.
pub fn sleepy_tool(finished: Arc<Mutex<Vec<String>>>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "sleep",
        "Sleep then answer",
        ToolParameters::object()
            .integer("ms", "Delay", true)
            .string("label", "Answer", true)
            .build(),
        move |args, _ctx| {
            let finished = Arc::clone(&finished);
            async move {
                let ms = args.get_i64("ms")? as u64;
                let label = args.get_str("label")?.to_string();
                tokio::time::sleep(Duration::from_millis(ms)).await;
                finished.lock().unwrap().push(label.clone());
                Ok(ToolOutput::text(label))
            }
        },
    ))
}
