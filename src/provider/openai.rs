//! OpenAI Chat Completions provider.
//!
//! Works against any endpoint speaking the chat-completions protocol; point
//! `base_url` elsewhere for compatible servers.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::StepwiseError;
use crate::types::{ContentBlock, FinishReason, InferenceEvent, Message, Role, ToolCall, Usage};
use crate::util::retry::RetryPolicy;

use super::http::{bearer_headers, shared_client, status_to_error, SseDecoder, SseFrame};
use super::stream::parse_arguments;
use super::{InferenceProvider, InferenceRequest, InferenceResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the policy used for rate-limited and 5xx responses.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build from loaded configuration. Fails when no API key is configured.
    pub fn from_config(config: &crate::config::StepwiseConfig) -> Result<Self, StepwiseError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            StepwiseError::Configuration("Missing OPENAI_API_KEY".to_string())
        })?;
        Ok(Self::new(api_key, config.base_url.clone()))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request_body(&self, request: &InferenceRequest, stream: bool) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        for message in &request.messages {
            messages.extend(message_to_openai(message));
        }

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": stream,
        });
        let Some(obj) = body.as_object_mut() else {
            return body;
        };

        if stream {
            obj.insert("stream_options".into(), json!({"include_usage": true}));
        }
        if let Some(max) = request.max_tokens {
            obj.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = request.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            obj.insert("tools".into(), tools.into());
        }
        body
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, StepwiseError> {
        self.retry
            .run("openai chat completion", || async {
                let resp = shared_client()
                    .post(self.endpoint())
                    .headers(bearer_headers(&self.api_key))
                    .json(body)
                    .send()
                    .await?;
                let status = resp.status().as_u16();
                if !resp.status().is_success() {
                    let body_text = resp.text().await.unwrap_or_default();
                    return Err(status_to_error(status, &body_text));
                }
                Ok(resp)
            })
            .await
    }
}

#[async_trait]
impl InferenceProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse, StepwiseError> {
        debug!(model = %request.model, "OpenAI generate");
        let body = self.build_request_body(request, false);
        let data: ChatResponse = self.post(&body).await?.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| StepwiseError::Inference("No choices in OpenAI response".into()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(ContentBlock::Text { text });
        }
        for call in choice.message.tool_calls.unwrap_or_default() {
            content.push(ContentBlock::ToolCall(ToolCall {
                id: call.id,
                arguments: parse_arguments(&call.function.arguments),
                name: call.function.name,
            }));
        }

        Ok(InferenceResponse {
            content,
            finish_reason: parse_finish_reason(choice.finish_reason.as_deref()),
            usage: data.usage.map(Usage::from).unwrap_or_default(),
        })
    }

    async fn stream(
        &self,
        request: &InferenceRequest,
    ) -> Result<BoxStream<'static, Result<InferenceEvent, StepwiseError>>, StepwiseError> {
        debug!(model = %request.model, "OpenAI stream");
        let body = self.build_request_body(request, true);
        let byte_stream = self.post(&body).await?.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            let mut mapper = ChunkMapper::default();
            futures::pin_mut!(byte_stream);

            'body: while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(StepwiseError::Network(e));
                        return;
                    }
                };
                for frame in decoder.push(&chunk) {
                    match frame {
                        SseFrame::Done => break 'body,
                        SseFrame::Data(data) => match serde_json::from_str::<StreamChunk>(&data) {
                            Ok(parsed) => {
                                for event in mapper.map(parsed) {
                                    yield Ok(event);
                                }
                            }
                            Err(e) => debug!(error = %e, "skipping unparseable stream chunk"),
                        },
                    }
                }
            }
            if let Some(SseFrame::Data(data)) = decoder.finish() {
                if let Ok(parsed) = serde_json::from_str::<StreamChunk>(&data) {
                    for event in mapper.map(parsed) {
                        yield Ok(event);
                    }
                }
            }
            for event in mapper.finish() {
                yield Ok(event);
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Turns chat-completion chunks into inference events.
///
/// Tool-call fragments are keyed by `index`; only the first fragment of a
/// call carries its id and name. `Finish` is held back until the body ends
/// so the trailing usage chunk can be attached.
#[derive(Debug, Default)]
struct ChunkMapper {
    ids_by_index: HashMap<u32, (String, String)>,
    order: Vec<u32>,
    finish_reason: Option<FinishReason>,
    usage: Usage,
}

impl ChunkMapper {
    fn map(&mut self, chunk: StreamChunk) -> Vec<InferenceEvent> {
        let mut events = Vec::new();
        if let Some(usage) = chunk.usage {
            self.usage = usage.into();
        }
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                events.push(InferenceEvent::TextDelta { text });
            }
            for fragment in choice.delta.tool_calls.unwrap_or_default() {
                let function = fragment.function.unwrap_or_default();
                if !self.ids_by_index.contains_key(&fragment.index) {
                    let id = fragment
                        .id
                        .clone()
                        .unwrap_or_else(|| format!("call_{}", fragment.index));
                    let name = function.name.clone().unwrap_or_default();
                    events.push(InferenceEvent::ToolCallStart {
                        id: id.clone(),
                        name: name.clone(),
                    });
                    self.ids_by_index.insert(fragment.index, (id, name));
                    self.order.push(fragment.index);
                }
                if let Some(arguments) = function.arguments.filter(|a| !a.is_empty()) {
                    if let Some((id, _)) = self.ids_by_index.get(&fragment.index) {
                        events.push(InferenceEvent::ToolCallDelta {
                            id: id.clone(),
                            arguments_fragment: arguments,
                        });
                    }
                }
            }
            if let Some(reason) = choice.finish_reason.as_deref() {
                self.finish_reason = Some(parse_finish_reason(Some(reason)));
            }
        }
        events
    }

    fn finish(&mut self) -> Vec<InferenceEvent> {
        let mut events: Vec<InferenceEvent> = self
            .order
            .drain(..)
            .filter_map(|index| self.ids_by_index.remove(&index))
            .map(|(id, name)| InferenceEvent::ToolCallEnd {
                id,
                name: Some(name),
                arguments: None,
            })
            .collect();
        events.push(InferenceEvent::Finish {
            reason: self.finish_reason.unwrap_or(FinishReason::Stop),
            usage: self.usage,
        });
        events
    }
}

fn parse_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("length") => FinishReason::MaxTokens,
        Some("tool_calls") | Some("function_call") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::Error,
        _ => FinishReason::Stop,
    }
}

/// A transcript message can expand into several wire messages: each tool
/// result becomes its own `tool` message.
fn message_to_openai(message: &Message) -> Vec<Value> {
    match message.role {
        Role::User => vec![json!({"role": "user", "content": message.text()})],
        Role::Assistant => {
            let text = message.text();
            let content = if text.is_empty() { Value::Null } else { Value::String(text) };
            let calls: Vec<Value> = message
                .tool_calls()
                .into_iter()
                .map(|call| {
                    let arguments = match &call.arguments {
                        Value::String(raw) => raw.clone(),
                        other => other.to_string(),
                    };
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {"name": call.name, "arguments": arguments},
                    })
                })
                .collect();
            if calls.is_empty() {
                vec![json!({"role": "assistant", "content": content})]
            } else {
                vec![json!({"role": "assistant", "content": content, "tool_calls": calls})]
            }
        }
        Role::Tool => message
            .tool_results_iter()
            .map(|result| {
                json!({
                    "role": "tool",
                    "tool_call_id": result.tool_call_id,
                    "content": result.content,
                })
            })
            .collect(),
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(usage: WireUsage) -> Self {
        Usage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Deserialize)]
struct StreamToolCall {
    index: u32,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Deserialize, Default)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
