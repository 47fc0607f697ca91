//! Inference provider contract and implementations.

pub mod http;
pub mod stream;

#[cfg(feature = "openai")]
pub mod openai;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::StepwiseError;
use crate::session::Session;
use crate::types::{ContentBlock, FinishReason, InferenceEvent, Message, Usage};

pub use crate::tools::ToolDefinition;
pub use stream::{response_events, AssembledTurn, TurnAccumulator};

/// Everything an inference endpoint needs for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl InferenceRequest {
    /// Snapshot a session's transcript and model settings.
    pub fn from_session(session: &Session, tools: Vec<ToolDefinition>) -> Self {
        let model = session.model();
        Self {
            model: model.model.clone(),
            messages: session.messages().to_vec(),
            system_prompt: session.system_prompt().map(str::to_string),
            tools,
            max_tokens: model.max_tokens,
            temperature: model.temperature,
        }
    }
}

/// A complete assistant turn returned in one piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub content: Vec<ContentBlock>,
    pub finish_reason: FinishReason,
    #[serde(default)]
    pub usage: Usage,
}

impl InferenceResponse {
    /// A text-only response that finished with `stop`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }
}

/// A language-model endpoint.
///
/// Implementations must supply [`generate`](Self::generate). The default
/// [`stream`](Self::stream) replays the batch response as events, so a
/// provider without native streaming still works in streaming runs.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Provider name (e.g. "openai").
    fn provider_name(&self) -> &str;

    /// Produce one assistant turn.
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse, StepwiseError>;

    /// Produce one assistant turn as incremental events.
    async fn stream(
        &self,
        request: &InferenceRequest,
    ) -> Result<BoxStream<'static, Result<InferenceEvent, StepwiseError>>, StepwiseError> {
        let response = self.generate(request).await?;
        let events = response_events(&response).into_iter().map(Ok);
        Ok(Box::pin(futures::stream::iter(events)))
    }
}
