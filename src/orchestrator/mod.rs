//! Agent orchestrator: alternates inference and tool execution until the
//! model answers without tool calls or the step budget runs out.
//!
//! Batch and streaming runs share one step machine. A batch response is
//! replayed as the same event sequence a streaming provider would emit, so
//! the transcript a run leaves behind does not depend on the transport.
//!
//! ```no_run
//! use std::sync::Arc;
//! use stepwise::orchestrator::Orchestrator;
//! use stepwise::provider::openai::OpenAiProvider;
//! use stepwise::session::Session;
//! use stepwise::types::ModelConfig;
//!
//! # async fn example() -> stepwise::error::Result<()> {
//! let provider = Arc::new(OpenAiProvider::new("sk-...", None));
//! let orchestrator = Orchestrator::new(provider);
//! let mut session = Session::new(ModelConfig::new("gpt-4o-mini"));
//! let outcome = orchestrator.send(&mut session, "Hello!", None).await?;
//! println!("{}", outcome.final_text);
//! # Ok(())
//! # }
//! ```

mod engine;
pub mod events;

use std::sync::Arc;

use bon::Builder;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_MAX_STEPS;
use crate::error::StepwiseError;
use crate::provider::InferenceProvider;
use crate::session::Session;
use crate::tools::{ExecutorConfig, Tool, ToolExecutor, ToolHooks, ToolId, ToolRegistry};
use crate::types::{FinishReason, Usage};

pub use events::{AgentEvent, AgentEventSink};

/// How each step obtains the assistant turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTransport {
    /// One request, one complete response.
    Batch,
    /// Incremental events, forwarded as they arrive.
    Streaming,
}

#[derive(Debug, Clone, Builder)]
pub struct OrchestratorConfig {
    #[builder(default = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,
    #[builder(default)]
    pub executor: ExecutorConfig,
    /// Checked before each step and raced against in-flight work.
    pub cancel: Option<CancellationToken>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Text of the final assistant message.
    pub final_text: String,
    pub steps: usize,
    /// Usage summed over every inference call of the run.
    pub usage: Usage,
    pub finish_reason: FinishReason,
}

pub struct Orchestrator {
    provider: Arc<dyn InferenceProvider>,
    registry: ToolRegistry,
    executor: ToolExecutor,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self::with_config(provider, OrchestratorConfig::default())
    }

    pub fn with_config(provider: Arc<dyn InferenceProvider>, config: OrchestratorConfig) -> Self {
        Self {
            provider,
            registry: ToolRegistry::new(),
            executor: ToolExecutor::new(config.executor.clone()),
            config,
        }
    }

    pub fn with_hooks(mut self, hooks: ToolHooks) -> Self {
        self.executor = self.executor.with_hooks(hooks);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.config.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) -> ToolId {
        self.registry.register(tool)
    }

    /// Run the loop on `session` using batch inference.
    ///
    /// The session must already end with the input to answer. On failure the
    /// session is left in `Error` with every tool call still paired with a
    /// result.
    pub async fn run(
        &self,
        session: &mut Session,
        on_progress: Option<AgentEventSink>,
    ) -> Result<RunOutcome, StepwiseError> {
        self.run_with(session, StepTransport::Batch, on_progress).await
    }

    /// Like [`run`](Self::run), but drives the provider's event stream.
    pub async fn run_streaming(
        &self,
        session: &mut Session,
        on_progress: Option<AgentEventSink>,
    ) -> Result<RunOutcome, StepwiseError> {
        self.run_with(session, StepTransport::Streaming, on_progress).await
    }

    pub async fn run_with(
        &self,
        session: &mut Session,
        transport: StepTransport,
        on_progress: Option<AgentEventSink>,
    ) -> Result<RunOutcome, StepwiseError> {
        let emitter = events::AgentEventEmitter::new(on_progress);
        self.execute(session, transport, &emitter).await
    }

    /// Append a user message and run in batch mode.
    pub async fn send(
        &self,
        session: &mut Session,
        text: impl Into<String>,
        on_progress: Option<AgentEventSink>,
    ) -> Result<RunOutcome, StepwiseError> {
        session.append_user_message(text);
        self.run(session, on_progress).await
    }

    /// Run in streaming mode, yielding progress as it happens.
    ///
    /// The stream always ends with [`AgentEvent::RunFinished`]; a failed run
    /// emits [`AgentEvent::Error`] just before it.
    pub fn stream<'a>(&'a self, session: &'a mut Session) -> BoxStream<'a, AgentEvent> {
        enum Next {
            Event(AgentEvent),
            Done,
        }

        Box::pin(async_stream::stream! {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let sink: AgentEventSink = Arc::new(move |event| {
                let _ = tx.send(event);
            });
            let emitter = events::AgentEventEmitter::new(Some(sink));
            let run = self.execute(session, StepTransport::Streaming, &emitter);
            tokio::pin!(run);

            loop {
                let next = tokio::select! {
                    biased;
                    Some(event) = rx.recv() => Next::Event(event),
                    _ = &mut run => Next::Done,
                };
                match next {
                    Next::Event(event) => yield event,
                    Next::Done => {
                        while let Ok(event) = rx.try_recv() {
                            yield event;
                        }
                        break;
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.provider_name())
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
