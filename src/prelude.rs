//! Convenience re-exports for common use.

pub use crate::config::StepwiseConfig;
pub use crate::error::{Result, StepwiseError};
pub use crate::orchestrator::{
    AgentEvent, AgentEventSink, Orchestrator, OrchestratorConfig, RunOutcome, StepTransport,
};
pub use crate::provider::{InferenceProvider, InferenceRequest, InferenceResponse};
pub use crate::session::{Session, SessionStatus};
pub use crate::tools::{
    AgentTool, Tool, ToolArguments, ToolExecutionContext, ToolOutput, ToolParameters,
    ToolRegistry,
};
pub use crate::types::{
    ContentBlock, FinishReason, InferenceEvent, Message, ModelConfig, Role, ToolCall,
    ToolResultBlock, Usage,
};
