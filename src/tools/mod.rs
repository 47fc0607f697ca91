//! Tool system: definitions, registry, and execution.

pub mod arguments;
pub mod executor;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use executor::{
    ExecutionPolicy, ExecutionScope, ExecutorConfig, PostExecuteHook, PreExecuteDecision,
    PreExecuteHook, ToolExecutor, ToolHooks,
};
pub use registry::{ToolId, ToolRegistry};
pub use tool::{AgentTool, Tool, ToolExecutionContext, ToolOutput};
pub use types::{ParameterBuilder, ToolDefinition, ToolParameters};
