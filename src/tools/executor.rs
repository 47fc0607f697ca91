//! Runs tool calls against a registry and turns every outcome into a result.
//!
//! [`ToolExecutor::execute`] never fails: a missing tool, rejected
//! arguments, a tool error, a timeout, or cancellation all come back as a
//! [`ToolResultBlock`] with `is_error` set, so the model can see what went
//! wrong and the run can continue.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use futures::future;
use tokio_util::sync::CancellationToken;

use super::arguments::ToolArguments;
use super::registry::ToolRegistry;
use super::tool::{ToolExecutionContext, ToolOutput};
use super::validation::validate_arguments;
use crate::error::StepwiseError;
use crate::session::SessionId;
use crate::types::{MessageId, ToolCall, ToolResultBlock};
use crate::util::timeout::{with_cancellation, with_timeout};

/// How a batch of calls is scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// Start every call at once; results keep input order.
    #[default]
    Parallel,
    /// Run calls one after another in input order.
    Sequential,
}

#[derive(Debug, Clone, Default, Builder)]
pub struct ExecutorConfig {
    /// Per-call deadline. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Check arguments against the tool schema before executing.
    #[builder(default)]
    pub validate_arguments: bool,
}

/// Decision returned by a [`PreExecuteHook`].
#[derive(Debug, Clone, PartialEq)]
pub enum PreExecuteDecision {
    Continue,
    Block { reason: Option<String> },
    ReplaceArgs { args: serde_json::Value },
}

pub type PreExecuteHook = Arc<
    dyn Fn(ToolCall) -> Pin<Box<dyn Future<Output = Result<PreExecuteDecision, StepwiseError>> + Send>>
        + Send
        + Sync,
>;

pub type PostExecuteHook = Arc<
    dyn Fn(
            ToolCall,
            ToolResultBlock,
        ) -> Pin<Box<dyn Future<Output = Result<ToolResultBlock, StepwiseError>> + Send>>
        + Send
        + Sync,
>;

#[derive(Clone, Default)]
pub struct ToolHooks {
    pub pre_execute: Option<PreExecuteHook>,
    pub post_execute: Option<PostExecuteHook>,
}

impl std::fmt::Debug for ToolHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHooks")
            .field("pre_execute", &self.pre_execute.is_some())
            .field("post_execute", &self.post_execute.is_some())
            .finish()
    }
}

/// Where a batch of calls came from: shared by every call's context.
#[derive(Debug, Clone)]
pub struct ExecutionScope {
    pub session_id: SessionId,
    pub message_id: MessageId,
    pub cancel: Option<CancellationToken>,
}

impl ExecutionScope {
    pub fn context_for(&self, call: &ToolCall) -> ToolExecutionContext {
        ToolExecutionContext {
            session_id: self.session_id,
            message_id: self.message_id,
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolExecutor {
    config: ExecutorConfig,
    hooks: ToolHooks,
}

impl ToolExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            hooks: ToolHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: ToolHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute one call. Always yields a result for `call.id`.
    pub async fn execute(
        &self,
        registry: &ToolRegistry,
        call: &ToolCall,
        scope: &ExecutionScope,
    ) -> ToolResultBlock {
        let call = match self.apply_pre_execute(call).await {
            Ok(call) => call,
            Err(blocked) => return blocked,
        };
        let result = self.invoke(registry, &call, scope).await;
        if result.is_error {
            tracing::warn!(
                tool = %call.name,
                tool_call_id = %call.id,
                error = %result.content,
                "tool call failed"
            );
        }
        self.apply_post_execute(&call, result).await
    }

    /// Execute a batch of calls. Output order always equals input order.
    pub async fn execute_batch(
        &self,
        registry: &ToolRegistry,
        calls: &[ToolCall],
        scope: &ExecutionScope,
        policy: ExecutionPolicy,
    ) -> Vec<ToolResultBlock> {
        match policy {
            ExecutionPolicy::Parallel => {
                future::join_all(calls.iter().map(|call| self.execute(registry, call, scope))).await
            }
            ExecutionPolicy::Sequential => {
                let mut results = Vec::with_capacity(calls.len());
                for call in calls {
                    results.push(self.execute(registry, call, scope).await);
                }
                results
            }
        }
    }

    async fn invoke(
        &self,
        registry: &ToolRegistry,
        call: &ToolCall,
        scope: &ExecutionScope,
    ) -> ToolResultBlock {
        let tool = match registry.get_or_err(&call.name) {
            Ok(tool) => tool,
            Err(err) => return ToolResultBlock::error(&call.id, err.to_string()),
        };

        if self.config.validate_arguments {
            if let Err(reason) = validate_arguments(&call.arguments, &tool.parameters().schema) {
                return ToolResultBlock::error(
                    &call.id,
                    format!("Argument validation failed: {reason}"),
                );
            }
        }

        let args = ToolArguments::new(call.arguments.clone());
        let ctx = scope.context_for(call);
        let run = async { tool.execute(&args, &ctx).await };
        let bounded = async {
            match self.config.timeout {
                Some(limit) => with_timeout(limit, run).await,
                None => run.await,
            }
        };

        match with_cancellation(scope.cancel.as_ref(), bounded).await {
            Ok(output) => output_to_result(&call.id, output),
            Err(StepwiseError::Timeout(ms)) => {
                ToolResultBlock::error(&call.id, format!("Tool '{}' timed out after {ms}ms", call.name))
            }
            Err(StepwiseError::Cancelled) => ToolResultBlock::error(&call.id, "canceled"),
            Err(err) => ToolResultBlock::error(&call.id, err.to_string()),
        }
    }

    async fn apply_pre_execute(&self, call: &ToolCall) -> Result<ToolCall, ToolResultBlock> {
        let Some(hook) = self.hooks.pre_execute.as_ref() else {
            return Ok(call.clone());
        };
        match hook(call.clone()).await {
            Ok(PreExecuteDecision::Continue) => Ok(call.clone()),
            Ok(PreExecuteDecision::Block { reason }) => Err(ToolResultBlock::error(
                &call.id,
                reason.unwrap_or_else(|| "tool call blocked by pre_execute hook".to_string()),
            )),
            Ok(PreExecuteDecision::ReplaceArgs { args }) => Ok(ToolCall {
                arguments: args,
                ..call.clone()
            }),
            Err(err) => Err(ToolResultBlock::error(
                &call.id,
                format!("pre_execute hook failed: {err}"),
            )),
        }
    }

    async fn apply_post_execute(&self, call: &ToolCall, result: ToolResultBlock) -> ToolResultBlock {
        let Some(hook) = self.hooks.post_execute.as_ref() else {
            return result;
        };
        let original = result.content.clone();
        match hook(call.clone(), result).await {
            Ok(next) => ToolResultBlock {
                tool_call_id: call.id.clone(),
                ..next
            },
            Err(err) => ToolResultBlock::error(
                &call.id,
                format!("post_execute hook failed: {err}; original result: {original}"),
            ),
        }
    }
}

fn output_to_result(tool_call_id: &str, output: ToolOutput) -> ToolResultBlock {
    let mut result = match output.error {
        Some(message) => ToolResultBlock::error(tool_call_id, message),
        None => ToolResultBlock::success(tool_call_id, output.output),
    };
    result.metadata = output.metadata;
    result
}
