//! The step machine shared by batch and streaming runs.

use std::collections::HashSet;

use futures::StreamExt;
use tracing::debug;

use super::events::{AgentEvent, AgentEventEmitter};
use super::{Orchestrator, RunOutcome, StepTransport};
use crate::error::StepwiseError;
use crate::provider::{response_events, AssembledTurn, InferenceRequest, TurnAccumulator};
use crate::session::{Session, SessionStatus};
use crate::tools::{ExecutionPolicy, ExecutionScope};
use crate::types::{FinishReason, InferenceEvent, Message, Role, Usage};
use crate::util::timeout::with_cancellation;

impl Orchestrator {
    /// Run to completion, keeping the session status in step with the result.
    pub(super) async fn execute(
        &self,
        session: &mut Session,
        transport: StepTransport,
        emitter: &AgentEventEmitter,
    ) -> Result<RunOutcome, StepwiseError> {
        session.set_status(SessionStatus::Running);
        emitter.emit(AgentEvent::RunStarted {
            session_id: session.id(),
        });
        debug!(session_id = %session.id(), ?transport, "run started");

        let mut steps = 0;
        let result = self.run_steps(session, transport, emitter, &mut steps).await;
        match &result {
            Ok(outcome) => {
                session.set_status(SessionStatus::Completed);
                debug!(session_id = %session.id(), steps, "run completed");
                emitter.emit(AgentEvent::RunFinished {
                    status: SessionStatus::Completed,
                    steps: outcome.steps,
                });
            }
            Err(err) => {
                session.set_status(SessionStatus::Error);
                tracing::warn!(session_id = %session.id(), steps, error = %err, "run failed");
                emitter.emit(AgentEvent::Error {
                    message: err.to_string(),
                });
                emitter.emit(AgentEvent::RunFinished {
                    status: SessionStatus::Error,
                    steps,
                });
            }
        }
        result
    }

    async fn run_steps(
        &self,
        session: &mut Session,
        transport: StepTransport,
        emitter: &AgentEventEmitter,
        steps: &mut usize,
    ) -> Result<RunOutcome, StepwiseError> {
        let cancel = self.config.cancel.as_ref();
        let max_steps = self.config.max_steps;
        let mut usage = Usage::default();

        for step in 1..=max_steps {
            if cancel.is_some_and(|token| token.is_cancelled()) {
                return Err(StepwiseError::Cancelled);
            }
            *steps = step;
            emitter.emit(AgentEvent::StepStart { step });
            debug!(session_id = %session.id(), step, "step started");

            let request = InferenceRequest::from_session(session, self.registry.to_tool_definitions());
            let AssembledTurn {
                content,
                tool_calls,
                text,
                finish_reason,
                usage: turn_usage,
            } = with_cancellation(cancel, self.infer(&request, transport, emitter)).await?;
            usage.merge(&turn_usage);

            let message_id = {
                let message = session.push_message(Message::new(Role::Assistant, content));
                emitter.emit(AgentEvent::MessageEnd {
                    message: message.clone(),
                });
                message.id
            };

            if tool_calls.is_empty() {
                emitter.emit(AgentEvent::StepEnd {
                    step,
                    tool_calls: 0,
                });
                return Ok(RunOutcome {
                    final_text: text,
                    steps: step,
                    usage,
                    finish_reason,
                });
            }

            debug!(
                session_id = %session.id(),
                step,
                tool_calls = tool_calls.len(),
                "executing tool calls"
            );
            let scope = ExecutionScope {
                session_id: session.id(),
                message_id,
                cancel: cancel.cloned(),
            };
            let results = self
                .executor
                .execute_batch(&self.registry, &tool_calls, &scope, ExecutionPolicy::Parallel)
                .await;
            for result in &results {
                emitter.emit(AgentEvent::ToolResult {
                    result: result.clone(),
                });
            }
            let tool_message = session.push_message(Message::tool_results(results));
            emitter.emit(AgentEvent::MessageEnd {
                message: tool_message.clone(),
            });
            emitter.emit(AgentEvent::StepEnd {
                step,
                tool_calls: tool_calls.len(),
            });
        }

        Err(StepwiseError::MaxStepsExceeded { max_steps })
    }

    /// Obtain one assistant turn through the chosen transport.
    async fn infer(
        &self,
        request: &InferenceRequest,
        transport: StepTransport,
        emitter: &AgentEventEmitter,
    ) -> Result<AssembledTurn, StepwiseError> {
        let mut acc = TurnAccumulator::new();
        let mut ended = HashSet::new();
        emitter.emit(AgentEvent::MessageStart {
            role: Role::Assistant,
        });

        match transport {
            StepTransport::Batch => {
                let response = self.provider.generate(request).await?;
                for event in response_events(&response) {
                    fold_event(&mut acc, event, emitter, &mut ended)?;
                }
            }
            StepTransport::Streaming => {
                let mut events = self.provider.stream(request).await?;
                while let Some(event) = events.next().await {
                    fold_event(&mut acc, event?, emitter, &mut ended)?;
                    if acc.is_finished() {
                        break;
                    }
                }
            }
        }

        let turn = acc.finish();
        if turn.finish_reason == FinishReason::Error {
            return Err(StepwiseError::Inference(format!(
                "{} finished the turn with an error",
                self.provider.provider_name()
            )));
        }
        // Calls the provider never explicitly ended are sealed at finish.
        for call in &turn.tool_calls {
            if !ended.contains(&call.id) {
                emitter.emit(AgentEvent::ToolCallEnd { call: call.clone() });
            }
        }
        Ok(turn)
    }
}

fn fold_event(
    acc: &mut TurnAccumulator,
    event: InferenceEvent,
    emitter: &AgentEventEmitter,
    ended: &mut HashSet<String>,
) -> Result<(), StepwiseError> {
    let completed = acc.apply(&event)?;
    match event {
        InferenceEvent::TextDelta { text } if !text.is_empty() => {
            emitter.emit(AgentEvent::TextDelta { text });
        }
        InferenceEvent::ToolCallStart { id, name } => {
            emitter.emit(AgentEvent::ToolCallStart { id, name });
        }
        InferenceEvent::ToolCallDelta {
            id,
            arguments_fragment,
        } => {
            emitter.emit(AgentEvent::ToolCallDelta {
                id,
                arguments_fragment,
            });
        }
        _ => {}
    }
    if let Some(call) = completed {
        ended.insert(call.id.clone());
        emitter.emit(AgentEvent::ToolCallEnd { call });
    }
    Ok(())
}
