//! Session transcript and lifecycle state.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::types::{Message, ModelConfig, Role, ToolCall};

/// Stable identifier of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a session.
///
/// `Completed` and `Error` end a run; starting another run on the same
/// session moves it back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Completed,
    Error,
}

/// An append-only conversation owned by one caller at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    messages: Vec<Message>,
    system_prompt: Option<String>,
    model: ModelConfig,
    status: SessionStatus,
}

impl Session {
    pub fn new(model: ModelConfig) -> Self {
        Self {
            id: SessionId::new(),
            messages: Vec::new(),
            system_prompt: None,
            model,
            status: SessionStatus::Idle,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut ModelConfig {
        &mut self.model
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.system_prompt = prompt;
    }

    /// Append a user message with a single text block.
    pub fn append_user_message(&mut self, text: impl Into<String>) -> &Message {
        self.push_message(Message::user(text))
    }

    /// The most recent assistant message, if any.
    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }

    /// Drop the transcript and return to `Idle`.
    pub fn clear_history(&mut self) {
        self.messages.clear();
        self.status = SessionStatus::Idle;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last N messages.
    pub fn last_n(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Tool calls that have no matching result later in the transcript.
    ///
    /// Empty whenever the session is between runs.
    pub fn pending_tool_calls(&self) -> Vec<&ToolCall> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .flat_map(|message| message.tool_results_iter())
            .map(|result| result.tool_call_id.as_str())
            .collect();
        self.messages
            .iter()
            .flat_map(|message| message.tool_calls())
            .filter(|call| !answered.contains(call.id.as_str()))
            .collect()
    }

    pub(crate) fn push_message(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        let last = self.messages.len() - 1;
        &self.messages[last]
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentBlock, ToolResultBlock};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn session() -> Session {
        Session::new(ModelConfig::new("test-model"))
    }

    #[test]
    fn new_session_is_idle_and_empty() {
        let session = session().with_system_prompt("be brief");
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.is_empty());
        assert_eq!(session.system_prompt(), Some("be brief"));
    }

    #[test]
    fn append_user_message_returns_appended_message() {
        let mut session = session();
        let id = session.append_user_message("hi").id;
        assert_eq!(session.len(), 1);
        assert_eq!(session.messages()[0].id, id);
        assert_eq!(session.messages()[0].text(), "hi");
    }

    #[test]
    fn last_assistant_message_skips_later_tool_messages() {
        let mut session = session();
        session.append_user_message("q");
        session.push_message(Message::assistant("first"));
        session.push_message(Message::tool_results(vec![]));
        assert_eq!(
            session.last_assistant_message().map(Message::text),
            Some("first".to_string())
        );
    }

    #[test]
    fn clear_history_resets_status() {
        let mut session = session();
        session.append_user_message("q");
        session.set_status(SessionStatus::Completed);
        session.clear_history();
        assert!(session.is_empty());
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[test]
    fn pending_tool_calls_lists_unanswered_calls() {
        let mut session = session();
        session.push_message(Message::new(
            Role::Assistant,
            vec![
                ContentBlock::ToolCall(ToolCall {
                    id: "a".into(),
                    name: "t".into(),
                    arguments: json!({}),
                }),
                ContentBlock::ToolCall(ToolCall {
                    id: "b".into(),
                    name: "t".into(),
                    arguments: json!({}),
                }),
            ],
        ));
        session.push_message(Message::tool_results(vec![ToolResultBlock::success(
            "a", "ok",
        )]));
        let pending: Vec<_> = session
            .pending_tool_calls()
            .into_iter()
            .map(|c| c.id.clone())
            .collect();
        assert_eq!(pending, vec!["b".to_string()]);
    }
}
