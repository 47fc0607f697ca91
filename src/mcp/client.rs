//! MCP client for connecting to MCP servers.

use async_trait::async_trait;
use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, Content, JsonObject, ProtocolVersion,
        ResourceContents,
    },
    service::{ClientInitializeError, ServiceError},
};
use serde_json::Value;
use tracing::{debug, warn};

use super::host::{RemoteCallResult, RemoteToolHost, RemoteToolSchema};
use super::transport::{MCPRunningService, MCPTransport};
use crate::error::StepwiseError;

const DEFAULT_HOST_LABEL: &str = "mcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MCPConnectionState {
    Disconnected,
    Initialized,
    Closed,
}

/// Client for a Model Context Protocol server.
pub struct MCPClient {
    label: String,
    transport: Option<Box<dyn MCPTransport>>,
    session: Option<MCPRunningService>,
    state: MCPConnectionState,
}

impl MCPClient {
    pub fn new(transport: Box<dyn MCPTransport>) -> Self {
        Self {
            label: DEFAULT_HOST_LABEL.to_string(),
            transport: Some(transport),
            session: None,
            state: MCPConnectionState::Disconnected,
        }
    }

    /// Wrap a session that has already completed the handshake.
    ///
    /// Without a transport the client cannot reconnect once the session dies.
    pub fn from_running_service(session: MCPRunningService) -> Self {
        Self {
            label: DEFAULT_HOST_LABEL.to_string(),
            transport: None,
            session: Some(session),
            state: MCPConnectionState::Disconnected,
        }
    }

    /// Name used in errors and logs.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn connection_state(&self) -> MCPConnectionState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == MCPConnectionState::Initialized
    }

    /// Establish (or adopt) a session.
    pub async fn initialize(&mut self) -> Result<(), StepwiseError> {
        if let Some(session) = self.session.as_ref() {
            if !session.is_closed() {
                self.state = MCPConnectionState::Initialized;
                return Ok(());
            }
            self.session = None;
            if self.transport.is_none() {
                self.state = MCPConnectionState::Closed;
                return Err(StepwiseError::Stream(format!(
                    "{}: MCP session is closed",
                    self.label
                )));
            }
            self.state = MCPConnectionState::Disconnected;
        }

        let session = self.connect_with_protocol_fallback().await?;
        self.session = Some(session);
        self.state = MCPConnectionState::Initialized;
        debug!(host = %self.label, "MCP session initialized");
        Ok(())
    }

    pub async fn list_remote_tools(&mut self) -> Result<Vec<RemoteToolSchema>, StepwiseError> {
        self.ensure_initialized()?;

        let tools = match self.list_tools_from_active_session().await {
            Ok(tools) => tools,
            Err(error) if should_reconnect_after_service_error(&error) => {
                warn!(host = %self.label, %error, "MCP session lost during tools/list; reconnecting");
                self.reset_for_reconnect()?;
                self.initialize().await?;
                self.list_tools_from_active_session()
                    .await
                    .map_err(|retry| map_service_error(&self.label, "list_tools", retry))?
            }
            Err(error) => return Err(map_service_error(&self.label, "list_tools", error)),
        };

        Ok(tools.into_iter().map(map_tool_schema).collect())
    }

    pub async fn call_remote_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<RemoteCallResult, StepwiseError> {
        self.ensure_initialized()?;
        let arguments = coerce_tool_arguments(arguments)?;

        let result = match self
            .call_tool_from_active_session(name, arguments.clone())
            .await
        {
            Ok(result) => result,
            Err(error) if should_reconnect_after_service_error(&error) => {
                warn!(host = %self.label, tool = name, %error, "MCP session lost during tools/call; reconnecting");
                self.reset_for_reconnect()?;
                self.initialize().await?;
                self.call_tool_from_active_session(name, arguments)
                    .await
                    .map_err(|retry| map_service_error(&self.label, "call_tool", retry))?
            }
            Err(error) => return Err(map_service_error(&self.label, "call_tool", error)),
        };

        Ok(map_call_result(result))
    }

    /// Close the active session. A client with a transport may reconnect later.
    pub async fn shutdown(&mut self) -> Result<(), StepwiseError> {
        self.state = if self.transport.is_some() {
            MCPConnectionState::Disconnected
        } else {
            MCPConnectionState::Closed
        };
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        session
            .cancel()
            .await
            .map(|reason| debug!(host = %self.label, ?reason, "MCP session closed"))
            .map_err(|error| StepwiseError::remote(&self.label, format!("shutdown failed: {error}")))
    }

    fn ensure_initialized(&self) -> Result<(), StepwiseError> {
        match self.state {
            MCPConnectionState::Initialized => Ok(()),
            MCPConnectionState::Closed => Err(StepwiseError::Stream(format!(
                "{}: MCP session is closed",
                self.label
            ))),
            MCPConnectionState::Disconnected => Err(StepwiseError::InvalidState(format!(
                "{}: MCP client must be connected first",
                self.label
            ))),
        }
    }

    async fn connect_with_protocol_fallback(&mut self) -> Result<MCPRunningService, StepwiseError> {
        let label = self.label.clone();
        let transport = self.transport.as_mut().ok_or_else(|| {
            StepwiseError::Configuration(format!("{label}: no MCP transport to connect with"))
        })?;

        let latest = rmcp::model::ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            ..Default::default()
        };
        match transport.connect(latest).await {
            Ok(session) => return Ok(session),
            Err(error) if should_retry_protocol_fallback(&error) => {
                debug!(host = %label, %error, "retrying MCP initialize with legacy protocol");
            }
            Err(error) => return Err(map_client_initialize_error(&label, error)),
        }

        let fallback = rmcp::model::ClientInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            ..Default::default()
        };
        transport
            .connect(fallback)
            .await
            .map_err(|error| map_client_initialize_error(&label, error))
    }

    async fn list_tools_from_active_session(
        &mut self,
    ) -> Result<Vec<rmcp::model::Tool>, ServiceError> {
        let session = self.session.as_mut().ok_or(ServiceError::TransportClosed)?;

        match session.list_all_tools().await {
            Ok(tools) => Ok(tools),
            Err(ServiceError::UnexpectedResponse) => {
                session.list_tools(None).await.map(|page| page.tools)
            }
            Err(error) => Err(error),
        }
    }

    async fn call_tool_from_active_session(
        &mut self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, ServiceError> {
        let session = self.session.as_mut().ok_or(ServiceError::TransportClosed)?;

        session
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await
    }

    fn reset_for_reconnect(&mut self) -> Result<(), StepwiseError> {
        if self.transport.is_none() {
            self.state = MCPConnectionState::Closed;
            return Err(StepwiseError::Stream(format!(
                "{}: MCP session is closed",
                self.label
            )));
        }

        self.session = None;
        self.state = MCPConnectionState::Disconnected;
        Ok(())
    }
}

#[async_trait]
impl RemoteToolHost for MCPClient {
    async fn connect(&mut self) -> Result<(), StepwiseError> {
        self.initialize().await
    }

    async fn list_tools(&mut self) -> Result<Vec<RemoteToolSchema>, StepwiseError> {
        self.list_remote_tools().await
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<RemoteCallResult, StepwiseError> {
        self.call_remote_tool(name, arguments).await
    }

    async fn disconnect(&mut self) -> Result<(), StepwiseError> {
        self.shutdown().await
    }
}

fn should_reconnect_after_service_error(error: &ServiceError) -> bool {
    matches!(
        error,
        ServiceError::TransportClosed | ServiceError::TransportSend(_) | ServiceError::Cancelled { .. }
    )
}

fn should_retry_protocol_fallback(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::JsonRpcError(error) => {
            let message = error.message.to_ascii_lowercase();
            message.contains("protocol") && message.contains("version")
        }
        _ => false,
    }
}

fn map_tool_schema(tool: rmcp::model::Tool) -> RemoteToolSchema {
    RemoteToolSchema {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: Value::Object((*tool.input_schema).clone()),
    }
}

fn coerce_tool_arguments(value: Value) -> Result<Option<JsonObject>, StepwiseError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: Value = serde_json::from_str(trimmed).map_err(|e| {
                StepwiseError::InvalidArgument(format!("MCP tool arguments must be valid JSON: {e}"))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(StepwiseError::InvalidArgument(format!(
            "MCP tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Structured content wins over text; raw content blocks are the last resort.
fn map_call_result(result: CallToolResult) -> RemoteCallResult {
    let is_error = result.is_error.unwrap_or(false);
    let text = extract_text_content(&result.content);
    let output = match (&result.structured_content, &text) {
        (Some(structured), _) => structured.to_string(),
        (None, Some(text)) => text.clone(),
        (None, None) if is_error => "MCP tool returned an error result".to_string(),
        (None, None) => {
            let blocks: Vec<Value> = result
                .content
                .iter()
                .filter_map(|item| serde_json::to_value(item).ok())
                .collect();
            if blocks.is_empty() {
                String::new()
            } else {
                Value::Array(blocks).to_string()
            }
        }
    };

    RemoteCallResult {
        output,
        is_error,
        structured: result.structured_content,
    }
}

fn map_client_initialize_error(host: &str, error: ClientInitializeError) -> StepwiseError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            StepwiseError::Stream(format!("{host}: MCP initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => StepwiseError::Stream(
            format!("{host}: MCP initialize transport error ({context}): {error}"),
        ),
        ClientInitializeError::JsonRpcError(error) => StepwiseError::remote(
            host,
            format!(
                "MCP initialize JSON-RPC error {}: {}",
                error.code.0, error.message
            ),
        ),
        ClientInitializeError::Cancelled => {
            StepwiseError::Stream(format!("{host}: MCP initialize cancelled"))
        }
        other => StepwiseError::remote(host, format!("MCP initialize error: {other}")),
    }
}

fn map_service_error(host: &str, context: &str, error: ServiceError) -> StepwiseError {
    match error {
        ServiceError::McpError(error) => StepwiseError::remote(
            host,
            format!("{context}: MCP error {}: {}", error.code.0, error.message),
        ),
        ServiceError::TransportSend(error) => {
            StepwiseError::Stream(format!("{host}: {context}: MCP transport send failed: {error}"))
        }
        ServiceError::TransportClosed => {
            StepwiseError::Stream(format!("{host}: {context}: MCP transport closed"))
        }
        ServiceError::UnexpectedResponse => {
            StepwiseError::remote(host, format!("{context}: unexpected MCP response"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            StepwiseError::Stream(format!("{host}: {context}: MCP request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => StepwiseError::Timeout(timeout.as_millis() as u64),
        other => StepwiseError::remote(host, format!("{context}: MCP service error: {other}")),
    }
}
