//! Bridge remote tools into the local tool system.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::host::{RemoteToolHost, RemoteToolSchema};
use crate::error::StepwiseError;
use crate::tools::{Tool, ToolArguments, ToolExecutionContext, ToolOutput, ToolParameters};

type SharedHost = Arc<Mutex<Box<dyn RemoteToolHost>>>;

/// Separator between a host name and the tool name it exposes.
pub const NAMESPACE_SEPARATOR: &str = "__";

pub fn namespaced_name(host: &str, tool: &str) -> String {
    format!("{host}{NAMESPACE_SEPARATOR}{tool}")
}

/// A remote tool that looks like any local one to the registry.
///
/// Invocations go through the owning host; any failure there becomes an
/// error result rather than an `Err`.
pub struct RemoteTool {
    name: String,
    remote_name: String,
    description: String,
    parameters: ToolParameters,
    source: String,
    host: SharedHost,
}

impl RemoteTool {
    fn new(name: String, source: &str, schema: RemoteToolSchema, host: SharedHost) -> Self {
        Self {
            name,
            description: schema.description.unwrap_or_default(),
            parameters: ToolParameters::from_schema(schema.input_schema),
            remote_name: schema.name,
            source: source.to_string(),
            host,
        }
    }

    /// Name the host knows this tool by.
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<ToolOutput, StepwiseError> {
        let mut host = self.host.lock().await;
        match host.call_tool(&self.remote_name, args.raw().clone()).await {
            Ok(result) if result.is_error => Ok(ToolOutput::error(result.output)),
            Ok(result) => {
                let output = ToolOutput::text(result.output);
                Ok(match result.structured {
                    Some(structured) => output.with_metadata(structured),
                    None => output,
                })
            }
            Err(error) => {
                warn!(
                    source = %self.source,
                    tool = %self.remote_name,
                    call_id = %ctx.tool_call_id,
                    %error,
                    "remote tool call failed"
                );
                Ok(ToolOutput::error(error.to_string()))
            }
        }
    }
}

/// One named remote host and the tools it offers.
pub struct RemoteToolSource {
    name: String,
    host: SharedHost,
    connected: bool,
}

impl RemoteToolSource {
    pub fn new(name: impl Into<String>, host: Box<dyn RemoteToolHost>) -> Self {
        Self {
            name: name.into(),
            host: Arc::new(Mutex::new(host)),
            connected: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub async fn connect(&mut self) -> Result<(), StepwiseError> {
        self.host.lock().await.connect().await?;
        self.connected = true;
        debug!(source = %self.name, "remote tool source connected");
        Ok(())
    }

    /// The host's tools under their own names.
    pub async fn list_tools(&self) -> Result<Vec<Arc<dyn Tool>>, StepwiseError> {
        self.wrap_tools(|tool| tool.to_string()).await
    }

    /// The host's tools as `<source>__<tool>`.
    pub async fn list_namespaced_tools(&self) -> Result<Vec<Arc<dyn Tool>>, StepwiseError> {
        self.wrap_tools(|tool| namespaced_name(&self.name, tool))
            .await
    }

    async fn wrap_tools(
        &self,
        expose_as: impl Fn(&str) -> String,
    ) -> Result<Vec<Arc<dyn Tool>>, StepwiseError> {
        if !self.connected {
            return Err(StepwiseError::InvalidState(format!(
                "remote tool source '{}' is not connected",
                self.name
            )));
        }
        let schemas = self.host.lock().await.list_tools().await?;
        Ok(schemas
            .into_iter()
            .map(|schema| {
                let exposed = expose_as(&schema.name);
                Arc::new(RemoteTool::new(exposed, &self.name, schema, Arc::clone(&self.host)))
                    as Arc<dyn Tool>
            })
            .collect())
    }

    pub async fn disconnect(&mut self) -> Result<(), StepwiseError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.host.lock().await.disconnect().await
    }
}

impl std::fmt::Debug for RemoteToolSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteToolSource")
            .field("name", &self.name)
            .field("connected", &self.connected)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{json, Value};

    use super::*;
    use crate::mcp::host::RemoteCallResult;

    /// In-memory host with canned tools and answers.
    #[derive(Default)]
    pub struct FakeHost {
        pub tools: Vec<RemoteToolSchema>,
        pub answers: HashMap<String, Result<RemoteCallResult, String>>,
        pub fail_connect: bool,
        pub disconnects: Arc<AtomicUsize>,
    }

    impl FakeHost {
        pub fn with_tool(mut self, name: &str, answer: Result<RemoteCallResult, String>) -> Self {
            self.tools.push(RemoteToolSchema {
                name: name.to_string(),
                description: Some(format!("{name} tool")),
                input_schema: json!({"type": "object", "properties": {}}),
            });
            self.answers.insert(name.to_string(), answer);
            self
        }
    }

    #[async_trait]
    impl RemoteToolHost for FakeHost {
        async fn connect(&mut self) -> Result<(), StepwiseError> {
            if self.fail_connect {
                return Err(StepwiseError::remote("fake", "connection refused"));
            }
            Ok(())
        }

        async fn list_tools(&mut self) -> Result<Vec<RemoteToolSchema>, StepwiseError> {
            Ok(self.tools.clone())
        }

        async fn call_tool(
            &mut self,
            name: &str,
            _arguments: Value,
        ) -> Result<RemoteCallResult, StepwiseError> {
            match self.answers.get(name) {
                Some(Ok(result)) => Ok(result.clone()),
                Some(Err(message)) => Err(StepwiseError::remote("fake", message.clone())),
                None => Err(StepwiseError::remote("fake", format!("unknown tool {name}"))),
            }
        }

        async fn disconnect(&mut self) -> Result<(), StepwiseError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
