//! Ways of reaching an MCP server.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rmcp::model::ClientInfo;
use rmcp::service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceExt};
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use tokio::process::Command;

use crate::config::RemoteHostConfig;

pub type DynClientService = Box<dyn DynService<RoleClient>>;
pub type MCPRunningService = RunningService<RoleClient, DynClientService>;

/// Opens a fresh initialized session each time it is asked.
#[async_trait]
pub trait MCPTransport: Send {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError>;
}

/// Spawns a local server and talks to it over stdin/stdout.
#[derive(Debug, Clone)]
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl StdioTransport {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

#[async_trait]
impl MCPTransport for StdioTransport {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError> {
        let mut command = Command::new(&self.command);
        command.args(&self.args).envs(&self.env);
        let transport = TokioChildProcess::new(command).map_err(|error| {
            ClientInitializeError::transport::<TokioChildProcess>(error, "spawn stdio transport")
        })?;

        client_info.into_dyn().serve(transport).await
    }
}

/// Remote server reached over streamable HTTP.
#[derive(Debug, Clone)]
pub struct StreamableHttpTransport {
    url: String,
}

impl StreamableHttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MCPTransport for StreamableHttpTransport {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError> {
        let transport = StreamableHttpClientTransport::from_uri(self.url.clone());
        client_info.into_dyn().serve(transport).await
    }
}

/// Build the transport a configured host entry describes.
pub fn transport_from_config(config: &RemoteHostConfig) -> Box<dyn MCPTransport> {
    match config {
        RemoteHostConfig::Stdio { command, args, env } => {
            let mut transport = StdioTransport::new(command.clone(), args.clone());
            for (key, value) in env {
                transport = transport.with_env(key.clone(), value.clone());
            }
            Box::new(transport)
        }
        RemoteHostConfig::Http { url } => Box::new(StreamableHttpTransport::new(url.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_constructor_keeps_command_args_and_env() {
        let transport = StdioTransport::new("node", vec!["server.js".into(), "--debug".into()])
            .with_env("TOKEN", "abc");
        assert_eq!(transport.command(), "node");
        assert_eq!(
            transport.args(),
            &["server.js".to_string(), "--debug".to_string()]
        );
        assert_eq!(transport.env().get("TOKEN").map(String::as_str), Some("abc"));
    }

    #[tokio::test]
    async fn stdio_connect_reports_spawn_failure() {
        let mut transport = StdioTransport::new("/definitely/not/a/real/binary", Vec::new());
        let err = match transport.connect(ClientInfo::default()).await {
            Ok(_) => panic!("spawning a missing binary should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, ClientInitializeError::TransportError { .. }));
    }
}
