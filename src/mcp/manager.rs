//! Several remote hosts behind one namespaced tool list.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use super::bridge::RemoteToolSource;
use super::host::RemoteToolHost;
use crate::error::StepwiseError;
use crate::tools::{Tool, ToolRegistry};

/// Owns a set of named remote tool sources.
///
/// Tools are exposed as `<host>__<tool>` so equally named tools on
/// different hosts never collide.
#[derive(Debug, Default)]
pub struct RemoteToolManager {
    sources: BTreeMap<String, RemoteToolSource>,
}

impl RemoteToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for every configured host. Nothing is connected yet.
    #[cfg(feature = "mcp")]
    pub fn from_config(config: &crate::config::StepwiseConfig) -> Result<Self, StepwiseError> {
        let mut manager = Self::new();
        for (name, host) in &config.remote_hosts {
            let client = super::MCPClient::new(super::transport::transport_from_config(host))
                .with_label(name.clone());
            manager.add_host(name.clone(), Box::new(client))?;
        }
        Ok(manager)
    }

    pub fn add_host(
        &mut self,
        name: impl Into<String>,
        host: Box<dyn RemoteToolHost>,
    ) -> Result<(), StepwiseError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(StepwiseError::Configuration(
                "remote host name must not be empty".into(),
            ));
        }
        if self.sources.contains_key(&name) {
            return Err(StepwiseError::Configuration(format!(
                "Duplicate remote host '{name}'"
            )));
        }
        self.sources
            .insert(name.clone(), RemoteToolSource::new(name, host));
        Ok(())
    }

    /// Remove a host, disconnecting it first if needed.
    pub async fn remove_host(&mut self, name: &str) -> Result<bool, StepwiseError> {
        match self.sources.remove(name) {
            Some(mut source) => {
                source.disconnect().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn host_names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.sources
            .get(name)
            .is_some_and(RemoteToolSource::is_connected)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Connect every host that is not connected yet.
    ///
    /// One host failing does not stop the others; failures are returned by
    /// host name.
    pub async fn connect_all(&mut self) -> Vec<(String, StepwiseError)> {
        let mut failures = Vec::new();
        for (name, source) in &mut self.sources {
            if source.is_connected() {
                continue;
            }
            match source.connect().await {
                Ok(()) => info!(host = %name, "remote host connected"),
                Err(error) => {
                    warn!(host = %name, %error, "remote host failed to connect");
                    failures.push((name.clone(), error));
                }
            }
        }
        failures
    }

    /// Namespaced tools of every connected host, sorted by exposed name.
    pub async fn list_tools(&self) -> Result<Vec<Arc<dyn Tool>>, StepwiseError> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        let mut seen = HashSet::new();
        for source in self.sources.values().filter(|s| s.is_connected()) {
            for tool in source.list_namespaced_tools().await? {
                if !seen.insert(tool.name().to_string()) {
                    return Err(StepwiseError::InvalidState(format!(
                        "Duplicate remote tool name '{}'",
                        tool.name()
                    )));
                }
                tools.push(tool);
            }
        }
        tools.sort_by(|left, right| left.name().cmp(right.name()));
        Ok(tools)
    }

    /// Register every namespaced remote tool. Returns how many were added.
    pub async fn register_all(&self, registry: &mut ToolRegistry) -> Result<usize, StepwiseError> {
        let tools = self.list_tools().await?;
        let count = tools.len();
        registry.register_all(tools);
        Ok(count)
    }

    /// Disconnect every host, collecting failures.
    pub async fn disconnect_all(&mut self) -> Vec<(String, StepwiseError)> {
        let mut failures = Vec::new();
        for (name, source) in &mut self.sources {
            if let Err(error) = source.disconnect().await {
                warn!(host = %name, %error, "remote host failed to disconnect");
                failures.push((name.clone(), error));
            }
        }
        failures
    }
}
