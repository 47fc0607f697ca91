//! The seam between the tool system and an external tool host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StepwiseError;

/// A tool as advertised by a remote host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Outcome of a remote invocation.
///
/// A host that ran the tool and reported failure answers with
/// `is_error: true`; transport and protocol failures are `Err` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCallResult {
    pub output: String,
    pub is_error: bool,
    pub structured: Option<Value>,
}

impl RemoteCallResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
            structured: None,
        }
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: true,
            structured: None,
        }
    }
}

/// A connection to something that lists and runs tools on our behalf.
#[async_trait]
pub trait RemoteToolHost: Send {
    async fn connect(&mut self) -> Result<(), StepwiseError>;

    async fn list_tools(&mut self) -> Result<Vec<RemoteToolSchema>, StepwiseError>;

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<RemoteCallResult, StepwiseError>;

    async fn disconnect(&mut self) -> Result<(), StepwiseError>;
}
