//! External tool hosts.
//!
//! A [`RemoteToolHost`] lists and runs tools somewhere else. The bridge
//! turns each remote tool into an ordinary [`Tool`](crate::tools::Tool), so
//! the registry and executor never need to know where a tool lives. With the
//! `mcp` feature, [`MCPClient`] speaks the Model Context Protocol over stdio
//! or streamable HTTP.

pub mod bridge;
#[cfg(feature = "mcp")]
pub mod client;
pub mod host;
pub mod manager;
#[cfg(feature = "mcp")]
pub mod transport;

pub use bridge::{namespaced_name, RemoteTool, RemoteToolSource, NAMESPACE_SEPARATOR};
#[cfg(feature = "mcp")]
pub use client::{MCPClient, MCPConnectionState};
pub use host::{RemoteCallResult, RemoteToolHost, RemoteToolSchema};
pub use manager::RemoteToolManager;
#[cfg(feature = "mcp")]
pub use transport::{MCPTransport, StdioTransport, StreamableHttpTransport};
