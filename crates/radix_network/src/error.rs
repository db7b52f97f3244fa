//! Network error types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::node::Node;

/// Errors that can occur while talking to remote nodes.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// A transport-level error (WebSocket connect/send/receive).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// JSON serialization / deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An HTTP request to a node failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A node URL could not be parsed.
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// An operation timed out.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// The node's channel is not connected.
    #[error("Not connected to {0}")]
    NotConnected(Node),

    /// The node's channel failed while we were waiting on it.
    #[error("Connection to {0} failed")]
    ConnectionFailed(Node),

    /// Configuration could not be read or written.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Http(format!("request timed out: {e}"))
        } else {
            Self::Http(e.to_string())
        }
    }
}

/// A JSON-RPC 2.0 error object returned by a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Violations of network state invariants.
///
/// These can only come from a broken upstream guarantee (bad
/// deserialization, a misconfigured node), never from network conditions,
/// so the controller treats them as fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// A node reported a host different from the one we know it by.
    #[error("Host mismatch: node {node} reported host {reported}")]
    HostMismatch { node: Node, reported: String },

    /// A status update arrived for a node that was never added.
    #[error("Unknown node: {0}")]
    UnknownNode(Node),
}
