//! Remote node identity and declared capabilities.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;
use crate::shard::{ShardSpace, Shards};

/// Port used when a plain node URL does not name one.
pub const DEFAULT_PORT: u16 = 8080;

/// Port used when a TLS node URL does not name one.
pub const DEFAULT_TLS_PORT: u16 = 443;

/// A remote peer, identified by its normalized base URL.
///
/// Equality, ordering and hashing all go through `(host, port, ssl)`, so two
/// URLs that differ only in scheme spelling or host case are the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Node {
    host: String,
    port: u16,
    ssl: bool,
}

impl Node {
    pub fn new(host: impl Into<String>, port: u16, ssl: bool) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            port,
            ssl,
        }
    }

    /// Parse a node from `ws://`, `wss://`, `http://`, `https://` or a bare
    /// `host:port`.
    pub fn parse(input: &str) -> Result<Self, NetworkError> {
        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("ws://{input}")
        };

        let url = url::Url::parse(&with_scheme)
            .map_err(|e| NetworkError::InvalidNode(format!("{input}: {e}")))?;

        let ssl = match url.scheme() {
            "ws" | "http" => false,
            "wss" | "https" => true,
            other => {
                return Err(NetworkError::InvalidNode(format!(
                    "{input}: unsupported scheme {other}"
                )));
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| NetworkError::InvalidNode(format!("{input}: missing host")))?;
        // `Url::port` hides a port equal to the scheme default, so look for
        // it spelled out before falling back to ours.
        let port = url
            .port()
            .or_else(|| {
                url.port_or_known_default()
                    .filter(|p| input.contains(&format!(":{p}")))
            })
            .unwrap_or(if ssl { DEFAULT_TLS_PORT } else { DEFAULT_PORT });

        Ok(Self::new(host, port, ssl))
    }

    /// Build the node a live-peer descriptor points at. The peer is reached
    /// with the same port and TLS setting as the node that reported it.
    pub fn from_peer(info: &NodeInfo, reported_by: &Node) -> Option<Self> {
        info.host
            .as_deref()
            .map(|host| Self::new(host, reported_by.port, reported_by.ssl))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_ssl(&self) -> bool {
        self.ssl
    }

    /// The JSON-RPC WebSocket endpoint.
    pub fn websocket_url(&self) -> String {
        let scheme = if self.ssl { "wss" } else { "ws" };
        format!("{scheme}://{}:{}/rpc", self.host, self.port)
    }

    /// The HTTP base URL.
    pub fn http_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.ssl { "wss" } else { "ws" };
        write!(f, "{scheme}://{}:{}", self.host, self.port)
    }
}

/// Capabilities a node declares about itself (`Network.getInfo`, or one
/// entry of `Network.getLivePeers`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// The host the node believes it is reachable at.
    #[serde(default)]
    pub host: Option<String>,
    pub shard_space: ShardSpace,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub protocol_version: Option<u32>,
    /// When the node last reported itself alive.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NodeInfo {
    pub fn new(shard_space: ShardSpace) -> Self {
        Self {
            host: None,
            shard_space,
            agent: None,
            protocol_version: None,
            timestamp: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn serves(&self, shards: &Shards) -> bool {
        self.shard_space.intersects(shards)
    }
}
