//! Transport: per-node WebSocket channels and the HTTP side channel.
//!
//! The orchestration layer only depends on the [`WebSocketClient`] and
//! [`NodeHttpClient`] contracts; [`websocket`] and [`http`] provide the
//! tokio-tungstenite and reqwest implementations.

pub mod http;
#[cfg(test)]
pub(crate) mod mock;
pub mod pool;
pub mod websocket;

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::error::NetworkError;
use crate::node::Node;
use crate::state::WebSocketStatus;

pub use http::{NodeHttpClient, ReqwestNodeHttpClient};
pub use pool::{ListenerGuard, SharedWebSocket, WebSockets};
pub use websocket::{TungsteniteFactory, TungsteniteWebSocket};

/// A full-duplex text channel to one node.
pub trait WebSocketClient: Send + Sync {
    fn node(&self) -> &Node;

    /// Current channel status.
    fn status(&self) -> WebSocketStatus;

    /// Observe status changes.
    fn watch_status(&self) -> watch::Receiver<WebSocketStatus>;

    /// Start opening the channel. Does nothing unless the current status is
    /// connectable. Must move the status to `Connecting` before returning.
    fn connect(&self);

    /// Close the channel.
    fn close(&self);

    /// Queue a text frame for sending.
    fn send_message(&self, message: String) -> Result<(), NetworkError>;

    /// Subscribe to inbound text frames received from now on.
    fn messages(&self) -> broadcast::Receiver<String>;
}

/// Creates channels for nodes on first use.
pub trait WebSocketFactory: Send + Sync {
    fn create(&self, node: &Node) -> Arc<dyn WebSocketClient>;
}
