//! The per-node channel pool and listener accounting.
//!
//! A node's channel is shared by every operation talking to it. Each such
//! operation holds a [`ListenerGuard`] for as long as it needs the channel;
//! a close request is only honoured once the listener count is zero.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::error::NetworkError;
use crate::node::Node;
use crate::state::WebSocketStatus;
use crate::transport::{WebSocketClient, WebSocketFactory};

/// A pooled channel plus its listener count. Cheap to clone.
#[derive(Clone)]
pub struct SharedWebSocket {
    client: Arc<dyn WebSocketClient>,
    listeners: Arc<AtomicUsize>,
}

impl SharedWebSocket {
    pub fn new(client: Arc<dyn WebSocketClient>) -> Self {
        Self {
            client,
            listeners: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn node(&self) -> &Node {
        self.client.node()
    }

    pub fn status(&self) -> WebSocketStatus {
        self.client.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<WebSocketStatus> {
        self.client.watch_status()
    }

    pub fn connect(&self) {
        self.client.connect();
    }

    pub fn send_message(&self, message: String) -> Result<(), NetworkError> {
        self.client.send_message(message)
    }

    pub fn messages(&self) -> broadcast::Receiver<String> {
        self.client.messages()
    }

    /// Register interest in the channel until the guard is dropped.
    pub fn listen(&self) -> ListenerGuard {
        self.listeners.fetch_add(1, Ordering::SeqCst);
        ListenerGuard {
            listeners: Arc::clone(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }

    /// Close the channel if nobody is listening. Returns whether it closed.
    pub fn close_if_idle(&self) -> bool {
        let listeners = self.listener_count();
        if listeners > 0 {
            debug!(node = %self.node(), listeners, "Channel still in use, not closing");
            return false;
        }
        self.client.close();
        true
    }

    /// Wait until the channel is connected.
    ///
    /// Does not open the channel itself. Fails once an attempt observed here
    /// ends in `Failed` or `Disconnected`, or when `timeout` elapses.
    pub async fn wait_for_connection(&self, timeout: Duration) -> Result<(), NetworkError> {
        let node = self.node().clone();
        let mut status_rx = self.client.watch_status();

        let wait = async {
            let mut attempted = false;
            loop {
                let status = *status_rx.borrow_and_update();
                match status {
                    WebSocketStatus::Connected => return Ok(()),
                    WebSocketStatus::Connecting => attempted = true,
                    WebSocketStatus::Failed | WebSocketStatus::Disconnected if attempted => {
                        return Err(NetworkError::ConnectionFailed(node.clone()));
                    }
                    _ => {}
                }
                if status_rx.changed().await.is_err() {
                    return Err(NetworkError::ConnectionFailed(node.clone()));
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| NetworkError::Timeout(timeout))?
    }
}

/// Keeps a channel's listener count raised while alive.
#[derive(Debug)]
pub struct ListenerGuard {
    listeners: Arc<AtomicUsize>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.listeners.fetch_sub(1, Ordering::SeqCst);
    }
}

/// All channels the client has created, one per node.
///
/// Channels are never removed: a closed channel is reopened on the next
/// connect request, which keeps status watchers attached to it valid.
pub struct WebSockets {
    factory: Arc<dyn WebSocketFactory>,
    sockets: Mutex<HashMap<Node, SharedWebSocket>>,
}

impl WebSockets {
    pub fn new(factory: Arc<dyn WebSocketFactory>) -> Self {
        Self {
            factory,
            sockets: Mutex::new(HashMap::new()),
        }
    }

    /// The channel for `node`, created on first use.
    pub fn get_or_create(&self, node: &Node) -> SharedWebSocket {
        self.sockets
            .lock()
            .entry(node.clone())
            .or_insert_with(|| {
                debug!(node = %node, "Creating channel");
                SharedWebSocket::new(self.factory.create(node))
            })
            .clone()
    }

    pub fn get(&self, node: &Node) -> Option<SharedWebSocket> {
        self.sockets.lock().get(node).cloned()
    }

    /// Close `node`'s channel if it exists and nobody is listening.
    pub fn close_if_idle(&self, node: &Node) -> bool {
        match self.get(node) {
            Some(socket) => socket.close_if_idle(),
            None => false,
        }
    }

    /// Close every channel regardless of listeners.
    pub fn close_all(&self) {
        let sockets: Vec<SharedWebSocket> = self.sockets.lock().values().cloned().collect();
        for socket in sockets {
            socket.client.close();
        }
    }

    pub fn len(&self) -> usize {
        self.sockets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
