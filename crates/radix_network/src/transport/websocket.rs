//! WebSocket channel to a node, backed by tokio-tungstenite.
//!
//! Each successful connect spawns one task that owns both halves of the
//! socket: it drains an outbound queue into the sink and forwards received
//! text frames to a broadcast channel. Status changes are published through
//! a watch channel, tagged with a generation so that a stale task from a
//! previous connection can never overwrite the status of a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::NetworkError;
use crate::node::Node;
use crate::state::WebSocketStatus;
use crate::transport::{WebSocketClient, WebSocketFactory};

/// A client-side WebSocket channel to a node's JSON-RPC endpoint.
pub struct TungsteniteWebSocket {
    node: Node,
    connection_timeout: Duration,
    status_tx: Arc<watch::Sender<WebSocketStatus>>,
    inbound_tx: broadcast::Sender<String>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    generation: Arc<AtomicU64>,
}

impl TungsteniteWebSocket {
    pub fn new(node: Node, connection_timeout: Duration, message_buffer: usize) -> Self {
        let (status_tx, _) = watch::channel(WebSocketStatus::New);
        let (inbound_tx, _) = broadcast::channel(message_buffer.max(1));
        Self {
            node,
            connection_timeout,
            status_tx: Arc::new(status_tx),
            inbound_tx,
            outbound: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl WebSocketClient for TungsteniteWebSocket {
    fn node(&self) -> &Node {
        &self.node
    }

    fn status(&self) -> WebSocketStatus {
        *self.status_tx.borrow()
    }

    fn watch_status(&self) -> watch::Receiver<WebSocketStatus> {
        self.status_tx.subscribe()
    }

    fn connect(&self) {
        let mut generation = 0;
        let started = self.status_tx.send_if_modified(|status| {
            if status.is_connectable() {
                *status = WebSocketStatus::Connecting;
                generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                true
            } else {
                false
            }
        });
        if !started {
            return;
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        *self.outbound.lock() = Some(out_tx);

        let connection = Connection {
            node: self.node.clone(),
            generation,
            current: Arc::clone(&self.generation),
            status_tx: Arc::clone(&self.status_tx),
            inbound_tx: self.inbound_tx.clone(),
        };
        let timeout = self.connection_timeout;
        tokio::spawn(async move {
            connection.run(timeout, out_rx).await;
        });
    }

    fn close(&self) {
        // Retire the running connection first so its final status write is
        // dropped; dropping the queue then makes it send a close frame.
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.outbound.lock().take();
        self.status_tx.send_if_modified(|status| {
            if matches!(
                *status,
                WebSocketStatus::Connecting | WebSocketStatus::Connected
            ) {
                *status = WebSocketStatus::Disconnected;
                true
            } else {
                false
            }
        });
    }

    fn send_message(&self, message: String) -> Result<(), NetworkError> {
        if self.status() != WebSocketStatus::Connected {
            return Err(NetworkError::NotConnected(self.node.clone()));
        }
        match self.outbound.lock().as_ref() {
            Some(tx) => tx
                .send(Message::Text(message.into()))
                .map_err(|_| NetworkError::Transport(format!("Channel to {} closed", self.node))),
            None => Err(NetworkError::NotConnected(self.node.clone())),
        }
    }

    fn messages(&self) -> broadcast::Receiver<String> {
        self.inbound_tx.subscribe()
    }
}

/// State owned by one connection task.
struct Connection {
    node: Node,
    generation: u64,
    current: Arc<AtomicU64>,
    status_tx: Arc<watch::Sender<WebSocketStatus>>,
    inbound_tx: broadcast::Sender<String>,
}

impl Connection {
    fn set_status(&self, next: WebSocketStatus) {
        self.status_tx.send_if_modified(|status| {
            if self.current.load(Ordering::SeqCst) == self.generation && *status != next {
                *status = next;
                true
            } else {
                false
            }
        });
    }

    async fn run(self, timeout: Duration, mut out_rx: mpsc::UnboundedReceiver<Message>) {
        let url = self.node.websocket_url();

        let ws_stream = match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => {
                warn!(node = %self.node, "WebSocket connect failed: {e}");
                self.set_status(WebSocketStatus::Failed);
                return;
            }
            Err(_) => {
                warn!(node = %self.node, "WebSocket connect timed out after {timeout:?}");
                self.set_status(WebSocketStatus::Failed);
                return;
            }
        };

        info!(node = %self.node, "WebSocket connected");
        self.set_status(WebSocketStatus::Connected);

        let (mut sink, mut stream) = ws_stream.split();
        loop {
            tokio::select! {
                outbound = out_rx.recv() => match outbound {
                    Some(msg) => {
                        if let Err(e) = sink.send(msg).await {
                            warn!(node = %self.node, "WebSocket send failed: {e}");
                            self.set_status(WebSocketStatus::Failed);
                            break;
                        }
                    }
                    None => {
                        debug!(node = %self.node, "Closing WebSocket");
                        let _ = sink.send(Message::Close(None)).await;
                        self.set_status(WebSocketStatus::Disconnected);
                        break;
                    }
                },

                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        // No subscribers just means nobody is waiting on this node.
                        let _ = self.inbound_tx.send(text.as_str().to_owned());
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(node = %self.node, "Remote closed WebSocket");
                        self.set_status(WebSocketStatus::Disconnected);
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary/ping/pong
                    Some(Err(e)) => {
                        warn!(node = %self.node, "WebSocket read failed: {e}");
                        self.set_status(WebSocketStatus::Failed);
                        break;
                    }
                },
            }
        }
    }
}

/// Creates [`TungsteniteWebSocket`]s.
#[derive(Debug, Clone)]
pub struct TungsteniteFactory {
    pub connection_timeout: Duration,
    pub message_buffer: usize,
}

impl TungsteniteFactory {
    pub fn from_config(config: &crate::config::NetworkConfig) -> Self {
        Self {
            connection_timeout: config.connection_timeout,
            message_buffer: config.message_buffer,
        }
    }
}

impl WebSocketFactory for TungsteniteFactory {
    fn create(&self, node: &Node) -> Arc<dyn WebSocketClient> {
        Arc::new(TungsteniteWebSocket::new(
            node.clone(),
            self.connection_timeout,
            self.message_buffer,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
