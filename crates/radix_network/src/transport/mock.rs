//! In-memory channels for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::error::NetworkError;
use crate::node::Node;
use crate::state::WebSocketStatus;
use crate::transport::{NodeHttpClient, WebSocketClient, WebSocketFactory};
use crate::universe::UniverseConfig;

/// How a mock channel reacts to `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    Succeed,
    Fail,
    /// Stay in `Connecting` forever.
    Hang,
}

/// Produces the inbound frames a node sends back for one outbound request.
pub type Responder = Arc<dyn Fn(&Node, &Value) -> Vec<Value> + Send + Sync>;

const CONNECT_DELAY: Duration = Duration::from_millis(10);

pub struct MockWebSocket {
    node: Node,
    behavior: ConnectBehavior,
    responder: Option<Responder>,
    status_tx: Arc<watch::Sender<WebSocketStatus>>,
    inbound_tx: broadcast::Sender<String>,
    generation: Arc<AtomicU64>,
    sent: Mutex<Vec<Value>>,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
}

impl MockWebSocket {
    pub fn new(node: Node, behavior: ConnectBehavior, responder: Option<Responder>) -> Self {
        let (status_tx, _) = watch::channel(WebSocketStatus::New);
        let (inbound_tx, _) = broadcast::channel(256);
        Self {
            node,
            behavior,
            responder,
            status_tx: Arc::new(status_tx),
            inbound_tx,
            generation: Arc::new(AtomicU64::new(0)),
            sent: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    /// Deliver an inbound frame.
    pub fn push(&self, message: Value) {
        let _ = self.inbound_tx.send(message.to_string());
    }

    /// Force a status, as if the remote side changed it.
    pub fn set_status(&self, status: WebSocketStatus) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.status_tx.send_replace(status);
    }

    /// Every JSON message sent so far.
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    /// Methods of every request sent so far, in order.
    pub fn sent_methods(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| m["method"].as_str().map(str::to_string))
            .collect()
    }
}

impl WebSocketClient for MockWebSocket {
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
        self.connects.fetch_add(1, Ordering::SeqCst);

        let next = match self.behavior {
            ConnectBehavior::Succeed => WebSocketStatus::Connected,
            ConnectBehavior::Fail => WebSocketStatus::Failed,
            ConnectBehavior::Hang => return,
        };
        let status_tx = Arc::clone(&self.status_tx);
        let current = Arc::clone(&self.generation);
        tokio::spawn(async move {
            tokio::time::sleep(CONNECT_DELAY).await;
            if current.load(Ordering::SeqCst) == generation {
                status_tx.send_replace(next);
            }
        });
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
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
        let value: Value = serde_json::from_str(&message)?;
        self.sent.lock().push(value.clone());
        if let Some(responder) = &self.responder {
            for reply in responder(&self.node, &value) {
                self.push(reply);
            }
        }
        Ok(())
    }

    fn messages(&self) -> broadcast::Receiver<String> {
        self.inbound_tx.subscribe()
    }
}

pub struct MockFactory {
    default_behavior: ConnectBehavior,
    behaviors: Mutex<HashMap<Node, ConnectBehavior>>,
    responder: Option<Responder>,
    sockets: Mutex<HashMap<Node, Arc<MockWebSocket>>>,
}

impl MockFactory {
    pub fn new(default_behavior: ConnectBehavior) -> Self {
        Self {
            default_behavior,
            behaviors: Mutex::new(HashMap::new()),
            responder: None,
            sockets: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_responder(mut self, responder: Responder) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn set_behavior(&self, node: &Node, behavior: ConnectBehavior) {
        self.behaviors.lock().insert(node.clone(), behavior);
    }

    pub fn socket(&self, node: &Node) -> Option<Arc<MockWebSocket>> {
        self.sockets.lock().get(node).cloned()
    }

    pub fn created(&self) -> usize {
        self.sockets.lock().len()
    }
}

impl WebSocketFactory for MockFactory {
    fn create(&self, node: &Node) -> Arc<dyn WebSocketClient> {
        let behavior = self
            .behaviors
            .lock()
            .get(node)
            .copied()
            .unwrap_or(self.default_behavior);
        let socket = Arc::new(MockWebSocket::new(
            node.clone(),
            behavior,
            self.responder.clone(),
        ));
        self.sockets.lock().insert(node.clone(), Arc::clone(&socket));
        socket
    }
}

/// Canned answers to `GET /api/universe`.
#[derive(Default)]
pub struct MockHttp {
    universes: Mutex<HashMap<Node, UniverseConfig>>,
}

impl MockHttp {
    pub fn set_universe(&self, node: &Node, universe: UniverseConfig) {
        self.universes.lock().insert(node.clone(), universe);
    }
}

#[async_trait]
impl NodeHttpClient for MockHttp {
    async fn get_universe(&self, node: &Node) -> Result<UniverseConfig, NetworkError> {
        self.universes
            .lock()
            .get(node)
            .cloned()
            .ok_or_else(|| NetworkError::Http(format!("{node}: connection refused")))
    }
}

/// Reply to `request` with `result`.
pub fn reply(request: &Value, result: Value) -> Value {
    serde_json::json!({"jsonrpc": "2.0", "id": request["id"], "result": result})
}

/// Reply to `request` with a JSON-RPC error.
pub fn reply_error(request: &Value, code: i64, message: &str) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "error": {"code": code, "message": message}
    })
}
