//! In-memory Radix nodes for driving a full controller.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use radix_network::atom::{Atom, AtomStatus};
use radix_network::rpc::jsonrpc::methods;
use radix_network::transport::{NodeHttpClient, WebSocketClient, WebSocketFactory};
use radix_network::{
    NetworkError, Node, NodeAction, NodeInfo, SubscriberId, UniverseConfig, WebSocketStatus,
};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc, watch};

pub fn universe(magic: i64) -> UniverseConfig {
    UniverseConfig {
        name: "localnet".to_string(),
        magic,
        port: 30000,
        timestamp: 0,
        genesis: Vec::new(),
    }
}

/// What a fake node answers.
#[derive(Clone)]
pub struct FakeNodeConfig {
    pub universe: UniverseConfig,
    pub info: NodeInfo,
    pub peers: Vec<NodeInfo>,
    /// Statuses pushed to the status subscriber once an atom is submitted.
    pub atom_statuses: Vec<AtomStatus>,
}

/// A set of reachable nodes, acting as both channel factory and HTTP
/// client. Nodes that were never added refuse connections.
#[derive(Default)]
pub struct FakeNetwork {
    nodes: Mutex<HashMap<Node, FakeNodeConfig>>,
    sockets: Mutex<HashMap<Node, Arc<FakeSocket>>>,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, node: &Node, config: FakeNodeConfig) {
        self.nodes.lock().insert(node.clone(), config);
    }

    pub fn socket(&self, node: &Node) -> Option<Arc<FakeSocket>> {
        self.sockets.lock().get(node).cloned()
    }
}

impl WebSocketFactory for FakeNetwork {
    fn create(&self, node: &Node) -> Arc<dyn WebSocketClient> {
        let socket = Arc::new(FakeSocket::new(
            node.clone(),
            self.nodes.lock().get(node).cloned(),
        ));
        self.sockets.lock().insert(node.clone(), Arc::clone(&socket));
        socket
    }
}

#[async_trait]
impl NodeHttpClient for FakeNetwork {
    async fn get_universe(&self, node: &Node) -> Result<UniverseConfig, NetworkError> {
        self.nodes
            .lock()
            .get(node)
            .map(|config| config.universe.clone())
            .ok_or_else(|| NetworkError::Http(format!("{node}: connection refused")))
    }
}

pub struct FakeSocket {
    node: Node,
    config: Option<FakeNodeConfig>,
    status_tx: Arc<watch::Sender<WebSocketStatus>>,
    inbound_tx: broadcast::Sender<String>,
    sent: Mutex<Vec<Value>>,
    status_subscriber: Mutex<Option<Value>>,
}

impl FakeSocket {
    fn new(node: Node, config: Option<FakeNodeConfig>) -> Self {
        let (status_tx, _) = watch::channel(WebSocketStatus::New);
        let (inbound_tx, _) = broadcast::channel(256);
        Self {
            node,
            config,
            status_tx: Arc::new(status_tx),
            inbound_tx,
            sent: Mutex::new(Vec::new()),
            status_subscriber: Mutex::new(None),
        }
    }

    pub fn sent_methods(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| m["method"].as_str().map(str::to_string))
            .collect()
    }

    /// Push an `Atoms.subscribeUpdate` storing `atom` to `subscriber`.
    pub fn push_atom_stored(&self, subscriber: &SubscriberId, atom: &Atom) {
        self.push(json!({
            "jsonrpc": "2.0",
            "method": methods::ATOMS_SUBSCRIBE_UPDATE,
            "params": {
                "subscriberId": subscriber,
                "atomEvents": [{"type": "store", "atom": atom}],
                "isHead": false
            }
        }));
    }

    fn push(&self, message: Value) {
        let _ = self.inbound_tx.send(message.to_string());
    }

    fn respond(&self, request: &Value, config: &FakeNodeConfig) -> Vec<Value> {
        let reply = |result: Value| json!({"jsonrpc": "2.0", "id": request["id"], "result": result});
        match request["method"].as_str().unwrap_or_default() {
            methods::GET_INFO => vec![reply(json!(config.info))],
            methods::GET_UNIVERSE => vec![reply(json!(config.universe))],
            methods::GET_LIVE_PEERS => vec![reply(json!(config.peers))],
            methods::GET_ATOM_STATUS_NOTIFICATIONS => {
                *self.status_subscriber.lock() = Some(request["params"]["subscriberId"].clone());
                vec![reply(json!({}))]
            }
            methods::SUBMIT_ATOM => {
                let mut replies = vec![reply(json!({}))];
                if let Some(subscriber) = self.status_subscriber.lock().clone() {
                    replies.extend(config.atom_statuses.iter().map(|status| {
                        json!({
                            "jsonrpc": "2.0",
                            "method": methods::ATOM_STATUS_NOTIFICATION,
                            "params": {"subscriberId": subscriber, "status": status}
                        })
                    }));
                }
                replies
            }
            _ => vec![reply(json!({}))],
        }
    }
}

impl WebSocketClient for FakeSocket {
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
        let started = self.status_tx.send_if_modified(|status| {
            if status.is_connectable() {
                *status = WebSocketStatus::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            return;
        }
        let next = if self.config.is_some() {
            WebSocketStatus::Connected
        } else {
            WebSocketStatus::Failed
        };
        let status_tx = Arc::clone(&self.status_tx);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            status_tx.send_if_modified(|status| {
                if *status == WebSocketStatus::Connecting {
                    *status = next;
                    true
                } else {
                    false
                }
            });
        });
    }

    fn close(&self) {
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
        let request: Value = serde_json::from_str(&message)?;
        self.sent.lock().push(request.clone());
        if let Some(config) = &self.config {
            for reply in self.respond(&request, config) {
                self.push(reply);
            }
        }
        Ok(())
    }

    fn messages(&self) -> broadcast::Receiver<String> {
        self.inbound_tx.subscribe()
    }
}

/// Wait for the first action matching `pick`, up to ten seconds.
pub async fn wait_for<T>(
    actions: &mut mpsc::UnboundedReceiver<NodeAction>,
    mut pick: impl FnMut(&NodeAction) -> Option<T>,
) -> T {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let action = actions.recv().await.expect("action stream closed");
            if let Some(found) = pick(&action) {
                return found;
            }
        }
    })
    .await
    .expect("timed out waiting for action")
}

/// Everything emitted within `window`.
pub async fn collect_for(
    actions: &mut mpsc::UnboundedReceiver<NodeAction>,
    window: Duration,
) -> Vec<NodeAction> {
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(window, async {
        while let Some(action) = actions.recv().await {
            collected.push(action);
        }
    })
    .await;
    collected
}
