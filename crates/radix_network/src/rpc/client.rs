//! Typed JSON-RPC calls and notification streams over a node's channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::atom::{Address, Atom, AtomId, AtomObservation, AtomStatus, AtomStatusNotification};
use crate::error::NetworkError;
use crate::identity::SubscriberId;
use crate::node::{Node, NodeInfo};
use crate::rpc::jsonrpc::{JsonRpcRequest, RawJsonRpcMessage, methods};
use crate::state::WebSocketStatus;
use crate::transport::SharedWebSocket;
use crate::universe::UniverseConfig;

/// Request ids are unique per process so concurrent clients sharing one
/// channel never see each other's responses.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// JSON-RPC client for one node. Cheap to clone.
#[derive(Clone)]
pub struct RadixJsonRpcClient {
    socket: SharedWebSocket,
    timeout: Duration,
}

impl RadixJsonRpcClient {
    pub fn new(socket: SharedWebSocket, timeout: Duration) -> Self {
        Self { socket, timeout }
    }

    pub fn node(&self) -> &Node {
        self.socket.node()
    }

    pub fn socket(&self) -> &SharedWebSocket {
        &self.socket
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // -- Requests ------------------------------------------------------------

    pub async fn get_live_peers(&self) -> Result<Vec<NodeInfo>, NetworkError> {
        self.call_typed(methods::GET_LIVE_PEERS, Value::Null).await
    }

    pub async fn get_info(&self) -> Result<NodeInfo, NetworkError> {
        self.call_typed(methods::GET_INFO, Value::Null).await
    }

    pub async fn get_universe(&self) -> Result<UniverseConfig, NetworkError> {
        self.call_typed(methods::GET_UNIVERSE, Value::Null).await
    }

    /// Push an atom. The node acknowledges receipt only; the outcome arrives
    /// through atom-status notifications.
    pub async fn submit_atom(&self, atom: &Atom) -> Result<(), NetworkError> {
        self.call(methods::SUBMIT_ATOM, serde_json::to_value(atom)?)
            .await
            .map(|_| ())
    }

    pub async fn get_atom_status(&self, aid: &AtomId) -> Result<AtomStatus, NetworkError> {
        #[derive(Deserialize)]
        struct StatusResult {
            status: AtomStatus,
        }
        let result: StatusResult = self
            .call_typed(methods::GET_ATOM_STATUS, json!({ "aid": aid }))
            .await?;
        Ok(result.status)
    }

    /// Ask the node to start pushing status updates for `aid` to `subscriber_id`.
    pub async fn get_atom_status_notifications(
        &self,
        subscriber_id: &SubscriberId,
        aid: &AtomId,
    ) -> Result<(), NetworkError> {
        self.call(
            methods::GET_ATOM_STATUS_NOTIFICATIONS,
            json!({ "aid": aid, "subscriberId": subscriber_id }),
        )
        .await
        .map(|_| ())
    }

    pub async fn close_atom_status_notifications(
        &self,
        subscriber_id: &SubscriberId,
    ) -> Result<(), NetworkError> {
        self.call(
            methods::CLOSE_ATOM_STATUS_NOTIFICATIONS,
            json!({ "subscriberId": subscriber_id }),
        )
        .await
        .map(|_| ())
    }

    /// Ask the node to stream atoms at `address` to `subscriber_id`.
    pub async fn subscribe_atoms(
        &self,
        subscriber_id: &SubscriberId,
        address: &Address,
    ) -> Result<(), NetworkError> {
        self.call(
            methods::SUBSCRIBE_ATOMS,
            json!({
                "subscriberId": subscriber_id,
                "query": { "address": address.value },
            }),
        )
        .await
        .map(|_| ())
    }

    pub async fn cancel_atoms_subscription(
        &self,
        subscriber_id: &SubscriberId,
    ) -> Result<(), NetworkError> {
        self.call(methods::CANCEL_ATOMS, json!({ "subscriberId": subscriber_id }))
            .await
            .map(|_| ())
    }

    // -- Notification streams ------------------------------------------------

    /// Status pushes for `subscriber_id`. Open before starting the
    /// subscription so no push is missed.
    pub fn observe_atom_status_notifications(
        &self,
        subscriber_id: &SubscriberId,
    ) -> mpsc::UnboundedReceiver<AtomStatusNotification> {
        self.notifications(methods::ATOM_STATUS_NOTIFICATION, subscriber_id, |params| {
            match serde_json::from_value::<AtomStatusNotification>(params) {
                Ok(notification) => vec![notification],
                Err(e) => {
                    warn!("Malformed atom status notification: {e}");
                    Vec::new()
                }
            }
        })
    }

    /// Atom events for `subscriber_id`, flattened into observations. A
    /// `Head` observation follows the events of an update marked as head.
    pub fn observe_atoms(
        &self,
        subscriber_id: &SubscriberId,
    ) -> mpsc::UnboundedReceiver<AtomObservation> {
        self.notifications(methods::ATOMS_SUBSCRIBE_UPDATE, subscriber_id, |params| {
            match serde_json::from_value::<AtomSubscribeUpdate>(params) {
                Ok(update) => update.into_observations(),
                Err(e) => {
                    warn!("Malformed atom subscription update: {e}");
                    Vec::new()
                }
            }
        })
    }

    // -- Plumbing ------------------------------------------------------------

    /// Send a request and wait for the response with the matching id.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, NetworkError> {
        let _listener = self.socket.listen();
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);

        // Subscribe before sending so the response cannot slip past.
        let mut inbound = self.socket.messages();
        let mut status = self.socket.watch_status();

        let request = JsonRpcRequest::new(method, params, id);
        self.socket.send_message(serde_json::to_string(&request)?)?;
        debug!(node = %self.node(), method, id, "RPC request sent");

        let node = self.node().clone();
        let wait = async {
            loop {
                tokio::select! {
                    msg = inbound.recv() => match msg {
                        Ok(text) => {
                            let Ok(raw) = serde_json::from_str::<RawJsonRpcMessage>(&text) else {
                                continue;
                            };
                            if raw.id != Some(id) {
                                continue;
                            }
                            if let Some(response) = raw.into_response() {
                                return response.into_result().map_err(NetworkError::from);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(node = %node, method, skipped, "RPC response stream lagged");
                        }
                        Err(RecvError::Closed) => {
                            return Err(NetworkError::Transport(format!("Channel to {node} closed")));
                        }
                    },

                    changed = status.changed() => {
                        let current = *status.borrow_and_update();
                        if changed.is_err() || current != WebSocketStatus::Connected {
                            return Err(NetworkError::ConnectionFailed(node.clone()));
                        }
                    }
                }
            }
        };

        match tokio::time::timeout(self.timeout, wait).await {
            Ok(result) => {
                if let Err(e) = &result {
                    warn!(node = %self.node(), method, "RPC call failed: {e}");
                }
                result
            }
            Err(_) => {
                warn!(node = %self.node(), method, "RPC call timed out");
                Err(NetworkError::Timeout(self.timeout))
            }
        }
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, NetworkError> {
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Forward pushes of `method` addressed to `subscriber_id`.
    ///
    /// The forwarding task keeps the channel's listener count raised until
    /// the returned receiver is dropped.
    fn notifications<T, F>(
        &self,
        method: &'static str,
        subscriber_id: &SubscriberId,
        parse: F,
    ) -> mpsc::UnboundedReceiver<T>
    where
        T: Send + 'static,
        F: Fn(Value) -> Vec<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = self.socket.listen();
        let mut inbound = self.socket.messages();
        let node = self.node().clone();
        let subscriber_id = subscriber_id.clone();

        tokio::spawn(async move {
            let _listener = listener;
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    msg = inbound.recv() => match msg {
                        Ok(text) => {
                            let Some(notification) = serde_json::from_str::<RawJsonRpcMessage>(&text)
                                .ok()
                                .and_then(RawJsonRpcMessage::into_notification)
                            else {
                                continue;
                            };
                            if notification.method != method
                                || notification.subscriber_id() != Some(subscriber_id.as_str())
                            {
                                continue;
                            }
                            for item in parse(notification.params) {
                                if tx.send(item).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(node = %node, method, subscriber = %subscriber_id, skipped, "Notification stream lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!(node = %node, method, subscriber = %subscriber_id, "Notification stream closed");
        });

        rx
    }
}

/// Payload of `Atoms.subscribeUpdate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtomSubscribeUpdate {
    #[serde(default)]
    atom_events: Vec<AtomEvent>,
    #[serde(default)]
    is_head: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtomEvent {
    #[serde(rename = "type")]
    kind: AtomEventKind,
    atom: Atom,
    #[serde(default)]
    is_soft: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AtomEventKind {
    Store,
    Delete,
}

impl AtomSubscribeUpdate {
    fn into_observations(self) -> Vec<AtomObservation> {
        let mut observations: Vec<AtomObservation> = self
            .atom_events
            .into_iter()
            .map(|event| match event.kind {
                AtomEventKind::Store => AtomObservation::stored(event.atom, event.is_soft),
                AtomEventKind::Delete => AtomObservation::deleted(event.atom, event.is_soft),
            })
            .collect();
        if self.is_head {
            observations.push(AtomObservation::head());
        }
        observations
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
