//! Streams atom observations for an address from the node chosen for it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::action::NodeAction;
use crate::atom::{Address, AtomObservation};
use crate::epics::{Epic, EpicContext, ensure_connected};
use crate::identity::SubscriberId;
use crate::node::Node;
use crate::rpc::RadixJsonRpcClient;
use crate::state::WebSocketStatus;
use crate::transport::WebSockets;

/// Once a node is found for a `FetchAtomsRequest`, subscribes to the
/// address' atoms on it, acknowledges with `FetchAtomsSubscribe` and forwards
/// every observation as `FetchAtomsObservation` until `FetchAtomsCancel`.
///
/// A subscription that cannot be opened, or whose channel drops, ends with
/// a `FetchAtomsCancel` emitted by this epic.
pub struct FetchAtomsEpic {
    sockets: Arc<WebSockets>,
    rpc_timeout: Duration,
}

impl FetchAtomsEpic {
    pub fn new(sockets: Arc<WebSockets>, rpc_timeout: Duration) -> Self {
        Self {
            sockets,
            rpc_timeout,
        }
    }
}

#[derive(Debug)]
enum FetchEvent {
    Subscribed(SubscriberId),
    Observed(SubscriberId, AtomObservation),
    Lost(SubscriberId, String),
}

struct PendingFetch {
    address: Address,
    node: Option<Node>,
    cancel: Option<oneshot::Sender<()>>,
}

impl Drop for PendingFetch {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

#[async_trait]
impl Epic for FetchAtomsEpic {
    fn name(&self) -> &'static str {
        "fetch_atoms"
    }

    async fn run(&self, mut ctx: EpicContext) {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut pending: HashMap<SubscriberId, PendingFetch> = HashMap::new();
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                // A cancel must win over observations already queued.
                biased;

                action = ctx.actions.recv() => {
                    let Some(action) = action else { break };
                    match action {
                        NodeAction::FetchAtomsRequest { uuid, address } => {
                            debug!(subscriber = %uuid, address = %address, "Fetch requested");
                            pending.entry(uuid).or_insert(PendingFetch {
                                address,
                                node: None,
                                cancel: None,
                            });
                        }

                        NodeAction::FindANodeResult { node, request } => {
                            let NodeAction::FetchAtomsRequest { uuid, .. } = *request else {
                                continue;
                            };
                            let Some(entry) = pending.get_mut(&uuid) else { continue };
                            if entry.cancel.is_some() {
                                continue;
                            }
                            let (cancel_tx, cancel_rx) = oneshot::channel();
                            entry.cancel = Some(cancel_tx);
                            entry.node = Some(node.clone());

                            let subscription = Subscription {
                                uuid,
                                address: entry.address.clone(),
                                client: RadixJsonRpcClient::new(
                                    self.sockets.get_or_create(&node),
                                    self.rpc_timeout,
                                ),
                                events: events_tx.clone(),
                                output: ctx.output.clone(),
                            };
                            tasks.spawn(subscription.run(cancel_rx));
                        }

                        NodeAction::FetchAtomsCancel { uuid, .. } => {
                            if pending.remove(&uuid).is_some() {
                                info!(subscriber = %uuid, "Fetch cancelled");
                            }
                        }

                        _ => {}
                    }
                }

                Some(event) = events_rx.recv() => {
                    if let Some(action) = apply_event(&mut pending, event) {
                        let _ = ctx.output.send(action);
                    }
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }
    }
}

fn apply_event(
    pending: &mut HashMap<SubscriberId, PendingFetch>,
    event: FetchEvent,
) -> Option<NodeAction> {
    match event {
        FetchEvent::Subscribed(uuid) => {
            let entry = pending.get(&uuid)?;
            Some(NodeAction::FetchAtomsSubscribe {
                address: entry.address.clone(),
                node: entry.node.clone()?,
                uuid,
            })
        }
        FetchEvent::Observed(uuid, observation) => {
            let entry = pending.get(&uuid)?;
            Some(NodeAction::FetchAtomsObservation {
                address: entry.address.clone(),
                node: entry.node.clone()?,
                uuid,
                observation,
            })
        }
        FetchEvent::Lost(uuid, reason) => {
            let entry = pending.remove(&uuid)?;
            warn!(subscriber = %uuid, "Fetch ended: {reason}");
            Some(NodeAction::FetchAtomsCancel {
                address: entry.address.clone(),
                uuid,
            })
        }
    }
}

/// One address subscription on one node.
struct Subscription {
    uuid: SubscriberId,
    address: Address,
    client: RadixJsonRpcClient,
    events: mpsc::UnboundedSender<FetchEvent>,
    output: mpsc::UnboundedSender<NodeAction>,
}

impl Subscription {
    async fn run(self, cancel: oneshot::Receiver<()>) {
        let _listener = self.client.socket().listen();
        let mut subscribed = false;

        tokio::select! {
            reason = self.stream(&mut subscribed) => {
                let _ = self.events.send(FetchEvent::Lost(self.uuid.clone(), reason));
            }
            _ = cancel => {}
        }

        if subscribed {
            if let Err(e) = self.client.cancel_atoms_subscription(&self.uuid).await {
                debug!(subscriber = %self.uuid, "Cancelling atom subscription failed: {e}");
            }
        }
    }

    /// Forward observations until the subscription breaks; returns why.
    async fn stream(&self, subscribed: &mut bool) -> String {
        let socket = self.client.socket();
        if let Err(e) = ensure_connected(socket, &self.output, self.client.timeout()).await {
            return e.to_string();
        }

        let mut atoms = self.client.observe_atoms(&self.uuid);
        // Once sent, the node may hold the subscription even without replying.
        *subscribed = true;
        if let Err(e) = self.client.subscribe_atoms(&self.uuid, &self.address).await {
            return e.to_string();
        }
        info!(subscriber = %self.uuid, node = %self.client.node(), address = %self.address, "Subscribed to atoms");
        let _ = self.events.send(FetchEvent::Subscribed(self.uuid.clone()));

        let mut status_rx = socket.watch_status();
        loop {
            tokio::select! {
                observation = atoms.recv() => {
                    let Some(observation) = observation else {
                        return "atom stream ended".to_string();
                    };
                    let _ = self.events.send(FetchEvent::Observed(self.uuid.clone(), observation));
                }
                changed = status_rx.changed() => {
                    let status = *status_rx.borrow_and_update();
                    if changed.is_err()
                        || matches!(status, WebSocketStatus::Failed | WebSocketStatus::Disconnected)
                    {
                        return format!("channel {status:?}");
                    }
                }
            }
        }
    }
}
