//! Opens and closes node channels on request, and reports their status.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::action::NodeAction;
use crate::epics::{Epic, EpicContext};
use crate::node::Node;
use crate::state::WebSocketStatus;
use crate::transport::{SharedWebSocket, WebSockets};

/// The only component that opens or closes channels.
///
/// Every channel it has touched gets one reporter task, the single source
/// of that node's `WebSocketEvent`s. A connect needs a permit from a gate of
/// `max_simultaneous_connection_requests`; the reporter holds it while the
/// node is `connecting` and releases it only after emitting the next
/// status, so the reduced state never shows more connecting nodes than the
/// gate allows.
pub struct ConnectWebSocketEpic {
    sockets: Arc<WebSockets>,
    max_connecting: usize,
}

impl ConnectWebSocketEpic {
    pub fn new(sockets: Arc<WebSockets>, max_connecting: usize) -> Self {
        Self {
            sockets,
            max_connecting: max_connecting.max(1),
        }
    }
}

#[async_trait]
impl Epic for ConnectWebSocketEpic {
    fn name(&self) -> &'static str {
        "connect_websocket"
    }

    async fn run(&self, mut ctx: EpicContext) {
        let gate = Arc::new(Semaphore::new(self.max_connecting));
        let mut reporters: HashMap<Node, mpsc::UnboundedSender<OwnedSemaphorePermit>> =
            HashMap::new();
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                action = ctx.actions.recv() => {
                    let Some(action) = action else { break };
                    match action {
                        NodeAction::ConnectWebSocket { node } => {
                            if !ctx.state.borrow().contains(&node) {
                                warn!(node = %node, "Ignoring connect request for unknown node");
                                continue;
                            }
                            let permits = reporters
                                .entry(node.clone())
                                .or_insert_with(|| {
                                    let (tx, rx) = mpsc::unbounded_channel();
                                    let socket = self.sockets.get_or_create(&node);
                                    tasks.spawn(report_status(socket, rx, ctx.output.clone()));
                                    tx
                                })
                                .clone();
                            let gate = Arc::clone(&gate);
                            tasks.spawn(async move {
                                if let Ok(permit) = gate.acquire_owned().await {
                                    let _ = permits.send(permit);
                                }
                            });
                        }
                        NodeAction::CloseWebSocket { node } => {
                            if self.sockets.close_if_idle(&node) {
                                info!(node = %node, "Closed idle channel");
                            }
                        }
                        _ => {}
                    }
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }
    }
}

/// Connect `socket` once per permit received and report every status
/// change.
async fn report_status(
    socket: SharedWebSocket,
    mut permits: mpsc::UnboundedReceiver<OwnedSemaphorePermit>,
    output: mpsc::UnboundedSender<NodeAction>,
) {
    let node = socket.node().clone();
    let mut status_rx = socket.watch_status();
    let mut reported = *status_rx.borrow_and_update();
    let mut held: Option<OwnedSemaphorePermit> = None;

    loop {
        tokio::select! {
            permit = permits.recv() => {
                let Some(permit) = permit else { break };
                if socket.status().is_connectable() {
                    debug!(node = %node, "Connecting");
                    held = Some(permit);
                    socket.connect();
                }
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *status_rx.borrow_and_update();
                if status != reported {
                    reported = status;
                    if output
                        .send(NodeAction::WebSocketEvent {
                            node: node.clone(),
                            status,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                if status != WebSocketStatus::Connecting {
                    held = None;
                }
            }
        }
    }
    drop(held);
}
