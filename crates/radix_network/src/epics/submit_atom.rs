//! Drives atom submissions from request to exactly one completion.
//!
//! Per submission:
//!
//! 1. `SubmitAtomRequest` registers the submission and starts its timeout.
//! 2. `FindANodeResult` for it becomes `SubmitAtomSend` to that node.
//! 3. `SubmitAtomSend` starts a task that waits for the channel, opens the
//!    status notification stream, subscribes to status notifications, and
//!    only then pushes the atom.
//! 4. Every status becomes `SubmitAtomStatus`; a terminal one, a failed
//!    push, a lost channel or the timeout becomes `SubmitAtomCompleted`.
//!
//! Tasks report back through the epic's own loop, which owns the table of
//! live submissions. Only the loop emits, and only for submissions still in
//! the table, so a submission completes once and never reports after that.
//! Removing a submission from the table cancels its task, which then closes
//! the node's status subscription.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::action::{NodeAction, SubmitAtomFailure, SubmitAtomResult};
use crate::atom::{Atom, AtomStatus};
use crate::epics::{Epic, EpicContext, ensure_connected};
use crate::identity::SubscriberId;
use crate::node::Node;
use crate::rpc::RadixJsonRpcClient;
use crate::state::WebSocketStatus;
use crate::transport::WebSockets;

pub struct SubmitAtomEpic {
    sockets: Arc<WebSockets>,
    submit_timeout: Duration,
    rpc_timeout: Duration,
}

impl SubmitAtomEpic {
    pub fn new(sockets: Arc<WebSockets>, submit_timeout: Duration, rpc_timeout: Duration) -> Self {
        Self {
            sockets,
            submit_timeout,
            rpc_timeout,
        }
    }
}

/// Reports from timers and submission tasks to the epic loop.
#[derive(Debug)]
enum SubmitEvent {
    Received(SubscriberId),
    Status(SubscriberId, AtomStatus),
    Complete(SubscriberId, SubmitAtomResult),
}

struct PendingSubmission {
    atom: Atom,
    complete_on_store_only: bool,
    node: Option<Node>,
    timer: JoinHandle<()>,
    cancel: Option<oneshot::Sender<()>>,
}

impl Drop for PendingSubmission {
    fn drop(&mut self) {
        self.timer.abort();
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

#[async_trait]
impl Epic for SubmitAtomEpic {
    fn name(&self) -> &'static str {
        "submit_atom"
    }

    async fn run(&self, mut ctx: EpicContext) {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut pending: HashMap<SubscriberId, PendingSubmission> = HashMap::new();
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                action = ctx.actions.recv() => {
                    let Some(action) = action else { break };
                    match action {
                        NodeAction::SubmitAtomRequest {
                            uuid,
                            atom,
                            complete_on_store_only,
                        } => {
                            if pending.contains_key(&uuid) {
                                warn!(subscriber = %uuid, "Duplicate submission ignored");
                                continue;
                            }
                            info!(subscriber = %uuid, aid = %atom.aid, "Submission started");
                            let timer = {
                                let events = events_tx.clone();
                                let uuid = uuid.clone();
                                let timeout = self.submit_timeout;
                                tokio::spawn(async move {
                                    tokio::time::sleep(timeout).await;
                                    let _ = events.send(SubmitEvent::Complete(
                                        uuid,
                                        SubmitAtomResult::Failure(SubmitAtomFailure::Timeout),
                                    ));
                                })
                            };
                            pending.insert(
                                uuid,
                                PendingSubmission {
                                    atom,
                                    complete_on_store_only,
                                    node: None,
                                    timer,
                                    cancel: None,
                                },
                            );
                        }

                        NodeAction::FindANodeResult { node, request } => {
                            let NodeAction::SubmitAtomRequest { uuid, .. } = *request else {
                                continue;
                            };
                            let Some(entry) = pending.get(&uuid) else { continue };
                            let _ = ctx.output.send(NodeAction::SubmitAtomSend {
                                uuid,
                                atom: entry.atom.clone(),
                                node,
                                complete_on_store_only: entry.complete_on_store_only,
                            });
                        }

                        NodeAction::SubmitAtomSend { uuid, node, .. } => {
                            let Some(entry) = pending.get_mut(&uuid) else { continue };
                            if entry.cancel.is_some() {
                                debug!(subscriber = %uuid, "Submission already sent");
                                continue;
                            }
                            let (cancel_tx, cancel_rx) = oneshot::channel();
                            entry.cancel = Some(cancel_tx);
                            entry.node = Some(node.clone());

                            let submission = Submission {
                                uuid,
                                atom: entry.atom.clone(),
                                complete_on_store_only: entry.complete_on_store_only,
                                client: RadixJsonRpcClient::new(
                                    self.sockets.get_or_create(&node),
                                    self.rpc_timeout,
                                ),
                                events: events_tx.clone(),
                                output: ctx.output.clone(),
                            };
                            tasks.spawn(submission.run(cancel_rx));
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

/// The action for `event`, if its submission is still live. Completion
/// removes the submission.
fn apply_event(
    pending: &mut HashMap<SubscriberId, PendingSubmission>,
    event: SubmitEvent,
) -> Option<NodeAction> {
    match event {
        SubmitEvent::Received(uuid) => {
            let entry = pending.get(&uuid)?;
            Some(NodeAction::SubmitAtomReceived {
                atom: entry.atom.clone(),
                node: entry.node.clone()?,
                uuid,
            })
        }
        SubmitEvent::Status(uuid, status) => {
            let entry = pending.get(&uuid)?;
            Some(NodeAction::SubmitAtomStatus {
                atom: entry.atom.clone(),
                node: entry.node.clone()?,
                uuid,
                status,
            })
        }
        SubmitEvent::Complete(uuid, result) => {
            let entry = pending.remove(&uuid)?;
            info!(subscriber = %uuid, success = result.is_success(), "Submission completed");
            Some(NodeAction::SubmitAtomCompleted {
                atom: entry.atom.clone(),
                node: entry.node.clone(),
                uuid,
                result,
            })
        }
    }
}

/// The completion a status leads to, if any.
pub(crate) fn terminal_result(
    status: AtomStatus,
    complete_on_store_only: bool,
) -> Option<SubmitAtomResult> {
    let rejected = || {
        SubmitAtomResult::Failure(SubmitAtomFailure::Rejected {
            status,
            message: None,
        })
    };
    match status {
        AtomStatus::Stored => Some(SubmitAtomResult::Success { status }),
        s if s.is_rejection() => Some(rejected()),
        _ if complete_on_store_only => None,
        _ => Some(SubmitAtomResult::Success { status }),
    }
}

/// One submission's conversation with its node.
struct Submission {
    uuid: SubscriberId,
    atom: Atom,
    complete_on_store_only: bool,
    client: RadixJsonRpcClient,
    events: mpsc::UnboundedSender<SubmitEvent>,
    output: mpsc::UnboundedSender<NodeAction>,
}

impl Submission {
    async fn run(self, cancel: oneshot::Receiver<()>) {
        let _listener = self.client.socket().listen();
        let mut subscribed = false;

        tokio::select! {
            result = self.submit(&mut subscribed) => {
                let _ = self.events.send(SubmitEvent::Complete(self.uuid.clone(), result));
            }
            _ = cancel => {
                debug!(subscriber = %self.uuid, "Submission cancelled");
            }
        }

        if subscribed {
            if let Err(e) = self.client.close_atom_status_notifications(&self.uuid).await {
                debug!(subscriber = %self.uuid, "Closing status notifications failed: {e}");
            }
        }
    }

    async fn submit(&self, subscribed: &mut bool) -> SubmitAtomResult {
        let socket = self.client.socket();
        let node = self.client.node().clone();
        let lost = |reason: String| {
            warn!(subscriber = %self.uuid, node = %node, "Submission lost its connection: {reason}");
            SubmitAtomResult::Failure(SubmitAtomFailure::ConnectionLost { reason })
        };

        if let Err(e) = ensure_connected(socket, &self.output, self.client.timeout()).await {
            return lost(e.to_string());
        }

        let mut statuses = self.client.observe_atom_status_notifications(&self.uuid);
        // Once sent, the node may hold the subscription even without replying.
        *subscribed = true;
        if let Err(e) = self
            .client
            .get_atom_status_notifications(&self.uuid, &self.atom.aid)
            .await
        {
            return lost(e.to_string());
        }

        if let Err(e) = self.client.submit_atom(&self.atom).await {
            warn!(subscriber = %self.uuid, node = %node, "Atom push failed: {e}");
            return SubmitAtomResult::Failure(SubmitAtomFailure::Rejected {
                status: AtomStatus::EvictedInvalidAtom,
                message: Some(e.to_string()),
            });
        }
        let _ = self.events.send(SubmitEvent::Received(self.uuid.clone()));

        let mut status_rx = socket.watch_status();
        loop {
            tokio::select! {
                notification = statuses.recv() => {
                    let Some(notification) = notification else {
                        return lost("status stream ended".to_string());
                    };
                    let status = notification.status;
                    let _ = self.events.send(SubmitEvent::Status(self.uuid.clone(), status));
                    if let Some(result) = terminal_result(status, self.complete_on_store_only) {
                        return result;
                    }
                }
                changed = status_rx.changed() => {
                    let status = *status_rx.borrow_and_update();
                    if changed.is_err()
                        || matches!(status, WebSocketStatus::Failed | WebSocketStatus::Disconnected)
                    {
                        return lost(format!("channel {status:?}"));
                    }
                }
            }
        }
    }
}
