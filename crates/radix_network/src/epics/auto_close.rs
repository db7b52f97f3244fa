//! Schedules idle channel closes after RPC work on a node finishes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::debug;

use crate::action::NodeAction;
use crate::epics::{Epic, EpicContext};
use crate::identity::SubscriberId;
use crate::node::Node;

/// After an RPC result, or the end of an atom subscription, waits `grace`
/// and then asks for the node's channel to be closed. The close is only
/// carried out if nothing is listening on the channel by then, so a burst
/// of requests to one node reuses a single connection.
#[derive(Debug)]
pub struct AutoCloseEpic {
    grace: Duration,
}

impl AutoCloseEpic {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }
}

#[async_trait]
impl Epic for AutoCloseEpic {
    fn name(&self) -> &'static str {
        "auto_close"
    }

    async fn run(&self, mut ctx: EpicContext) {
        let mut fetches: HashMap<SubscriberId, Node> = HashMap::new();
        let mut timers = JoinSet::new();

        loop {
            tokio::select! {
                action = ctx.actions.recv() => {
                    let Some(action) = action else { break };
                    let node = match &action {
                        NodeAction::FetchAtomsSubscribe { uuid, node, .. } => {
                            fetches.insert(uuid.clone(), node.clone());
                            None
                        }
                        NodeAction::FetchAtomsCancel { uuid, .. } => fetches.remove(uuid),
                        other => other.completes_rpc().cloned(),
                    };
                    let Some(node) = node else { continue };

                    debug!(node = %node, trigger = action.name(), grace = ?self.grace, "Scheduling close");
                    let grace = self.grace;
                    let output = ctx.output.clone();
                    timers.spawn(async move {
                        tokio::time::sleep(grace).await;
                        let _ = output.send(NodeAction::CloseWebSocket { node });
                    });
                }
                Some(_) = timers.join_next(), if !timers.is_empty() => {}
            }
        }
    }
}
