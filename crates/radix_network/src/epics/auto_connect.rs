//! Opens a node's channel when an action needs it.

use async_trait::async_trait;
use tracing::debug;

use crate::action::NodeAction;
use crate::epics::{Epic, EpicContext};

/// Emits `ConnectWebSocket` for every action that needs a round-trip to a
/// node whose channel is idle. The consumer of the action then waits for
/// the channel to reach `connected`.
#[derive(Debug, Default)]
pub struct AutoConnectEpic;

#[async_trait]
impl Epic for AutoConnectEpic {
    fn name(&self) -> &'static str {
        "auto_connect"
    }

    async fn run(&self, mut ctx: EpicContext) {
        while let Some(action) = ctx.actions.recv().await {
            let Some(node) = action.requires_connection() else {
                continue;
            };

            let status = ctx.state.borrow().get(node).map(|s| s.status());
            match status {
                Some(status) if status.is_connectable() => {
                    debug!(node = %node, trigger = action.name(), "Auto-connecting");
                    let connect = NodeAction::ConnectWebSocket { node: node.clone() };
                    if ctx.output.send(connect).is_err() {
                        break;
                    }
                }
                Some(_) => {}
                None => debug!(node = %node, trigger = action.name(), "Not auto-connecting unknown node"),
            }
        }
    }
}
