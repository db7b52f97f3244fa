//! Epics: long-running workflows driven by the action stream.
//!
//! An epic receives every action the controller has reduced, can read the
//! network state as of that action, and emits further actions back into the
//! controller. Epics never fail: every error they meet is turned into an
//! action.
//!
//! Each epic runs as one task owning its own tables; per-operation work is
//! spawned into a `JoinSet` owned by that task, so stopping the epic stops
//! everything it started.

mod auto_close;
mod auto_connect;
mod discover_nodes;
mod fetch_atoms;
mod find_a_node;
mod rpc_methods;
mod submit_atom;
mod websocket;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::action::NodeAction;
use crate::error::NetworkError;
use crate::state::RadixNetworkState;
use crate::transport::SharedWebSocket;

pub use auto_close::AutoCloseEpic;
pub use auto_connect::AutoConnectEpic;
pub use discover_nodes::DiscoverNodesEpic;
pub use fetch_atoms::FetchAtomsEpic;
pub use find_a_node::{FindANodeEpic, SearchSettings};
pub use rpc_methods::RpcMethodsEpic;
pub use submit_atom::SubmitAtomEpic;
pub use websocket::ConnectWebSocketEpic;

/// Everything an epic sees of the controller.
pub struct EpicContext {
    /// Every action, after it has been reduced into state.
    pub actions: mpsc::UnboundedReceiver<NodeAction>,
    /// Network state, including the latest received action.
    pub state: watch::Receiver<RadixNetworkState>,
    /// Actions emitted here are dispatched back into the controller.
    pub output: mpsc::UnboundedSender<NodeAction>,
}

impl EpicContext {
    pub fn new(
        actions: mpsc::UnboundedReceiver<NodeAction>,
        state: watch::Receiver<RadixNetworkState>,
        output: mpsc::UnboundedSender<NodeAction>,
    ) -> Self {
        Self {
            actions,
            state,
            output,
        }
    }

    /// Snapshot of the current network state.
    pub fn current_state(&self) -> RadixNetworkState {
        self.state.borrow().clone()
    }
}

/// A workflow reacting to actions.
#[async_trait]
pub trait Epic: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Run until the action stream ends.
    async fn run(&self, ctx: EpicContext);
}

/// Wait until `socket` is connected, asking for a connection if it is idle.
///
/// Callers hold a listener on the socket across this call, so the channel
/// cannot be closed under them once it connects.
pub(crate) async fn ensure_connected(
    socket: &SharedWebSocket,
    output: &mpsc::UnboundedSender<NodeAction>,
    timeout: Duration,
) -> Result<(), NetworkError> {
    if socket.status().is_connectable() {
        let _ = output.send(NodeAction::ConnectWebSocket {
            node: socket.node().clone(),
        });
    }
    socket.wait_for_connection(timeout).await
}

// ---------------------------------------------------------------------------
// Test harness
// ---------------------------------------------------------------------------
