//! Bootstraps the node set from seeds and grows it from live peer lists.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::action::NodeAction;
use crate::epics::{Epic, EpicContext};
use crate::node::{Node, NodeInfo};
use crate::state::RadixNetworkState;
use crate::transport::NodeHttpClient;
use crate::universe::UniverseConfig;

/// On `DiscoverMoreNodes`, asks every seed for its universe over HTTP. A
/// seed in the expected universe (or any universe, when none is configured)
/// is added and queried for its info and live peers; any other seed is
/// reported as a mismatch. Peers from `GetLivePeersResult` that are not yet
/// known are added.
pub struct DiscoverNodesEpic {
    seeds: Vec<Node>,
    universe: Option<UniverseConfig>,
    http: Arc<dyn NodeHttpClient>,
}

impl DiscoverNodesEpic {
    pub fn new(
        seeds: Vec<Node>,
        universe: Option<UniverseConfig>,
        http: Arc<dyn NodeHttpClient>,
    ) -> Self {
        Self {
            seeds,
            universe,
            http,
        }
    }
}

#[async_trait]
impl Epic for DiscoverNodesEpic {
    fn name(&self) -> &'static str {
        "discover_nodes"
    }

    async fn run(&self, mut ctx: EpicContext) {
        // Peers already announced by this epic but possibly not yet reduced.
        let mut announced: HashSet<Node> = HashSet::new();
        let mut handshakes = JoinSet::new();

        loop {
            tokio::select! {
                action = ctx.actions.recv() => {
                    let Some(action) = action else { break };
                    match action {
                        NodeAction::DiscoverMoreNodes => {
                            if self.seeds.is_empty() {
                                warn!("Asked to discover nodes but no seeds are configured");
                                let _ = ctx.output.send(NodeAction::DiscoverMoreNodesError {
                                    reason: "no seeds configured".to_string(),
                                });
                            }
                            for seed in &self.seeds {
                                handshakes.spawn(seed_handshake(
                                    seed.clone(),
                                    self.universe.clone(),
                                    Arc::clone(&self.http),
                                    ctx.output.clone(),
                                ));
                            }
                        }
                        NodeAction::GetLivePeersResult { node, peers } => {
                            let state = ctx.current_state();
                            for action in new_peers(&state, &node, &peers, &mut announced) {
                                if ctx.output.send(action).is_err() {
                                    return;
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Some(_) = handshakes.join_next(), if !handshakes.is_empty() => {}
            }
        }
    }
}

async fn seed_handshake(
    seed: Node,
    expected: Option<UniverseConfig>,
    http: Arc<dyn NodeHttpClient>,
    output: mpsc::UnboundedSender<NodeAction>,
) {
    let actions = match http.get_universe(&seed).await {
        Ok(actual) => match expected {
            Some(expected) if !expected.is_compatible(&actual) => {
                warn!(node = %seed, expected = %expected.name, actual = %actual.name, "Seed is in a different universe");
                vec![NodeAction::NodeUniverseMismatch {
                    node: seed,
                    expected,
                    actual,
                }]
            }
            _ => {
                info!(node = %seed, universe = %actual.name, "Seed joined");
                vec![
                    NodeAction::AddNode {
                        node: seed.clone(),
                        info: None,
                    },
                    NodeAction::GetUniverseConfigResult {
                        node: seed.clone(),
                        config: actual,
                    },
                    NodeAction::GetNodeInfoRequest { node: seed.clone() },
                    NodeAction::GetLivePeersRequest { node: seed },
                ]
            }
        },
        Err(e) => {
            warn!(node = %seed, "Seed unreachable: {e}");
            vec![NodeAction::DiscoverMoreNodesError {
                reason: format!("{seed}: {e}"),
            }]
        }
    };

    for action in actions {
        if output.send(action).is_err() {
            break;
        }
    }
}

/// `AddNode` actions for the peers in `peers` not yet known, each at most
/// once.
pub(crate) fn new_peers(
    state: &RadixNetworkState,
    reported_by: &Node,
    peers: &[NodeInfo],
    announced: &mut HashSet<Node>,
) -> Vec<NodeAction> {
    let mut actions = Vec::new();
    for info in peers {
        let Some(peer) = Node::from_peer(info, reported_by) else {
            debug!(node = %reported_by, "Skipping live peer without a host");
            continue;
        };
        if state.contains(&peer) || !announced.insert(peer.clone()) {
            continue;
        }
        info!(node = %peer, reported_by = %reported_by, "Discovered peer");
        actions.push(NodeAction::AddNode {
            node: peer,
            info: Some(info.clone()),
        });
    }
    actions
}
