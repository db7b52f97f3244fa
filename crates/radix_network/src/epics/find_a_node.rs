//! Resolves requests that need a node to a connected, compatible one.
//!
//! Every request carrying shards (`FindANodeRequest`, `SubmitAtomRequest`,
//! `FetchAtomsRequest`) starts a search. A search re-evaluates the network
//! state on every change:
//!
//! 1. If a connected node serves the shards and is in the expected
//!    universe, pick one and emit `FindANodeResult`. The search ends and
//!    every other node it asked to connect is released with
//!    `CloseWebSocket`.
//! 2. Otherwise work towards such a node: fill in missing info for
//!    connected nodes, connect a disconnected candidate (bounded by
//!    `max_simultaneous_connection_requests`), ask nodes with unknown
//!    shards for their info, and as a last resort discover more nodes.
//!
//! A search is cancelled by `FindANodeCancel` with the request's id, or,
//! for a submission or fetch, when that operation completes or is
//! cancelled. Cancelling releases every node the search asked to connect.
//!
//! Only connects that have not started yet count against the bound on top
//! of the nodes already `Connecting`. A connect stops counting once state
//! shows the node past `New`/`Disconnected`, or once a `Connecting` event
//! for it goes by, so attempts that fail quickly free their slot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::action::NodeAction;
use crate::epics::{Epic, EpicContext};
use crate::identity::SubscriberId;
use crate::node::Node;
use crate::selector::PeerSelector;
use crate::shard::Shards;
use crate::state::{RadixNetworkState, RadixNodeState, WebSocketStatus};
use crate::universe::UniverseConfig;

/// Parameters shared by all searches.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub max_connecting: usize,
    /// Required universe. `None` accepts nodes from any universe.
    pub universe: Option<UniverseConfig>,
}

impl SearchSettings {
    fn universe_ok(&self, node: &RadixNodeState) -> bool {
        match &self.universe {
            None => true,
            Some(expected) => node
                .universe_config()
                .is_some_and(|actual| expected.is_compatible(actual)),
        }
    }

    /// Known to be in another universe.
    fn universe_mismatch(&self, node: &RadixNodeState) -> bool {
        match (&self.universe, node.universe_config()) {
            (Some(expected), Some(actual)) => !expected.is_compatible(actual),
            _ => false,
        }
    }
}

/// What one search has asked for so far.
#[derive(Debug, Default, Clone)]
pub(crate) struct SearchProgress {
    /// Nodes this search sent `ConnectWebSocket` for.
    pub connect_requested: HashSet<Node>,
    /// Requested connects not yet seen starting.
    pub connect_pending: HashSet<Node>,
    pub info_requested: HashSet<Node>,
    pub universe_requested: HashSet<Node>,
    /// State size when this search last asked for more nodes.
    pub discovered_at: Option<usize>,
}

/// The epic loop's end of one running search.
struct SearchHandle {
    cancel: oneshot::Sender<()>,
    attempts: mpsc::UnboundedSender<Node>,
}

pub struct FindANodeEpic {
    settings: SearchSettings,
    selector: Arc<dyn PeerSelector>,
}

impl FindANodeEpic {
    pub fn new(settings: SearchSettings, selector: Arc<dyn PeerSelector>) -> Self {
        Self { settings, selector }
    }
}

#[async_trait]
impl Epic for FindANodeEpic {
    fn name(&self) -> &'static str {
        "find_a_node"
    }

    async fn run(&self, mut ctx: EpicContext) {
        let mut handles: HashMap<SubscriberId, SearchHandle> = HashMap::new();
        let mut searches = JoinSet::new();

        loop {
            tokio::select! {
                action = ctx.actions.recv() => {
                    let Some(action) = action else { break };

                    if let Some(shards) = action.find_a_node_shards() {
                        let Some(uuid) = action.subscriber_id().cloned() else { continue };
                        let (cancel, cancelled) = oneshot::channel();
                        let (attempts, attempts_rx) = mpsc::unbounded_channel();
                        handles.insert(uuid.clone(), SearchHandle { cancel, attempts });
                        debug!(request = action.name(), subscriber = %uuid, ?shards, "Searching for a node");
                        let search = Search {
                            request: action,
                            shards,
                            settings: self.settings.clone(),
                            selector: Arc::clone(&self.selector),
                            state: ctx.state.clone(),
                            attempts: attempts_rx,
                            output: ctx.output.clone(),
                            progress: SearchProgress::default(),
                        };
                        searches.spawn(search.run(cancelled));
                        continue;
                    }

                    match &action {
                        NodeAction::FindANodeCancel { uuid }
                        | NodeAction::SubmitAtomCompleted { uuid, .. }
                        | NodeAction::FetchAtomsCancel { uuid, .. } => {
                            if let Some(handle) = handles.remove(uuid) {
                                debug!(subscriber = %uuid, "Cancelling node search");
                                let _ = handle.cancel.send(());
                            }
                        }
                        NodeAction::FindANodeResult { request, .. } => {
                            if let Some(id) = request.subscriber_id() {
                                handles.remove(id);
                            }
                        }
                        NodeAction::WebSocketEvent {
                            node,
                            status: WebSocketStatus::Connecting,
                        } => {
                            handles.retain(|_, handle| handle.attempts.send(node.clone()).is_ok());
                        }
                        _ => {}
                    }
                }
                Some(_) = searches.join_next(), if !searches.is_empty() => {}
            }
        }
    }
}

struct Search {
    request: NodeAction,
    shards: Shards,
    settings: SearchSettings,
    selector: Arc<dyn PeerSelector>,
    state: watch::Receiver<RadixNetworkState>,
    /// Nodes whose connect attempt has started.
    attempts: mpsc::UnboundedReceiver<Node>,
    output: mpsc::UnboundedSender<NodeAction>,
    progress: SearchProgress,
}

impl Search {
    async fn run(mut self, mut cancelled: oneshot::Receiver<()>) {
        loop {
            let state = self.state.borrow_and_update().clone();

            let candidates = connected_candidates(&state, &self.shards, &self.settings);
            if let Some(node) = self.selector.select(&candidates) {
                info!(node = %node, request = self.request.name(), "Node found");
                let cleanup: Vec<Node> = self
                    .progress
                    .connect_requested
                    .iter()
                    .filter(|n| **n != node)
                    .cloned()
                    .collect();
                self.emit(NodeAction::FindANodeResult {
                    node,
                    request: Box::new(self.request.clone()),
                });
                self.release(cleanup);
                return;
            }

            for action in next_connection_actions(
                &state,
                &self.shards,
                &self.settings,
                self.selector.as_ref(),
                &mut self.progress,
            ) {
                self.emit(action);
            }

            tokio::select! {
                // A dropped sender means the request is gone too.
                _ = &mut cancelled => {
                    debug!(request = self.request.name(), "Node search cancelled");
                    let cleanup: Vec<Node> = self.progress.connect_requested.iter().cloned().collect();
                    self.release(cleanup);
                    return;
                }
                changed = self.state.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                Some(node) = self.attempts.recv() => {
                    self.progress.connect_pending.remove(&node);
                }
            }
        }
    }

    fn emit(&self, action: NodeAction) {
        let _ = self.output.send(action);
    }

    fn release(&self, nodes: Vec<Node>) {
        for node in nodes {
            self.emit(NodeAction::CloseWebSocket { node });
        }
    }
}

/// Connected nodes serving `shards` in an acceptable universe, sorted.
pub(crate) fn connected_candidates(
    state: &RadixNetworkState,
    shards: &Shards,
    settings: &SearchSettings,
) -> Vec<Node> {
    let mut nodes: Vec<Node> = state
        .iter()
        .filter(|n| n.status() == WebSocketStatus::Connected)
        .filter(|n| n.info().is_some_and(|info| info.serves(shards)))
        .filter(|n| settings.universe_ok(n))
        .map(|n| n.node().clone())
        .collect();
    nodes.sort();
    nodes
}

/// The actions moving a search closer to a connected candidate, given that
/// none exists in `state` yet. Records what was asked for in `progress`
/// so nothing is requested twice by the same search.
pub(crate) fn next_connection_actions(
    state: &RadixNetworkState,
    shards: &Shards,
    settings: &SearchSettings,
    selector: &dyn PeerSelector,
    progress: &mut SearchProgress,
) -> Vec<NodeAction> {
    let mut actions = Vec::new();

    // Connected nodes only lack data.
    for node_state in state.nodes_with_status(WebSocketStatus::Connected) {
        let node = node_state.node();
        if settings.universe_mismatch(node_state) {
            continue;
        }
        match node_state.info() {
            None => {
                if progress.info_requested.insert(node.clone()) {
                    actions.push(NodeAction::GetNodeInfoRequest { node: node.clone() });
                }
            }
            Some(info) if info.serves(shards) => {
                if settings.universe.is_some()
                    && node_state.universe_config().is_none()
                    && progress.universe_requested.insert(node.clone())
                {
                    actions.push(NodeAction::GetUniverseConfigRequest { node: node.clone() });
                }
            }
            Some(_) => {}
        }
    }

    // Connects asked for but not yet started count against the bound.
    progress.connect_pending.retain(|n| {
        state.get(n).is_some_and(|s| {
            matches!(s.status(), WebSocketStatus::New | WebSocketStatus::Disconnected)
        })
    });
    let connecting = state.count_with_status(WebSocketStatus::Connecting);
    if connecting + progress.connect_pending.len() >= settings.max_connecting {
        return actions;
    }

    let idle: Vec<&RadixNodeState> = state
        .iter()
        .filter(|n| n.status().is_connectable())
        .filter(|n| !settings.universe_mismatch(n))
        .collect();

    let mut connectable: Vec<Node> = idle
        .iter()
        .filter(|n| n.info().is_some_and(|info| info.serves(shards)))
        .filter(|n| !progress.connect_requested.contains(n.node()))
        .map(|n| n.node().clone())
        .collect();
    connectable.sort();
    if let Some(node) = selector.select(&connectable) {
        debug!(node = %node, "Connecting candidate");
        progress.connect_requested.insert(node.clone());
        progress.connect_pending.insert(node.clone());
        actions.push(NodeAction::ConnectWebSocket { node });
        return actions;
    }

    let mut unknown: Vec<Node> = idle
        .iter()
        .filter(|n| n.info().is_none())
        .filter(|n| !progress.info_requested.contains(n.node()))
        .map(|n| n.node().clone())
        .collect();
    unknown.sort();
    if !unknown.is_empty() {
        for node in unknown {
            progress.info_requested.insert(node.clone());
            actions.push(NodeAction::GetNodeInfoRequest { node: node.clone() });
            if settings.universe.is_some() && progress.universe_requested.insert(node.clone()) {
                actions.push(NodeAction::GetUniverseConfigRequest { node });
            }
        }
        return actions;
    }

    if actions.is_empty() && progress.discovered_at != Some(state.len()) {
        progress.discovered_at = Some(state.len());
        actions.push(NodeAction::DiscoverMoreNodes);
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{Atom, AtomId};
    use crate::epics::testing::EpicHarness;
    use crate::node::NodeInfo;
    use crate::selector::FirstSelector;
    use crate::shard::{ShardRange, ShardSpace};
    use crate::action::{SubmitAtomFailure, SubmitAtomResult};

    fn universe() -> UniverseConfig {
        UniverseConfig {
            name: "localnet".to_string(),
            magic: 1,
            port: 30000,
            timestamp: 0,
            genesis: Vec::new(),
        }
    }

    fn other_universe() -> UniverseConfig {
        UniverseConfig {
            magic: 2,
            ..universe()
        }
    }

    fn settings() -> SearchSettings {
        SearchSettings {
            max_connecting: 2,
            universe: Some(universe()),
        }
    }

    fn node(i: u8) -> Node {
        Node::new(format!("10.0.0.{i}"), 8080, false)
    }

    fn info(low: i64, high: i64) -> NodeInfo {
        NodeInfo::new(ShardSpace::new(0, ShardRange::new(low, high)))
    }

    fn node_state(
        i: u8,
        status: WebSocketStatus,
        shards: Option<(i64, i64)>,
        universe: Option<UniverseConfig>,
    ) -> RadixNodeState {
        RadixNodeState::new(
            node(i),
            status,
            shards.map(|(low, high)| info(low, high)),
            universe,
        )
        .unwrap()
    }

    fn five() -> Shards {
        Shards::single(5)
    }

    #[test]
    fn test_connected_candidates_filter() {
        let state = RadixNetworkState::from_nodes([
            node_state(1, WebSocketStatus::Connected, Some((0, 10)), Some(universe())),
            node_state(2, WebSocketStatus::Connected, Some((20, 30)), Some(universe())),
            node_state(3, WebSocketStatus::Connected, Some((0, 10)), Some(other_universe())),
            node_state(4, WebSocketStatus::Connected, Some((0, 10)), None),
            node_state(5, WebSocketStatus::Disconnected, Some((0, 10)), Some(universe())),
        ]);
        assert_eq!(connected_candidates(&state, &five(), &settings()), vec![node(1)]);

        let any_universe = SearchSettings {
            universe: None,
            ..settings()
        };
        assert_eq!(
            connected_candidates(&state, &five(), &any_universe),
            vec![node(1), node(3), node(4)]
        );
    }

    #[test]
    fn test_connects_known_candidate_once() {
        let state = RadixNetworkState::from_nodes([
            node_state(1, WebSocketStatus::Disconnected, Some((0, 10)), None),
            node_state(2, WebSocketStatus::Disconnected, Some((20, 30)), None),
        ]);
        let mut progress = SearchProgress::default();

        let actions = next_connection_actions(&state, &five(), &settings(), &FirstSelector, &mut progress);
        assert_eq!(actions, vec![NodeAction::ConnectWebSocket { node: node(1) }]);

        // Same state again: the pending connect is not repeated, and with no
        // other candidate nothing new is known, so discovery is asked for.
        let actions = next_connection_actions(&state, &five(), &settings(), &FirstSelector, &mut progress);
        assert_eq!(actions, vec![NodeAction::DiscoverMoreNodes]);

        let actions = next_connection_actions(&state, &five(), &settings(), &FirstSelector, &mut progress);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_backpressure() {
        let state = RadixNetworkState::from_nodes([
            node_state(1, WebSocketStatus::Connecting, Some((0, 10)), None),
            node_state(2, WebSocketStatus::Connecting, Some((0, 10)), None),
            node_state(3, WebSocketStatus::Disconnected, Some((0, 10)), None),
        ]);
        let mut progress = SearchProgress::default();
        let actions = next_connection_actions(&state, &five(), &settings(), &FirstSelector, &mut progress);
        assert!(actions.is_empty());
        assert!(progress.connect_requested.is_empty());
    }

    #[test]
    fn test_unreflected_connects_count_against_bound() {
        let state = RadixNetworkState::from_nodes([
            node_state(1, WebSocketStatus::Connecting, Some((0, 10)), None),
            node_state(2, WebSocketStatus::Disconnected, Some((0, 10)), None),
            node_state(3, WebSocketStatus::Disconnected, Some((0, 10)), None),
        ]);
        let mut progress = SearchProgress::default();

        let actions = next_connection_actions(&state, &five(), &settings(), &FirstSelector, &mut progress);
        assert_eq!(actions, vec![NodeAction::ConnectWebSocket { node: node(2) }]);
        let actions = next_connection_actions(&state, &five(), &settings(), &FirstSelector, &mut progress);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_failed_connects_do_not_exhaust_connection_bound() {
        let mut progress = SearchProgress::default();
        let mut step = |nodes: Vec<RadixNodeState>| {
            let state = RadixNetworkState::from_nodes(nodes);
            next_connection_actions(&state, &five(), &settings(), &FirstSelector, &mut progress)
        };

        let actions = step(vec![
            node_state(1, WebSocketStatus::Disconnected, Some((0, 10)), Some(universe())),
            node_state(2, WebSocketStatus::Disconnected, Some((0, 10)), Some(universe())),
        ]);
        assert_eq!(actions, vec![NodeAction::ConnectWebSocket { node: node(1) }]);

        let actions = step(vec![
            node_state(1, WebSocketStatus::Connecting, Some((0, 10)), Some(universe())),
            node_state(2, WebSocketStatus::Disconnected, Some((0, 10)), Some(universe())),
        ]);
        assert_eq!(actions, vec![NodeAction::ConnectWebSocket { node: node(2) }]);

        step(vec![
            node_state(1, WebSocketStatus::Disconnected, Some((0, 10)), Some(other_universe())),
            node_state(2, WebSocketStatus::Connecting, Some((0, 10)), Some(universe())),
        ]);

        // Both attempts ended back in Disconnected, in the wrong universe.
        let actions = step(vec![
            node_state(1, WebSocketStatus::Disconnected, Some((0, 10)), Some(other_universe())),
            node_state(2, WebSocketStatus::Disconnected, Some((0, 10)), Some(other_universe())),
            node_state(3, WebSocketStatus::Disconnected, Some((0, 10)), Some(universe())),
        ]);
        assert!(actions.contains(&NodeAction::ConnectWebSocket { node: node(3) }));
    }

    #[test]
    fn test_unknown_nodes_queried() {
        let state = RadixNetworkState::from_nodes([
            node_state(1, WebSocketStatus::Disconnected, None, None),
            node_state(2, WebSocketStatus::Disconnected, Some((0, 10)), Some(other_universe())),
        ]);
        let mut progress = SearchProgress::default();
        let actions = next_connection_actions(&state, &five(), &settings(), &FirstSelector, &mut progress);
        assert_eq!(
            actions,
            vec![
                NodeAction::GetNodeInfoRequest { node: node(1) },
                NodeAction::GetUniverseConfigRequest { node: node(1) },
            ]
        );
    }

    #[test]
    fn test_connected_node_missing_universe_queried() {
        let state = RadixNetworkState::from_nodes([node_state(
            1,
            WebSocketStatus::Connected,
            Some((0, 10)),
            None,
        )]);
        let mut progress = SearchProgress::default();
        let actions = next_connection_actions(&state, &five(), &settings(), &FirstSelector, &mut progress);
        assert_eq!(
            actions,
            vec![NodeAction::GetUniverseConfigRequest { node: node(1) }]
        );
        let actions = next_connection_actions(&state, &five(), &settings(), &FirstSelector, &mut progress);
        assert!(!actions.contains(&NodeAction::GetUniverseConfigRequest { node: node(1) }));
    }

    #[test]
    fn test_discover_only_when_state_grew() {
        let mut progress = SearchProgress::default();
        let empty = RadixNetworkState::new();
        assert_eq!(
            next_connection_actions(&empty, &five(), &settings(), &FirstSelector, &mut progress),
            vec![NodeAction::DiscoverMoreNodes]
        );
        assert!(next_connection_actions(&empty, &five(), &settings(), &FirstSelector, &mut progress).is_empty());

        let grown = RadixNetworkState::from_nodes([node_state(
            1,
            WebSocketStatus::Disconnected,
            Some((20, 30)),
            None,
        )]);
        assert_eq!(
            next_connection_actions(&grown, &five(), &settings(), &FirstSelector, &mut progress),
            vec![NodeAction::DiscoverMoreNodes]
        );
    }

    fn start(state: RadixNetworkState) -> EpicHarness {
        EpicHarness::start(
            FindANodeEpic::new(settings(), Arc::new(FirstSelector)),
            state,
        )
    }

    #[tokio::test]
    async fn test_connected_node_found_immediately() {
        let state = RadixNetworkState::from_nodes([node_state(
            1,
            WebSocketStatus::Connected,
            Some((0, 10)),
            Some(universe()),
        )]);
        let mut harness = start(state);

        let request = NodeAction::find_a_node(five());
        harness.dispatch(request.clone());
        assert_eq!(
            harness.next().await,
            NodeAction::FindANodeResult {
                node: node(1),
                request: Box::new(request)
            }
        );
        assert!(harness.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_search_connects_then_selects_and_releases_others() {
        let state = RadixNetworkState::from_nodes([
            node_state(1, WebSocketStatus::Disconnected, Some((0, 10)), Some(universe())),
            node_state(2, WebSocketStatus::Disconnected, Some((0, 10)), Some(universe())),
        ]);
        let mut harness = start(state);

        let request = NodeAction::find_a_node(five());
        harness.dispatch(request.clone());
        assert_eq!(
            harness.next().await,
            NodeAction::ConnectWebSocket { node: node(1) }
        );

        harness.reduce(&NodeAction::WebSocketEvent {
            node: node(1),
            status: WebSocketStatus::Connecting,
        });
        assert_eq!(
            harness.next().await,
            NodeAction::ConnectWebSocket { node: node(2) }
        );

        harness.reduce(&NodeAction::WebSocketEvent {
            node: node(2),
            status: WebSocketStatus::Connected,
        });
        assert_eq!(
            harness.next().await,
            NodeAction::FindANodeResult {
                node: node(2),
                request: Box::new(request)
            }
        );
        assert_eq!(
            harness.next().await,
            NodeAction::CloseWebSocket { node: node(1) }
        );
    }

    #[tokio::test]
    async fn test_search_cancelled_by_submission_completion() {
        let state = RadixNetworkState::from_nodes([node_state(
            1,
            WebSocketStatus::Disconnected,
            Some((0, 10)),
            Some(universe()),
        )]);
        let mut harness = start(state);

        let atom = Atom::new(AtomId::new("aid"), five(), serde_json::json!({}));
        let request = NodeAction::submit_atom(atom.clone());
        let uuid = request.subscriber_id().cloned().unwrap();
        harness.dispatch(request);
        assert_eq!(
            harness.next().await,
            NodeAction::ConnectWebSocket { node: node(1) }
        );

        harness.dispatch(NodeAction::SubmitAtomCompleted {
            uuid,
            atom,
            node: None,
            result: SubmitAtomResult::Failure(SubmitAtomFailure::Timeout),
        });
        assert_eq!(
            harness.next().await,
            NodeAction::CloseWebSocket { node: node(1) }
        );

        // Later state changes no longer reach the cancelled search.
        harness.reduce(&NodeAction::WebSocketEvent {
            node: node(1),
            status: WebSocketStatus::Connected,
        });
        assert!(harness.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_connects() {
        let state = RadixNetworkState::from_nodes([node_state(
            1,
            WebSocketStatus::Disconnected,
            Some((0, 10)),
            Some(universe()),
        )]);
        let mut harness = start(state);

        let request = NodeAction::find_a_node(five());
        let uuid = request.subscriber_id().cloned().unwrap();
        harness.dispatch(request);
        assert_eq!(
            harness.next().await,
            NodeAction::ConnectWebSocket { node: node(1) }
        );

        harness.dispatch(NodeAction::FindANodeCancel { uuid });
        assert_eq!(
            harness.next().await,
            NodeAction::CloseWebSocket { node: node(1) }
        );

        harness.reduce(&NodeAction::WebSocketEvent {
            node: node(1),
            status: WebSocketStatus::Connected,
        });
        assert!(harness.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_for_other_request_keeps_search() {
        let state = RadixNetworkState::from_nodes([node_state(
            1,
            WebSocketStatus::Disconnected,
            Some((0, 10)),
            Some(universe()),
        )]);
        let mut harness = start(state);

        let request = NodeAction::find_a_node(five());
        harness.dispatch(request.clone());
        assert_eq!(
            harness.next().await,
            NodeAction::ConnectWebSocket { node: node(1) }
        );

        harness.dispatch(NodeAction::FindANodeCancel {
            uuid: SubscriberId::generate(),
        });
        assert!(harness.drain().await.is_empty());

        harness.reduce(&NodeAction::WebSocketEvent {
            node: node(1),
            status: WebSocketStatus::Connected,
        });
        assert_eq!(
            harness.next().await,
            NodeAction::FindANodeResult {
                node: node(1),
                request: Box::new(request)
            }
        );
    }

    #[tokio::test]
    async fn test_connect_attempt_event_frees_slot() {
        let state = RadixNetworkState::from_nodes([
            node_state(1, WebSocketStatus::Disconnected, Some((0, 10)), Some(universe())),
            node_state(2, WebSocketStatus::Disconnected, Some((0, 10)), Some(universe())),
            node_state(3, WebSocketStatus::Disconnected, Some((0, 10)), Some(universe())),
        ]);
        let mut harness = start(state);

        harness.dispatch(NodeAction::find_a_node(five()));
        assert_eq!(
            harness.next().await,
            NodeAction::ConnectWebSocket { node: node(1) }
        );

        // The attempt is seen only as an event; state never shows it
        // Connecting before it fails.
        harness.show(NodeAction::WebSocketEvent {
            node: node(1),
            status: WebSocketStatus::Connecting,
        });
        assert_eq!(
            harness.next().await,
            NodeAction::ConnectWebSocket { node: node(2) }
        );

        harness.reduce(&NodeAction::WebSocketEvent {
            node: node(1),
            status: WebSocketStatus::Failed,
        });
        assert_eq!(
            harness.next().await,
            NodeAction::ConnectWebSocket { node: node(3) }
        );
    }
}
