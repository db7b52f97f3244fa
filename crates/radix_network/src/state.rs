//! Network state: the client's view of every known node.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::node::{Node, NodeInfo};
use crate::universe::UniverseConfig;

/// Lifecycle of the WebSocket channel to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebSocketStatus {
    /// Channel object created but never opened.
    New,
    /// Not connected; may be connected on demand.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Open and usable.
    Connected,
    /// The last attempt failed or the channel dropped with an error.
    Failed,
}

impl WebSocketStatus {
    /// Whether a connection may be opened from this status.
    pub fn is_connectable(self) -> bool {
        matches!(self, Self::New | Self::Disconnected | Self::Failed)
    }
}

/// Immutable snapshot of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadixNodeState {
    node: Node,
    status: WebSocketStatus,
    info: Option<NodeInfo>,
    universe_config: Option<UniverseConfig>,
}

impl RadixNodeState {
    /// Build a snapshot, checking that `info` (if it names a host) describes
    /// this node.
    pub fn new(
        node: Node,
        status: WebSocketStatus,
        info: Option<NodeInfo>,
        universe_config: Option<UniverseConfig>,
    ) -> Result<Self, StateError> {
        if let Some(reported) = info.as_ref().and_then(|i| i.host.as_deref()) {
            if !reported.eq_ignore_ascii_case(node.host()) {
                return Err(StateError::HostMismatch {
                    node,
                    reported: reported.to_string(),
                });
            }
        }

        Ok(Self {
            node,
            status,
            info,
            universe_config,
        })
    }

    /// A freshly discovered node with nothing known about it yet.
    pub fn disconnected(node: Node) -> Self {
        Self {
            node,
            status: WebSocketStatus::Disconnected,
            info: None,
            universe_config: None,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn status(&self) -> WebSocketStatus {
        self.status
    }

    pub fn info(&self) -> Option<&NodeInfo> {
        self.info.as_ref()
    }

    pub fn universe_config(&self) -> Option<&UniverseConfig> {
        self.universe_config.as_ref()
    }

    pub fn with_status(&self, status: WebSocketStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn with_info(&self, info: NodeInfo) -> Result<Self, StateError> {
        Self::new(
            self.node.clone(),
            self.status,
            Some(info),
            self.universe_config.clone(),
        )
    }

    pub fn with_universe_config(&self, config: UniverseConfig) -> Self {
        Self {
            universe_config: Some(config),
            ..self.clone()
        }
    }
}

/// Every known node, keyed by identity.
///
/// Values are cheap to clone and never change once published; updates go
/// through [`RadixNetworkState::with_node`], which copies on write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadixNetworkState {
    nodes: Arc<HashMap<Node, RadixNodeState>>,
}

impl RadixNetworkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = RadixNodeState>) -> Self {
        let nodes = nodes.into_iter().map(|s| (s.node.clone(), s)).collect();
        Self {
            nodes: Arc::new(nodes),
        }
    }

    pub fn get(&self, node: &Node) -> Option<&RadixNodeState> {
        self.nodes.get(node)
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RadixNodeState> {
        self.nodes.values()
    }

    /// Nodes currently in `status`, sorted for deterministic selection.
    pub fn nodes_with_status(&self, status: WebSocketStatus) -> Vec<&RadixNodeState> {
        let mut nodes: Vec<_> = self.nodes.values().filter(|s| s.status == status).collect();
        nodes.sort_by(|a, b| a.node.cmp(&b.node));
        nodes
    }

    pub fn count_with_status(&self, status: WebSocketStatus) -> usize {
        self.nodes.values().filter(|s| s.status == status).count()
    }

    /// Return a new state with `node_state` inserted or replaced.
    pub fn with_node(&self, node_state: RadixNodeState) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.nodes).insert(node_state.node.clone(), node_state);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::{ShardRange, ShardSpace};

    fn node(host: &str) -> Node {
        Node::new(host, 8080, false)
    }

    fn info(host: Option<&str>) -> NodeInfo {
        let info = NodeInfo::new(ShardSpace::new(0, ShardRange::new(0, 10)));
        match host {
            Some(h) => info.with_host(h),
            None => info,
        }
    }

    #[test]
    fn test_host_mismatch_rejected() {
        let err = RadixNodeState::new(
            node("10.0.0.1"),
            WebSocketStatus::Disconnected,
            Some(info(Some("10.0.0.2"))),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, StateError::HostMismatch { .. }));
    }

    #[test]
    fn test_matching_or_missing_host_accepted() {
        assert!(
            RadixNodeState::new(
                node("10.0.0.1"),
                WebSocketStatus::Disconnected,
                Some(info(Some("10.0.0.1"))),
                None
            )
            .is_ok()
        );
        assert!(
            RadixNodeState::new(
                node("10.0.0.1"),
                WebSocketStatus::Connected,
                Some(info(None)),
                None
            )
            .is_ok()
        );
    }

    #[test]
    fn test_with_node_does_not_touch_original() {
        let empty = RadixNetworkState::new();
        let one = empty.with_node(RadixNodeState::disconnected(node("a")));
        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);

        let updated = one.with_node(
            one.get(&node("a"))
                .unwrap()
                .with_status(WebSocketStatus::Connected),
        );
        assert_eq!(updated.len(), 1);
        assert_eq!(
            one.get(&node("a")).unwrap().status(),
            WebSocketStatus::Disconnected
        );
        assert_eq!(
            updated.get(&node("a")).unwrap().status(),
            WebSocketStatus::Connected
        );
    }

    #[test]
    fn test_nodes_with_status_sorted() {
        let state = RadixNetworkState::from_nodes([
            RadixNodeState::disconnected(node("c")),
            RadixNodeState::disconnected(node("a")),
            RadixNodeState::disconnected(node("b")).with_status(WebSocketStatus::Connecting),
        ]);
        let hosts: Vec<_> = state
            .nodes_with_status(WebSocketStatus::Disconnected)
            .iter()
            .map(|s| s.node().host().to_string())
            .collect();
        assert_eq!(hosts, vec!["a", "c"]);
        assert_eq!(state.count_with_status(WebSocketStatus::Connecting), 1);
    }

    #[test]
    fn test_connectable_statuses() {
        assert!(WebSocketStatus::New.is_connectable());
        assert!(WebSocketStatus::Failed.is_connectable());
        assert!(!WebSocketStatus::Connecting.is_connectable());
        assert!(!WebSocketStatus::Connected.is_connectable());
    }
}
