//! Node actions: the closed set of messages flowing through the controller.
//!
//! Requests are dispatched by callers or epics; results and events are
//! emitted by epics. Every action that concerns a single node carries it;
//! requests that still need a node resolved carry shards instead.

use crate::atom::{Address, Atom, AtomObservation, AtomStatus};
use crate::identity::SubscriberId;
use crate::node::{Node, NodeInfo};
use crate::shard::Shards;
use crate::state::WebSocketStatus;
use crate::universe::UniverseConfig;

/// Why a submission ended without the atom being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAtomFailure {
    /// No terminal status arrived before the submission timeout.
    Timeout,
    /// The node refused or evicted the atom.
    Rejected {
        status: AtomStatus,
        message: Option<String>,
    },
    /// The channel to the node failed before a terminal status.
    ConnectionLost { reason: String },
}

/// Terminal outcome of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAtomResult {
    Success { status: AtomStatus },
    Failure(SubmitAtomFailure),
}

impl SubmitAtomResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeAction {
    // ── Discovery ───────────────────────────────────────────────────
    /// Ask seeds (and known nodes) for more peers.
    DiscoverMoreNodes,
    /// A seed could not be reached during discovery.
    DiscoverMoreNodesError { reason: String },
    /// Start tracking a node.
    AddNode { node: Node, info: Option<NodeInfo> },
    /// A node belongs to a different network; it is not added.
    NodeUniverseMismatch {
        node: Node,
        expected: UniverseConfig,
        actual: UniverseConfig,
    },

    // ── Node data ───────────────────────────────────────────────────
    GetNodeInfoRequest { node: Node },
    GetNodeInfoResult { node: Node, info: NodeInfo },
    GetNodeInfoError { node: Node, reason: String },
    GetUniverseConfigRequest { node: Node },
    GetUniverseConfigResult { node: Node, config: UniverseConfig },
    GetUniverseConfigError { node: Node, reason: String },
    GetLivePeersRequest { node: Node },
    GetLivePeersResult { node: Node, peers: Vec<NodeInfo> },
    GetLivePeersError { node: Node, reason: String },

    // ── Node selection ──────────────────────────────────────────────
    /// Find a connected node serving `shards`.
    FindANodeRequest { uuid: SubscriberId, shards: Shards },
    /// Stop the search started by the `FindANodeRequest` with this id.
    FindANodeCancel { uuid: SubscriberId },
    /// A node was chosen for `request`, which is the original request
    /// action (`FindANodeRequest`, `SubmitAtomRequest` or `FetchAtomsRequest`).
    FindANodeResult { node: Node, request: Box<NodeAction> },

    // ── Connections ─────────────────────────────────────────────────
    ConnectWebSocket { node: Node },
    /// Close the node's channel if nothing is listening on it.
    CloseWebSocket { node: Node },
    WebSocketEvent { node: Node, status: WebSocketStatus },

    // ── Submission ──────────────────────────────────────────────────
    SubmitAtomRequest {
        uuid: SubscriberId,
        atom: Atom,
        complete_on_store_only: bool,
    },
    SubmitAtomSend {
        uuid: SubscriberId,
        atom: Atom,
        node: Node,
        complete_on_store_only: bool,
    },
    /// The node acknowledged the push.
    SubmitAtomReceived {
        uuid: SubscriberId,
        atom: Atom,
        node: Node,
    },
    SubmitAtomStatus {
        uuid: SubscriberId,
        atom: Atom,
        node: Node,
        status: AtomStatus,
    },
    /// Emitted exactly once per submission. `node` is `None` when the
    /// submission timed out before a node was found.
    SubmitAtomCompleted {
        uuid: SubscriberId,
        atom: Atom,
        node: Option<Node>,
        result: SubmitAtomResult,
    },

    // ── Atom fetching ───────────────────────────────────────────────
    FetchAtomsRequest {
        uuid: SubscriberId,
        address: Address,
    },
    FetchAtomsSubscribe {
        uuid: SubscriberId,
        address: Address,
        node: Node,
    },
    FetchAtomsObservation {
        uuid: SubscriberId,
        address: Address,
        node: Node,
        observation: AtomObservation,
    },
    FetchAtomsCancel {
        uuid: SubscriberId,
        address: Address,
    },
}

impl NodeAction {
    /// A submission that completes on the first status the node reports.
    pub fn submit_atom(atom: Atom) -> Self {
        Self::SubmitAtomRequest {
            uuid: SubscriberId::generate(),
            atom,
            complete_on_store_only: false,
        }
    }

    /// A submission that only completes successfully once the atom is stored.
    pub fn submit_atom_store_only(atom: Atom) -> Self {
        Self::SubmitAtomRequest {
            uuid: SubscriberId::generate(),
            atom,
            complete_on_store_only: true,
        }
    }

    /// A node search under a fresh id, cancellable with `FindANodeCancel`.
    pub fn find_a_node(shards: Shards) -> Self {
        Self::FindANodeRequest {
            uuid: SubscriberId::generate(),
            shards,
        }
    }

    pub fn fetch_atoms(address: Address) -> Self {
        Self::FetchAtomsRequest {
            uuid: SubscriberId::generate(),
            address,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DiscoverMoreNodes => "discover_more_nodes",
            Self::DiscoverMoreNodesError { .. } => "discover_more_nodes_error",
            Self::AddNode { .. } => "add_node",
            Self::NodeUniverseMismatch { .. } => "node_universe_mismatch",
            Self::GetNodeInfoRequest { .. } => "get_node_info_request",
            Self::GetNodeInfoResult { .. } => "get_node_info_result",
            Self::GetNodeInfoError { .. } => "get_node_info_error",
            Self::GetUniverseConfigRequest { .. } => "get_universe_config_request",
            Self::GetUniverseConfigResult { .. } => "get_universe_config_result",
            Self::GetUniverseConfigError { .. } => "get_universe_config_error",
            Self::GetLivePeersRequest { .. } => "get_live_peers_request",
            Self::GetLivePeersResult { .. } => "get_live_peers_result",
            Self::GetLivePeersError { .. } => "get_live_peers_error",
            Self::FindANodeRequest { .. } => "find_a_node_request",
            Self::FindANodeCancel { .. } => "find_a_node_cancel",
            Self::FindANodeResult { .. } => "find_a_node_result",
            Self::ConnectWebSocket { .. } => "connect_websocket",
            Self::CloseWebSocket { .. } => "close_websocket",
            Self::WebSocketEvent { .. } => "websocket_event",
            Self::SubmitAtomRequest { .. } => "submit_atom_request",
            Self::SubmitAtomSend { .. } => "submit_atom_send",
            Self::SubmitAtomReceived { .. } => "submit_atom_received",
            Self::SubmitAtomStatus { .. } => "submit_atom_status",
            Self::SubmitAtomCompleted { .. } => "submit_atom_completed",
            Self::FetchAtomsRequest { .. } => "fetch_atoms_request",
            Self::FetchAtomsSubscribe { .. } => "fetch_atoms_subscribe",
            Self::FetchAtomsObservation { .. } => "fetch_atoms_observation",
            Self::FetchAtomsCancel { .. } => "fetch_atoms_cancel",
        }
    }

    /// The node this action concerns, if it is already resolved.
    pub fn node(&self) -> Option<&Node> {
        match self {
            Self::AddNode { node, .. }
            | Self::NodeUniverseMismatch { node, .. }
            | Self::GetNodeInfoRequest { node }
            | Self::GetNodeInfoResult { node, .. }
            | Self::GetNodeInfoError { node, .. }
            | Self::GetUniverseConfigRequest { node }
            | Self::GetUniverseConfigResult { node, .. }
            | Self::GetUniverseConfigError { node, .. }
            | Self::GetLivePeersRequest { node }
            | Self::GetLivePeersResult { node, .. }
            | Self::GetLivePeersError { node, .. }
            | Self::FindANodeResult { node, .. }
            | Self::ConnectWebSocket { node }
            | Self::CloseWebSocket { node }
            | Self::WebSocketEvent { node, .. }
            | Self::SubmitAtomSend { node, .. }
            | Self::SubmitAtomReceived { node, .. }
            | Self::SubmitAtomStatus { node, .. }
            | Self::FetchAtomsSubscribe { node, .. }
            | Self::FetchAtomsObservation { node, .. } => Some(node),
            Self::SubmitAtomCompleted { node, .. } => node.as_ref(),
            Self::DiscoverMoreNodes
            | Self::DiscoverMoreNodesError { .. }
            | Self::FindANodeRequest { .. }
            | Self::FindANodeCancel { .. }
            | Self::SubmitAtomRequest { .. }
            | Self::FetchAtomsRequest { .. }
            | Self::FetchAtomsCancel { .. } => None,
        }
    }

    /// The shards a request needs a node for, if this action asks for one.
    pub fn find_a_node_shards(&self) -> Option<Shards> {
        match self {
            Self::FindANodeRequest { shards, .. } => Some(shards.clone()),
            Self::SubmitAtomRequest { atom, .. } => Some(atom.shards.clone()),
            Self::FetchAtomsRequest { address, .. } => Some(address.shards()),
            _ => None,
        }
    }

    /// The search, submission or fetch this action belongs to.
    pub fn subscriber_id(&self) -> Option<&SubscriberId> {
        match self {
            Self::FindANodeRequest { uuid, .. }
            | Self::FindANodeCancel { uuid }
            | Self::SubmitAtomRequest { uuid, .. }
            | Self::SubmitAtomSend { uuid, .. }
            | Self::SubmitAtomReceived { uuid, .. }
            | Self::SubmitAtomStatus { uuid, .. }
            | Self::SubmitAtomCompleted { uuid, .. }
            | Self::FetchAtomsRequest { uuid, .. }
            | Self::FetchAtomsSubscribe { uuid, .. }
            | Self::FetchAtomsObservation { uuid, .. }
            | Self::FetchAtomsCancel { uuid, .. } => Some(uuid),
            Self::FindANodeResult { request, .. } => request.subscriber_id(),
            _ => None,
        }
    }

    /// The node whose channel must be connected before this action can be
    /// carried out.
    pub fn requires_connection(&self) -> Option<&Node> {
        match self {
            Self::GetNodeInfoRequest { node }
            | Self::GetUniverseConfigRequest { node }
            | Self::GetLivePeersRequest { node }
            | Self::FindANodeResult { node, .. }
            | Self::SubmitAtomSend { node, .. } => Some(node),
            _ => None,
        }
    }

    /// The node an RPC round-trip just finished against.
    pub fn completes_rpc(&self) -> Option<&Node> {
        match self {
            Self::GetNodeInfoResult { node, .. }
            | Self::GetNodeInfoError { node, .. }
            | Self::GetUniverseConfigResult { node, .. }
            | Self::GetUniverseConfigError { node, .. }
            | Self::GetLivePeersResult { node, .. }
            | Self::GetLivePeersError { node, .. } => Some(node),
            Self::SubmitAtomCompleted { node, .. } => node.as_ref(),
            _ => None,
        }
    }
}
