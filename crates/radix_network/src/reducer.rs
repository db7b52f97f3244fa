//! The network state reducer.

use crate::action::NodeAction;
use crate::error::StateError;
use crate::state::{RadixNetworkState, RadixNodeState, WebSocketStatus};

/// Fold one action into the network state.
///
/// Pure: the input state is never modified. Only actions that carry node
/// data change anything; merges are last-write-wins per field, so applying
/// the same result twice yields the same state.
pub fn reduce(
    state: &RadixNetworkState,
    action: &NodeAction,
) -> Result<RadixNetworkState, StateError> {
    match action {
        NodeAction::GetNodeInfoResult { node, info } => {
            let current = state
                .get(node)
                .cloned()
                .unwrap_or_else(|| RadixNodeState::disconnected(node.clone()));
            Ok(state.with_node(current.with_info(info.clone())?))
        }

        NodeAction::GetUniverseConfigResult { node, config } => {
            let current = state
                .get(node)
                .cloned()
                .unwrap_or_else(|| RadixNodeState::disconnected(node.clone()));
            Ok(state.with_node(current.with_universe_config(config.clone())))
        }

        NodeAction::AddNode { node, info } => match (state.get(node), info) {
            (Some(_), None) => Ok(state.clone()),
            (Some(current), Some(info)) => Ok(state.with_node(current.with_info(info.clone())?)),
            (None, info) => Ok(state.with_node(RadixNodeState::new(
                node.clone(),
                WebSocketStatus::Disconnected,
                info.clone(),
                None,
            )?)),
        },

        NodeAction::WebSocketEvent { node, status } => {
            let current = state
                .get(node)
                .ok_or_else(|| StateError::UnknownNode(node.clone()))?;
            Ok(state.with_node(current.with_status(*status)))
        }

        _ => Ok(state.clone()),
    }
}
