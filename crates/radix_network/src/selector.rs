//! Peer selection strategies.

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::node::Node;

/// Picks one node out of a non-empty candidate list.
///
/// Candidates are always passed in sorted order, so the selector is the only
/// source of non-determinism in node selection.
pub trait PeerSelector: Send + Sync {
    fn select(&self, candidates: &[Node]) -> Option<Node>;
}

/// Uniform random choice.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl PeerSelector for RandomSelector {
    fn select(&self, candidates: &[Node]) -> Option<Node> {
        candidates.choose(&mut rand::rng()).cloned()
    }
}

/// Always the first candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstSelector;

impl PeerSelector for FirstSelector {
    fn select(&self, candidates: &[Node]) -> Option<Node> {
        candidates.first().cloned()
    }
}

/// Serializable choice of selector for [`NetworkConfig`](crate::NetworkConfig).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerSelectorKind {
    #[default]
    Random,
    First,
}

impl PeerSelectorKind {
    pub fn build(self) -> Box<dyn PeerSelector> {
        match self {
            Self::Random => Box::new(RandomSelector),
            Self::First => Box::new(FirstSelector),
        }
    }
}
