//! Ledger payloads as seen by the orchestration layer.
//!
//! Atoms are opaque here: the layer only needs their id (to ask for status)
//! and the shards they touch (to pick a node). Everything else rides along
//! in `payload` and is handed back to callers untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shard::{Shard, Shards};

/// Content-derived atom identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomId(String);

impl AtomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed ledger update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub aid: AtomId,
    pub shards: Shards,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Atom {
    pub fn new(aid: AtomId, shards: Shards, payload: serde_json::Value) -> Self {
        Self {
            aid,
            shards,
            payload,
        }
    }
}

/// An account address. The shard is fixed by the address' key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub value: String,
    pub shard: Shard,
}

impl Address {
    pub fn new(value: impl Into<String>, shard: Shard) -> Self {
        Self {
            value: value.into(),
            shard,
        }
    }

    pub fn shards(&self) -> Shards {
        Shards::single(self.shard)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Ledger status of an atom as reported by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AtomStatus {
    DoesNotExist,
    EvictedInvalidAtom,
    EvictedConflictingAtom,
    EvictedFailedCmVerification,
    PendingCmVerification,
    PendingDependencyVerification,
    MissingDependency,
    ConflictLoser,
    Stored,
}

impl AtomStatus {
    /// Statuses after which the atom can never become stored.
    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            Self::EvictedInvalidAtom
                | Self::EvictedConflictingAtom
                | Self::EvictedFailedCmVerification
                | Self::ConflictLoser
        )
    }
}

/// A status push for an atom-status subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomStatusNotification {
    pub subscriber_id: crate::identity::SubscriberId,
    pub status: AtomStatus,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// A timestamped fact about ledger state seen through one node's atom
/// subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AtomObservation {
    Store {
        atom: Atom,
        is_soft: bool,
        received_at: DateTime<Utc>,
    },
    Delete {
        atom: Atom,
        is_soft: bool,
        received_at: DateTime<Utc>,
    },
    /// The subscription has caught up with the node's current view.
    Head { received_at: DateTime<Utc> },
}

impl AtomObservation {
    pub fn stored(atom: Atom, is_soft: bool) -> Self {
        Self::Store {
            atom,
            is_soft,
            received_at: Utc::now(),
        }
    }

    pub fn deleted(atom: Atom, is_soft: bool) -> Self {
        Self::Delete {
            atom,
            is_soft,
            received_at: Utc::now(),
        }
    }

    pub fn head() -> Self {
        Self::Head {
            received_at: Utc::now(),
        }
    }

    pub fn atom(&self) -> Option<&Atom> {
        match self {
            Self::Store { atom, .. } | Self::Delete { atom, .. } => Some(atom),
            Self::Head { .. } => None,
        }
    }

    pub fn is_head(&self) -> bool {
        matches!(self, Self::Head { .. })
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        match self {
            Self::Store { received_at, .. }
            | Self::Delete { received_at, .. }
            | Self::Head { received_at } => *received_at,
        }
    }
}
