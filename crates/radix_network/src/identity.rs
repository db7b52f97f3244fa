//! Subscriber identity: correlation ids for long-lived RPC subscriptions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Correlates a long-lived RPC subscription (atom stream, atom-status
/// stream) with the logical operation that owns it.
///
/// A fresh id is created per submission or fetch and travels on every
/// action that operation produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    /// Generate a new random subscriber ID (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create a SubscriberId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Return the inner string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
