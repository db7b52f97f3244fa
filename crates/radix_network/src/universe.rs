//! Universe configuration: which network a node belongs to.

use serde::{Deserialize, Serialize};

/// Identifies a specific network instance (its genesis).
///
/// Two nodes are in the same universe iff their configs are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseConfig {
    pub name: String,
    pub magic: i64,
    pub port: u16,
    pub timestamp: i64,
    #[serde(default)]
    pub genesis: Vec<String>,
}

impl UniverseConfig {
    /// Whether a node reporting `other` belongs to this universe.
    pub fn is_compatible(&self, other: &UniverseConfig) -> bool {
        self == other
    }
}
