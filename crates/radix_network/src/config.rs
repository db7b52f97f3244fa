//! Network configuration for the controller and its epics.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::NetworkError;
use crate::node::Node;
use crate::selector::PeerSelectorKind;
use crate::universe::UniverseConfig;

/// Configuration for the network orchestration layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Bootstrap node URLs.
    pub seeds: Vec<String>,

    /// The universe nodes must belong to. `None` accepts any universe.
    pub universe: Option<UniverseConfig>,

    /// Maximum number of channels in the `connecting` state at once.
    pub max_simultaneous_connection_requests: usize,

    /// How long a channel is kept open after its last RPC result.
    #[serde(with = "duration_ms")]
    pub auto_close_grace: Duration,

    /// Wall-clock limit on an atom submission, measured from the request.
    #[serde(with = "duration_ms")]
    pub submit_timeout: Duration,

    /// Timeout for establishing a WebSocket connection.
    #[serde(with = "duration_ms")]
    pub connection_timeout: Duration,

    /// Timeout for a single JSON-RPC request/response round-trip.
    #[serde(with = "duration_ms")]
    pub rpc_timeout: Duration,

    /// How a node is picked among equally suitable candidates.
    pub peer_selector: PeerSelectorKind,

    /// Capacity of each channel's inbound message buffer.
    pub message_buffer: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            universe: None,
            max_simultaneous_connection_requests: 2,
            auto_close_grace: Duration::from_secs(5),
            submit_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            rpc_timeout: Duration::from_secs(30),
            peer_selector: PeerSelectorKind::Random,
            message_buffer: 256,
        }
    }
}

impl NetworkConfig {
    /// Parse the seed URLs.
    pub fn seed_nodes(&self) -> Result<Vec<Node>, NetworkError> {
        self.seeds.iter().map(|s| Node::parse(s)).collect()
    }

    /// Save the config to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), NetworkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load config from a JSON file, or return defaults if the file is
    /// missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str::<NetworkConfig>(&data) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Corrupt config file, using defaults: {e}");
                    }
                },
                Err(e) => {
                    tracing::warn!("Cannot read config file, using defaults: {e}");
                }
            }
        }
        Self::default()
    }

    /// Load config from a JSON file, failing if it is missing or invalid.
    pub fn load(path: &Path) -> Result<Self, NetworkError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| NetworkError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| NetworkError::Config(format!("{}: {e}", path.display())))
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(dur: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(dur.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
