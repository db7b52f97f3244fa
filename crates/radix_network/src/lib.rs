//! Radix Network: node orchestration for Radix ledger clients.
//!
//! This crate keeps track of the nodes of one Radix universe, connects to
//! the ones a request needs, and drives atom submissions and atom fetches
//! against them over JSON-RPC.
//!
//! # Architecture
//!
//! - **State**: an immutable [`RadixNetworkState`] mapping each known
//!   [`Node`] to its channel status, declared info and universe.
//! - **Actions**: the closed [`NodeAction`] enum. Every change to the
//!   network goes through one; [`reducer::reduce`] folds them into state.
//! - **Epics**: long-running workflows ([`epics`]) that react to actions and
//!   state by emitting further actions: discovery, node selection,
//!   connection management, RPC calls, submission and fetching.
//! - **Controller**: [`RadixNetworkController`] runs the action bus and the
//!   epics and exposes the action and state streams.
//! - **Transport**: WebSocket channels (via `tokio-tungstenite`) shared
//!   between users by listener count, plus a `reqwest` HTTP client for seed
//!   handshakes.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use radix_network::{NetworkConfig, NodeAction, RadixNetworkController};
//! use radix_network::atom::{Atom, AtomId};
//! use radix_network::shard::Shards;
//!
//! # async fn example() -> Result<(), radix_network::NetworkError> {
//! let config = NetworkConfig {
//!     seeds: vec!["wss://seed.example.com".to_string()],
//!     ..NetworkConfig::default()
//! };
//! let controller = RadixNetworkController::new(config)?;
//! let mut actions = controller.actions();
//!
//! let atom = Atom::new(AtomId::new("aid"), Shards::single(42), serde_json::json!({}));
//! controller.dispatch(NodeAction::submit_atom_store_only(atom));
//!
//! while let Some(action) = actions.recv().await {
//!     if let NodeAction::SubmitAtomCompleted { result, .. } = action {
//!         println!("submission finished: {result:?}");
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod atom;
pub mod config;
pub mod controller;
pub mod epics;
pub mod error;
pub mod identity;
pub mod logging;
pub mod node;
pub mod reducer;
pub mod rpc;
pub mod selector;
pub mod shard;
pub mod state;
pub mod transport;
pub mod universe;

// ── Re-exports for convenience ──────────────────────────────────────────

pub use action::{NodeAction, SubmitAtomFailure, SubmitAtomResult};
pub use config::NetworkConfig;
pub use controller::{RadixNetworkController, RadixNetworkControllerBuilder};
pub use error::{NetworkError, RpcError, StateError};
pub use identity::SubscriberId;
pub use node::{Node, NodeInfo};
pub use selector::{FirstSelector, PeerSelector, PeerSelectorKind, RandomSelector};
pub use state::{RadixNetworkState, RadixNodeState, WebSocketStatus};
pub use universe::UniverseConfig;
