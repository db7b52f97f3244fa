//! JSON-RPC 2.0 wire types.

use serde::{Deserialize, Serialize};

use crate::error::RpcError;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A server push (no id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

impl JsonRpcNotification {
    /// The `subscriberId` the push is addressed to, if any.
    pub fn subscriber_id(&self) -> Option<&str> {
        self.params.get("subscriberId").and_then(|v| v.as_str())
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: u64,
}

impl JsonRpcResponse {
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: u64, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// The result, or the error object the node sent.
    ///
    /// A response with neither is treated as a `null` result.
    pub fn into_result(self) -> Result<serde_json::Value, RpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// An inbound frame that could be a response or a notification.
///
/// Parsed with `id` optional: without an id it is a notification, with one
/// it is a response.
#[derive(Debug, Clone, Deserialize)]
pub struct RawJsonRpcMessage {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<u64>,
    pub method: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub params: Option<serde_json::Value>,
}

impl RawJsonRpcMessage {
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.is_some()
    }

    pub fn into_response(self) -> Option<JsonRpcResponse> {
        let id = self.id?;
        Some(JsonRpcResponse {
            jsonrpc: self.jsonrpc,
            result: self.result,
            error: self.error,
            id,
        })
    }

    pub fn into_notification(self) -> Option<JsonRpcNotification> {
        if self.id.is_some() {
            return None;
        }
        let method = self.method?;
        Some(JsonRpcNotification {
            jsonrpc: self.jsonrpc,
            method,
            params: self.params.unwrap_or(serde_json::Value::Null),
        })
    }
}

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Method names understood by Radix nodes.
pub mod methods {
    pub const GET_LIVE_PEERS: &str = "Network.getLivePeers";
    pub const GET_INFO: &str = "Network.getInfo";
    pub const GET_UNIVERSE: &str = "Universe.getUniverse";
    pub const SUBMIT_ATOM: &str = "Universe.submitAtom";
    pub const GET_ATOM_STATUS: &str = "Atoms.getAtomStatus";
    pub const GET_ATOM_STATUS_NOTIFICATIONS: &str = "Atoms.getAtomStatusNotifications";
    pub const CLOSE_ATOM_STATUS_NOTIFICATIONS: &str = "Atoms.closeAtomStatusNotifications";
    pub const SUBSCRIBE_ATOMS: &str = "Atoms.subscribe";
    pub const CANCEL_ATOMS: &str = "Atoms.cancel";

    // Notifications
    pub const ATOM_STATUS_NOTIFICATION: &str = "AtomStatus.notification";
    pub const ATOMS_SUBSCRIBE_UPDATE: &str = "Atoms.subscribeUpdate";
}
