//! JSON-RPC access to Radix nodes.

pub mod client;
pub mod jsonrpc;

pub use client::RadixJsonRpcClient;
pub use jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RawJsonRpcMessage};
