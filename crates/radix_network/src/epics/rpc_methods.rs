//! Carries out the read-only node requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::warn;

use crate::action::NodeAction;
use crate::epics::{Epic, EpicContext, ensure_connected};
use crate::error::NetworkError;
use crate::node::{Node, NodeInfo};
use crate::rpc::RadixJsonRpcClient;
use crate::transport::WebSockets;

/// Answers `GetNodeInfoRequest`, `GetUniverseConfigRequest` and
/// `GetLivePeersRequest` with the matching result or error action.
pub struct RpcMethodsEpic {
    sockets: Arc<WebSockets>,
    rpc_timeout: Duration,
}

impl RpcMethodsEpic {
    pub fn new(sockets: Arc<WebSockets>, rpc_timeout: Duration) -> Self {
        Self {
            sockets,
            rpc_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Method {
    NodeInfo,
    UniverseConfig,
    LivePeers,
}

#[async_trait]
impl Epic for RpcMethodsEpic {
    fn name(&self) -> &'static str {
        "rpc_methods"
    }

    async fn run(&self, mut ctx: EpicContext) {
        let mut calls = JoinSet::new();

        loop {
            tokio::select! {
                action = ctx.actions.recv() => {
                    let Some(action) = action else { break };
                    let (node, method) = match action {
                        NodeAction::GetNodeInfoRequest { node } => (node, Method::NodeInfo),
                        NodeAction::GetUniverseConfigRequest { node } => (node, Method::UniverseConfig),
                        NodeAction::GetLivePeersRequest { node } => (node, Method::LivePeers),
                        _ => continue,
                    };
                    let client = RadixJsonRpcClient::new(
                        self.sockets.get_or_create(&node),
                        self.rpc_timeout,
                    );
                    calls.spawn(execute(client, method, ctx.output.clone()));
                }
                Some(_) = calls.join_next(), if !calls.is_empty() => {}
            }
        }
    }
}

async fn execute(
    client: RadixJsonRpcClient,
    method: Method,
    output: mpsc::UnboundedSender<NodeAction>,
) {
    let _listener = client.socket().listen();
    let node = client.node().clone();

    let action = match ensure_connected(client.socket(), &output, client.timeout()).await {
        Err(e) => error_action(node, method, e),
        Ok(()) => match method {
            Method::NodeInfo => match client.get_info().await {
                Ok(info) => match check_host(&node, info) {
                    Ok(info) => NodeAction::GetNodeInfoResult { node, info },
                    Err(reason) => NodeAction::GetNodeInfoError { node, reason },
                },
                Err(e) => error_action(node, method, e),
            },
            Method::UniverseConfig => match client.get_universe().await {
                Ok(config) => NodeAction::GetUniverseConfigResult { node, config },
                Err(e) => error_action(node, method, e),
            },
            Method::LivePeers => match client.get_live_peers().await {
                Ok(peers) => NodeAction::GetLivePeersResult { node, peers },
                Err(e) => error_action(node, method, e),
            },
        },
    };
    let _ = output.send(action);
}

fn error_action(node: Node, method: Method, error: NetworkError) -> NodeAction {
    warn!(node = %node, ?method, "Node request failed: {error}");
    let reason = error.to_string();
    match method {
        Method::NodeInfo => NodeAction::GetNodeInfoError { node, reason },
        Method::UniverseConfig => NodeAction::GetUniverseConfigError { node, reason },
        Method::LivePeers => NodeAction::GetLivePeersError { node, reason },
    }
}

/// A node claiming a different host than the one we reach it at would break
/// the state invariant, so it is reported as a failed request instead.
fn check_host(node: &Node, info: NodeInfo) -> Result<NodeInfo, String> {
    match info.host.as_deref() {
        Some(host) if !host.eq_ignore_ascii_case(node.host()) => {
            warn!(node = %node, reported = host, "Node reported a different host");
            Err(format!("{node} reported host {host}"))
        }
        _ => Ok(info),
    }
}
