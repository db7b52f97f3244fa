//! HTTP side channel to a node.
//!
//! Only used for the seed handshake: asking a seed which universe it
//! belongs to before it is tracked in network state.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::NetworkError;
use crate::node::Node;
use crate::universe::UniverseConfig;

/// Request/response calls against a node's HTTP API.
#[async_trait]
pub trait NodeHttpClient: Send + Sync {
    /// `GET /api/universe`.
    async fn get_universe(&self, node: &Node) -> Result<UniverseConfig, NetworkError>;
}

/// [`NodeHttpClient`] over reqwest.
pub struct ReqwestNodeHttpClient {
    client: reqwest::Client,
}

impl ReqwestNodeHttpClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }
}

#[async_trait]
impl NodeHttpClient for ReqwestNodeHttpClient {
    async fn get_universe(&self, node: &Node) -> Result<UniverseConfig, NetworkError> {
        let url = format!("{}/api/universe", node.http_url());

        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(NetworkError::Http(format!("{url}: {status} - {text}")));
        }

        Ok(resp.json::<UniverseConfig>().await?)
    }
}
