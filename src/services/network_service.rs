use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use tracing::debug;

use crate::graph_io::{csv_io, json_io};
use crate::network::LoadedNetwork;

/// Source of networks that are not yet loaded into a merge session
#[async_trait]
pub trait NetworkLoader: Send + Sync {
    async fn load_network(&self, network_id: &str) -> Result<LoadedNetwork>;
}

/// Loads networks from a network data service over HTTP
pub struct HttpNetworkLoader {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpNetworkLoader {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn network_url(&self, network_id: &str) -> String {
        format!("{}/networks/{}", self.base_url, network_id)
    }
}

#[async_trait]
impl NetworkLoader for HttpNetworkLoader {
    async fn load_network(&self, network_id: &str) -> Result<LoadedNetwork> {
        let url = self.network_url(network_id);
        debug!("Fetching network {} from {}", network_id, url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = server_message(&body).unwrap_or_else(|| status.to_string());
            return Err(anyhow!("{} ({})", message, status));
        }

        let network = response
            .json::<LoadedNetwork>()
            .await
            .with_context(|| format!("Invalid network payload for {}", network_id))?;
        Ok(network)
    }
}

/// Error message of a service error body, e.g. `{"message": "..."}`
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "errorMessage", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

/// Loads `<id>.json` bundles, or `<id>_nodes.csv` and `<id>_edges.csv`, from a directory
pub struct DirectoryNetworkLoader {
    dir: PathBuf,
}

impl DirectoryNetworkLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl NetworkLoader for DirectoryNetworkLoader {
    async fn load_network(&self, network_id: &str) -> Result<LoadedNetwork> {
        let json_path = self.dir.join(format!("{}.json", network_id));
        let network = if json_path.exists() {
            json_io::import_network(&json_path)
                .with_context(|| format!("Failed to read {}", json_path.display()))?
        } else {
            debug!("No JSON bundle for {}, trying CSV tables", network_id);
            csv_io::import_network(&self.dir.join(network_id))
                .with_context(|| format!("No network {} in {}", network_id, self.dir.display()))?
        };
        Ok(network)
    }
}
