use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::types::{AgentStatus, Node};

/// Why a status probe did not produce an [`AgentStatus`].
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("node has no API key configured")]
    MissingApiKey,

    #[error("agent request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("agent responded with HTTP {0}")]
    Status(StatusCode),

    #[error("agent returned an unreadable status body: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Why the best-effort instance purge failed.
#[derive(Debug, thiserror::Error)]
pub enum PurgeError {
    #[error("node has no API key configured")]
    MissingApiKey,

    #[error("purge request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("agent rejected purge with HTTP {0}")]
    Status(StatusCode),
}

/// Client for the HTTP API exposed by node agents.
///
/// Agents authenticate the panel with basic auth: a fixed username shared by
/// the whole fleet and the node's own API key as the password.
#[derive(Clone)]
pub struct AgentClient {
    client: reqwest::Client,
    username: Arc<str>,
    probe_timeout: Duration,
    purge_timeout: Duration,
}

impl AgentClient {
    pub fn new(username: &str, probe_timeout: Duration, purge_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build agent HTTP client")?;

        Ok(Self {
            client,
            username: Arc::from(username),
            probe_timeout,
            purge_timeout,
        })
    }

    /// GET / on the agent.
    pub async fn probe(&self, node: &Node) -> Result<AgentStatus, ProbeError> {
        let api_key = node.api_key.as_deref().ok_or(ProbeError::MissingApiKey)?;
        let url = format!("{}/", node.agent_url());
        debug!("Probing node {} at {}", node.id, url);

        let resp = self
            .client
            .get(&url)
            .basic_auth(&*self.username, Some(api_key))
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(ProbeError::Transport)?;

        if !resp.status().is_success() {
            return Err(ProbeError::Status(resp.status()));
        }

        resp.json::<AgentStatus>().await.map_err(ProbeError::Decode)
    }

    /// GET /instances/purge/all on the agent.
    pub async fn purge_instances(&self, node: &Node) -> Result<(), PurgeError> {
        let api_key = node.api_key.as_deref().ok_or(PurgeError::MissingApiKey)?;
        let url = format!("{}/instances/purge/all", node.agent_url());
        debug!("Purging instances on node {} at {}", node.id, url);

        let resp = self
            .client
            .get(&url)
            .basic_auth(&*self.username, Some(api_key))
            .timeout(self.purge_timeout)
            .send()
            .await
            .map_err(PurgeError::Transport)?;

        if !resp.status().is_success() {
            return Err(PurgeError::Status(resp.status()));
        }

        Ok(())
    }
}
