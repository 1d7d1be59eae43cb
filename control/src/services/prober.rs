use anyhow::Result;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::agent_http::{AgentClient, ProbeError};
use crate::db::{execute_async, DbPool};
use crate::services::node_registry;
use crate::types::{AgentStatus, Node, NodeStatus};

/// Fold a probe outcome into the node's status fields.
///
/// Success copies the agent's version and remote fields and marks the node
/// `Online`. Any failure marks it `Offline` and leaves every other field as
/// it was.
pub fn apply_probe(node: &mut Node, outcome: Result<AgentStatus, ProbeError>) {
    match outcome {
        Ok(status) => {
            debug!(
                "Node {} is online: agent_online={}, docker={}",
                node.id,
                status.online,
                status.docker.is_some()
            );
            node.status = NodeStatus::Online;
            node.version_family = Some(status.version_family);
            node.version_release = Some(status.version_release);
            node.remote = status.remote;
        }
        Err(e @ ProbeError::MissingApiKey) => {
            debug!("Node {} not probed: {}", node.id, e);
            node.status = NodeStatus::Offline;
        }
        Err(e) => {
            warn!("Node {} is offline: {}", node.id, e);
            node.status = NodeStatus::Offline;
        }
    }
}

/// Probe a node's agent and persist the refreshed status.
///
/// Probe failures never surface here; only a storage failure does.
pub async fn check_node_status(db: &DbPool, agent: &AgentClient, mut node: Node) -> Result<Node> {
    let outcome = agent.probe(&node).await;
    apply_probe(&mut node, outcome);

    execute_async(db, move |conn| node_registry::store_probe_result(conn, &node)).await
}

/// Probe every node concurrently. The result keeps the input order.
pub async fn check_all(db: &DbPool, agent: &AgentClient, nodes: Vec<Node>) -> Result<Vec<Node>> {
    join_all(
        nodes
            .into_iter()
            .map(|node| check_node_status(db, agent, node)),
    )
    .await
    .into_iter()
    .collect()
}
