//! Node removal, optionally cascading to the instances placed on it.
//!
//! The cascade runs as a fixed sequence of steps with no rollback:
//!
//! 1. take the node's instances out of the global `instances` list
//! 2. delete each standalone `<id>_instance` record
//! 3. drop each instance from its owner's `<user>_instances` index
//! 4. ask the agent to purge its instances (best effort)
//! 5. delete the node record and its `nodes` entry
//!
//! A storage failure aborts the sequence where it happened; everything done
//! before that point stays applied. A purge failure is recorded in the
//! [`DeletionReport`] and the sequence continues.

use tracing::{info, warn};

use crate::agent_http::AgentClient;
use crate::db::{execute_async, DbPool};
use crate::services::{instance_registry, node_registry};
use crate::types::{DeletionReport, Node, PurgeOutcome};

#[derive(Debug, thiserror::Error)]
pub enum DeleteNodeError {
    #[error("node {0} not found")]
    NotFound(String),

    #[error("node {node_id} still hosts {count} instance(s)")]
    HasInstances { node_id: String, count: usize },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Delete a node. With `cascade` unset, a node that still hosts instances is
/// refused and nothing is modified.
pub async fn delete_node(
    db: &DbPool,
    agent: &AgentClient,
    node_id: &str,
    cascade: bool,
) -> Result<DeletionReport, DeleteNodeError> {
    let lookup_id = node_id.to_string();
    let (node, count) = execute_async(db, move |conn| {
        let node = node_registry::find_listed_node(conn, &lookup_id)?;
        let count = instance_registry::list_instances(conn)?
            .iter()
            .filter(|i| i.node.id == lookup_id)
            .count();
        Ok((node, count))
    })
    .await?;

    let node = node.ok_or_else(|| DeleteNodeError::NotFound(node_id.to_string()))?;

    let mut report = DeletionReport {
        instances_removed: Vec::new(),
        user_indexes_updated: Vec::new(),
        purge: PurgeOutcome::Skipped,
    };

    if count > 0 {
        if !cascade {
            return Err(DeleteNodeError::HasInstances {
                node_id: node.id,
                count,
            });
        }
        cascade_instances(db, agent, &node, &mut report).await?;
    }

    let remove_id = node.id.clone();
    execute_async(db, move |conn| node_registry::remove_node(conn, &remove_id)).await?;

    info!(
        "Node deleted: node_id={}, instances_removed={}, purge={:?}",
        node.id,
        report.instances_removed.len(),
        report.purge
    );
    Ok(report)
}

async fn cascade_instances(
    db: &DbPool,
    agent: &AgentClient,
    node: &Node,
    report: &mut DeletionReport,
) -> anyhow::Result<()> {
    let node_id = node.id.clone();
    let (removed, updated_users) = execute_async(db, move |conn| {
        let removed = instance_registry::take_node_instances(conn, &node_id)?;

        for instance in &removed {
            instance_registry::delete_instance_record(conn, &instance.id)?;
        }

        let mut updated_users = Vec::new();
        for instance in &removed {
            if instance_registry::remove_from_user_index(conn, &instance.user, &instance.id)?
                && !updated_users.contains(&instance.user)
            {
                updated_users.push(instance.user.clone());
            }
        }

        Ok((removed, updated_users))
    })
    .await?;

    report.instances_removed = removed.into_iter().map(|i| i.id).collect();
    report.user_indexes_updated = updated_users;

    report.purge = match agent.purge_instances(node).await {
        Ok(()) => PurgeOutcome::Purged,
        Err(e) => {
            warn!("Failed to purge instances on node {}: {}", node.id, e);
            PurgeOutcome::Failed
        }
    };

    Ok(())
}
