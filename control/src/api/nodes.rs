use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use tracing::info;

use crate::{
    agent_http::AgentClient,
    api::{error::ApiError, form::FormOrJson},
    db::{execute_async, DbPool},
    services::{audit, instance_registry, node_deletion, node_registry, prober, settings},
    types::{
        Actor, DeleteNodeQuery, DeleteNodeRequest, DeleteNodeResponse, ListNodesResponse, Node,
        NodeDetailResponse, NodeForm,
    },
};
use std::sync::Arc;

pub struct AppState {
    pub db: DbPool,
    pub agent: AgentClient,
    /// Shown when no `name` has been stored.
    pub panel_name: String,
}

/// GET /admin/nodes - List all nodes with live status and instance counts
pub async fn list_nodes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListNodesResponse>, ApiError> {
    let default_name = state.panel_name.clone();

    let (nodes, instance_counts, panel) = execute_async(&state.db, move |conn| {
        let node_ids = node_registry::list_node_ids(conn)?;
        let instances = instance_registry::list_instances(conn)?;
        let counts = instance_registry::instance_counts(&node_ids, &instances);
        let nodes = node_registry::load_nodes(conn, &node_ids)?;
        let panel = settings::panel_info(conn, &default_name)?;
        Ok((nodes, counts, panel))
    })
    .await?;

    let nodes = prober::check_all(&state.db, &state.agent, nodes)
        .await?
        .into_iter()
        .map(Node::without_configure_key)
        .collect();

    Ok(Json(ListNodesResponse {
        nodes,
        instance_counts,
        panel,
    }))
}

/// POST /nodes/create - Create a new, unconfigured node
pub async fn create_node(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    FormOrJson(form): FormOrJson<NodeForm>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let spec = form.validate()?;

    info!(
        "Creating node: name={}, address={}:{}",
        spec.name, spec.address, spec.port
    );

    let node = execute_async(&state.db, move |conn| node_registry::create_node(conn, &spec)).await?;

    info!("Node created: node_id={}", node.id);
    audit::record(&state.db, &actor, audit::NODE_CREATE).await;

    Ok((StatusCode::CREATED, Json(node)))
}

/// POST /nodes/delete - Delete a node, optionally with its instances
pub async fn delete_node(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<DeleteNodeQuery>,
    FormOrJson(req): FormOrJson<DeleteNodeRequest>,
) -> Result<Json<DeleteNodeResponse>, ApiError> {
    let node_id = req
        .node_id
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingField("nodeId"))?;

    info!(
        "Deleting node: node_id={}, cascade={}",
        node_id,
        query.cascade()
    );

    let report =
        node_deletion::delete_node(&state.db, &state.agent, &node_id, query.cascade()).await?;

    audit::record(&state.db, &actor, audit::NODE_DELETE).await;

    Ok(Json(DeleteNodeResponse {
        success: true,
        cascade: report,
    }))
}

/// GET /admin/node/:id - Node detail, or back to the list if it is gone
pub async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
) -> Result<Response, ApiError> {
    let default_name = state.panel_name.clone();

    let found = execute_async(&state.db, move |conn| {
        let Some(node) = node_registry::get_node(conn, &node_id)? else {
            return Ok(None);
        };
        let panel = settings::panel_info(conn, &default_name)?;
        Ok(Some(NodeDetailResponse {
            node: node.without_configure_key(),
            panel,
        }))
    })
    .await?;

    Ok(match found {
        Some(detail) => Json(detail).into_response(),
        None => Redirect::to("/admin/nodes").into_response(),
    })
}

/// POST /admin/node/:id - Replace a node's settings and re-probe it
pub async fn update_node(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
    FormOrJson(form): FormOrJson<NodeForm>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let lookup_id = node_id.clone();
    let exists = execute_async(&state.db, move |conn| {
        Ok(node_registry::get_node(conn, &lookup_id)?.is_some())
    })
    .await?;
    if !exists {
        return Err(ApiError::UnknownNode);
    }

    let spec = form.validate()?;
    let api_key = form.api_key();

    info!("Updating node: node_id={}", node_id);

    let node = execute_async(&state.db, move |conn| {
        node_registry::replace_node(conn, &node_id, &spec, api_key)
    })
    .await?
    .ok_or(ApiError::UnknownNode)?;

    let node = prober::check_node_status(&state.db, &state.agent, node).await?;

    Ok((StatusCode::CREATED, Json(node)))
}
