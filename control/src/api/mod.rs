pub mod actor;
pub mod error;
pub mod form;
pub mod nodes;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::types::HealthResponse;
use nodes::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Node management
        .route("/admin/nodes", get(nodes::list_nodes))
        .route("/nodes/create", post(nodes::create_node))
        .route("/nodes/delete", post(nodes::delete_node))
        .route(
            "/admin/node/:id",
            get(nodes::get_node).post(nodes::update_node),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// GET /health - Health check endpoint
async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}
