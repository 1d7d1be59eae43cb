//! Error responses for the panel routes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error};

use crate::api::form::ValidationError;
use crate::services::node_deletion::DeleteNodeError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Create/update form is incomplete or malformed.
    #[error("Form validation failure.")]
    Validation,

    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Node not found")]
    NotFound,

    #[error("There are instances on the node")]
    HasInstances,

    /// Update of a node that does not exist; answered with an empty body.
    #[error("Unknown node")]
    UnknownNode,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        debug!("Rejecting node form: {}", e);
        ApiError::Validation
    }
}

impl From<DeleteNodeError> for ApiError {
    fn from(e: DeleteNodeError) -> Self {
        match e {
            DeleteNodeError::NotFound(_) => ApiError::NotFound,
            DeleteNodeError::HasInstances { .. } => ApiError::HasInstances,
            DeleteNodeError::Storage(e) => ApiError::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            ApiError::UnknownNode => StatusCode::BAD_REQUEST.into_response(),
            ApiError::MissingField(_) | ApiError::HasInstances => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
