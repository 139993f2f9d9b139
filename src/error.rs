//! Transport-independent error kinds shared by the coordinator and the
//! DataNode storage worker, plus their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum DfsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Exists(String),

    #[error("parent directory missing: {0}")]
    ParentMissing(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient capacity: {0}")]
    InsufficientCapacity(String),

    #[error("node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("durability failure: {0}")]
    Durability(String),

    #[error("data loss: {0}")]
    DataLoss(String),
}

impl DfsError {
    fn status(&self) -> StatusCode {
        match self {
            DfsError::NotFound(_) => StatusCode::NOT_FOUND,
            DfsError::Exists(_) => StatusCode::CONFLICT,
            DfsError::ParentMissing(_) => StatusCode::NOT_FOUND,
            DfsError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            DfsError::InsufficientCapacity(_) => StatusCode::OK,
            DfsError::NodeUnavailable(_) => StatusCode::BAD_GATEWAY,
            DfsError::Integrity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DfsError::Durability(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DfsError::DataLoss(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DfsError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub type DfsResult<T> = Result<T, DfsError>;
