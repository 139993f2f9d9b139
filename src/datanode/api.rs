//! DataNode request surface: chunk put/get/delete/exists/list plus the
//! peer-to-peer replicate command (spec.md §6, DataNode table).

use std::sync::Arc;

use axum::body::Bytes as AxumBytes;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::datanode::replication_worker::ReplicateTargetAddr;
use crate::datanode::state::DataNodeState;
use crate::error::{DfsError, DfsResult};

pub fn router(state: DataNodeState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chunks", get(list_chunks))
        .route(
            "/chunks/:chunk_id",
            put(put_chunk).get(get_chunk).delete(delete_chunk),
        )
        .route("/chunks/:chunk_id/exists", get(exists_chunk))
        .route("/replicate", post(replicate))
        .with_state(Arc::new(state))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn put_chunk(
    State(state): State<Arc<DataNodeState>>,
    AxumPath(chunk_id): AxumPath<String>,
    body: AxumBytes,
) -> DfsResult<Json<Value>> {
    let (size, checksum) = state.storage.put(&chunk_id, body.into()).await?;
    Ok(Json(json!({ "size": size, "checksum": checksum })))
}

async fn get_chunk(
    State(state): State<Arc<DataNodeState>>,
    AxumPath(chunk_id): AxumPath<String>,
) -> DfsResult<impl IntoResponse> {
    let bytes = state.storage.get(&chunk_id).await?;
    Ok((StatusCode::OK, bytes.to_vec()))
}

async fn delete_chunk(
    State(state): State<Arc<DataNodeState>>,
    AxumPath(chunk_id): AxumPath<String>,
) -> DfsResult<Json<Value>> {
    state.storage.delete(&chunk_id).await?;
    Ok(Json(json!({ "message": "deleted" })))
}

async fn exists_chunk(
    State(state): State<Arc<DataNodeState>>,
    AxumPath(chunk_id): AxumPath<String>,
) -> DfsResult<StatusCode> {
    if state.storage.exists(&chunk_id).await {
        Ok(StatusCode::OK)
    } else {
        Err(DfsError::NotFound(chunk_id))
    }
}

async fn list_chunks(State(state): State<Arc<DataNodeState>>) -> DfsResult<Json<Value>> {
    let ids = state.storage.list_chunk_ids().await?;
    Ok(Json(json!({ "count": ids.len(), "chunks": ids })))
}

#[derive(Deserialize)]
struct ReplicateRequest {
    chunk_id: String,
    target_nodes: Vec<ReplicateTargetAddr>,
}

async fn replicate(
    State(state): State<Arc<DataNodeState>>,
    Json(req): Json<ReplicateRequest>,
) -> Json<Value> {
    state.replication.enqueue(req.chunk_id, req.target_nodes).await;
    Json(json!({ "status": "queued" }))
}
