//! Coordinator request surface: HTTP+JSON facade used by clients and
//! DataNodes (spec.md §6). Grounded in route/status shape on
//! `original_source/namenode/api.py`, in component wiring on
//! `master_impl.rs`'s `Master` trait methods.

use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::coordinator::state::AppState;
use crate::error::{DfsError, DfsResult};
use crate::metadata::{ChunkId, ChunkInfo, Path};
use crate::util::now_unix;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/datanodes/register", post(register_datanode))
        .route("/datanodes", get(list_datanodes))
        .route("/heartbeat", post(heartbeat))
        .route("/files", post(create_file))
        .route("/files/*path", get(get_file).delete(delete_file))
        .route("/directories", post(create_directory).get(list_root_directory))
        .route("/directories/*path", get(list_directory))
        .route("/chunks/allocate", post(allocate_chunk))
        .route("/chunks/:chunk_id/complete", post(complete_chunk))
        .route("/cluster/stats", get(cluster_stats))
        .with_state(Arc::new(state))
}

fn parse_dfs_path(raw: &str) -> DfsResult<Path> {
    let normalized = if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    };
    Path::parse(&normalized).map_err(DfsError::InvalidArgument)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[derive(Deserialize)]
struct RegisterRequest {
    node_id: String,
    host: String,
    port: u16,
}

async fn register_datanode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> DfsResult<Json<Value>> {
    let already_known = state.cluster.node(&req.node_id).await.is_some();
    let node = state
        .cluster
        .register(&req.node_id, &req.host, req.port)
        .await;

    if !already_known {
        tokio::spawn(reconcile_new_node(Arc::clone(&state), node.clone()));
    }

    Ok(Json(json!({ "status": "registered", "node_id": node.node_id })))
}

/// Pulls a just-(re-)registered node's `GET /chunks` listing and folds it
/// into the Cluster View, rebuilding the chunk<->node index after the
/// coordinator has restarted and forgotten it (spec.md §8 scenario f).
/// Only run for a node the cluster didn't already have an entry for, so a
/// live node's routine re-registration doesn't repeat the full listing
/// pull on every request.
async fn reconcile_new_node(state: Arc<AppState>, node: crate::cluster::NodeInfo) {
    let chunk_ids = match state.peer_client.list_chunks(&node).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(node_id = %node.node_id, error = %e, "failed to list chunks for index reconciliation");
            return;
        }
    };

    state.cluster.reconcile_node_chunks(&node.node_id, &chunk_ids).await;
    for chunk_id in &chunk_ids {
        let locations = state.cluster.locations(chunk_id).await;
        let _ = state
            .metadata
            .update_chunk_replicas(&ChunkId::from_string(chunk_id.clone()), locations)
            .await;
    }
    info!(node_id = %node.node_id, chunks = chunk_ids.len(), "reconciled chunk index from datanode listing");
}

async fn list_datanodes(State(state): State<Arc<AppState>>) -> Json<Value> {
    let nodes = state.cluster.snapshot_nodes().await;
    Json(json!({ "datanodes": nodes }))
}

#[derive(Deserialize)]
struct HeartbeatRequest {
    node_id: String,
    available_space: u64,
    used_space: u64,
    chunk_count: u64,
    #[allow(dead_code)]
    cpu_usage: Option<f64>,
    #[allow(dead_code)]
    memory_usage: Option<f64>,
    #[allow(dead_code)]
    timestamp: Option<u64>,
}

async fn heartbeat(State(state): State<Arc<AppState>>, Json(req): Json<HeartbeatRequest>) -> Json<Value> {
    state
        .cluster
        .update_stats(&req.node_id, req.available_space, req.used_space, req.chunk_count)
        .await;
    Json(json!({ "status": "ok", "timestamp": now_unix() }))
}

#[derive(Deserialize)]
struct CreateFileRequest {
    path: String,
    #[serde(default, alias = "R")]
    replication_factor: Option<usize>,
}

#[derive(Serialize)]
struct FileResponse {
    path: String,
    size: u64,
    created_at: u64,
    modified_at: u64,
    replication_factor: usize,
    chunks: Vec<ChunkLocationView>,
}

#[derive(Serialize)]
struct ChunkLocationView {
    chunk_id: String,
    size: u64,
    checksum: String,
    locations: Vec<String>,
}

async fn create_file(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateFileRequest>,
) -> DfsResult<(axum::http::StatusCode, Json<Value>)> {
    let path = parse_dfs_path(&req.path)?;
    let r = req.replication_factor.unwrap_or(state.common.replication_factor);
    if !(1..=8).contains(&r) {
        return Err(DfsError::InvalidArgument(format!(
            "replication factor {r} out of range [1, 8]"
        )));
    }

    let info = state.metadata.create_file(&path, r).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "path": info.path.to_string(),
            "created_at": info.created_at,
            "replication_factor": info.replication_factor,
        })),
    ))
}

async fn get_file(
    State(state): State<Arc<AppState>>,
    AxumPath(raw_path): AxumPath<String>,
) -> DfsResult<Json<FileResponse>> {
    let path = parse_dfs_path(&raw_path)?;
    let info = state.metadata.get_file(&path).await?;

    let mut chunks = Vec::with_capacity(info.chunks.len());
    for chunk_id in &info.chunks {
        let chunk_info = state.metadata.get_chunk(chunk_id).await?;
        let locations = state.cluster.locations(chunk_id.as_str()).await;
        chunks.push(ChunkLocationView {
            chunk_id: chunk_id.to_string(),
            size: chunk_info.size,
            checksum: chunk_info.checksum,
            locations,
        });
    }

    Ok(Json(FileResponse {
        path: info.path.to_string(),
        size: info.size,
        created_at: info.created_at,
        modified_at: info.modified_at,
        replication_factor: info.replication_factor,
        chunks,
    }))
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    AxumPath(raw_path): AxumPath<String>,
) -> DfsResult<Json<Value>> {
    let path = parse_dfs_path(&raw_path)?;
    let chunk_ids = state.metadata.delete_file(&path).await?;
    Ok(Json(json!({
        "message": "File deleted",
        "chunks_to_delete": chunk_ids.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
    })))
}

#[derive(Deserialize)]
struct CreateDirectoryRequest {
    path: String,
}

async fn create_directory(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDirectoryRequest>,
) -> DfsResult<(axum::http::StatusCode, Json<Value>)> {
    let path = parse_dfs_path(&req.path)?;
    state.metadata.create_directory(&path).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({ "message": "Directory created" })),
    ))
}

async fn list_root_directory(State(state): State<Arc<AppState>>) -> DfsResult<Json<Value>> {
    let entries = state.metadata.list_directory(&Path::root()).await?;
    Ok(Json(json!({ "contents": entries })))
}

async fn list_directory(
    State(state): State<Arc<AppState>>,
    AxumPath(raw_path): AxumPath<String>,
) -> DfsResult<Json<Value>> {
    let path = parse_dfs_path(&raw_path)?;
    let entries = state.metadata.list_directory(&path).await?;
    Ok(Json(json!({ "contents": entries })))
}

#[derive(Deserialize)]
struct AllocateChunkRequest {
    #[serde(default)]
    size: Option<u64>,
    #[serde(default, alias = "R")]
    replication_factor: Option<usize>,
}

async fn allocate_chunk(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AllocateChunkRequest>,
) -> Json<Value> {
    let size = req.size.unwrap_or(state.common.chunk_size);
    let r = req.replication_factor.unwrap_or(state.common.replication_factor);

    let chunk_id = ChunkId::new();
    let candidates = state.cluster.snapshot_nodes().await;
    let placed = crate::cluster::select_placement(&candidates, size, r, &[]);

    for node in &placed {
        state.cluster.record_replica(chunk_id.as_str(), &node.node_id).await;
    }

    if placed.len() < r {
        warn!(
            chunk_id = %chunk_id,
            wanted = r,
            got = placed.len(),
            "insufficient capacity for full replication at allocation time"
        );
    }

    info!(chunk_id = %chunk_id, nodes = placed.len(), "allocated chunk");
    Json(json!({
        "chunk_id": chunk_id.to_string(),
        "locations": placed,
        "size": size,
    }))
}

#[derive(Deserialize)]
struct CompleteChunkRequest {
    file_path: String,
    size: u64,
    checksum: String,
    #[serde(default)]
    replication_factor: Option<usize>,
}

async fn complete_chunk(
    State(state): State<Arc<AppState>>,
    AxumPath(chunk_id_raw): AxumPath<String>,
    Json(req): Json<CompleteChunkRequest>,
) -> DfsResult<Json<Value>> {
    let path = parse_dfs_path(&req.file_path)?;
    let file = state.metadata.get_file(&path).await?;
    let chunk_id = ChunkId::from_string(chunk_id_raw);

    let replicas = state.cluster.locations(chunk_id.as_str()).await;
    let chunk_info = ChunkInfo {
        chunk_id: chunk_id.clone(),
        size: req.size,
        checksum: req.checksum,
        replication_factor: req.replication_factor.unwrap_or(file.replication_factor),
        replicas,
    };

    state.metadata.add_chunk(&path, chunk_info).await?;
    state.replication.queue.enqueue(chunk_id.to_string()).await;

    Ok(Json(json!({ "message": "Chunk added to file" })))
}

async fn cluster_stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    let stats = state.cluster.stats().await;
    Json(json!(stats))
}
