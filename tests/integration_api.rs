//! End-to-end Coordinator API tests driven through the axum router
//! directly via `tower::ServiceExt::oneshot`, without binding a socket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use dfs_core::cluster::{ClusterView, NodeInfo};
use dfs_core::config::CommonConfig;
use dfs_core::coordinator::{api, AppState};
use dfs_core::error::DfsResult;
use dfs_core::metadata::{ChunkId, MetadataStore};
use dfs_core::peer::DataNodeClient;
use dfs_core::replication::ReplicationMaintainer;
use serde_json::{json, Value};
use tower::ServiceExt;

struct NoopPeer;

#[async_trait]
impl DataNodeClient for NoopPeer {
    async fn put(&self, _n: &NodeInfo, _c: &ChunkId, _b: Bytes) -> DfsResult<String> {
        Ok("checksum".to_string())
    }
    async fn get(&self, _n: &NodeInfo, _c: &ChunkId) -> DfsResult<Bytes> {
        Ok(Bytes::new())
    }
    async fn exists(&self, _n: &NodeInfo, _c: &ChunkId) -> DfsResult<bool> {
        Ok(true)
    }
    async fn delete(&self, _n: &NodeInfo, _c: &ChunkId) -> DfsResult<()> {
        Ok(())
    }
    async fn replicate(&self, _n: &NodeInfo, _c: &ChunkId, _t: &[NodeInfo]) -> DfsResult<()> {
        Ok(())
    }
    async fn list_chunks(&self, _n: &NodeInfo) -> DfsResult<Vec<String>> {
        Ok(Vec::new())
    }
}

async fn test_app() -> axum::Router {
    let dir = tempfile::tempdir().unwrap();
    let metadata = Arc::new(MetadataStore::open(dir.path()).await.unwrap());
    let cluster = Arc::new(ClusterView::new());
    let peer: Arc<dyn DataNodeClient> = Arc::new(NoopPeer);
    let replication = Arc::new(ReplicationMaintainer::new(
        Arc::clone(&metadata),
        Arc::clone(&cluster),
        Arc::clone(&peer),
        100,
        Duration::from_secs(3600),
    ));

    let state = AppState {
        metadata,
        cluster,
        replication,
        peer_client: peer,
        common: CommonConfig::default(),
    };
    api::router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_returns_200() {
    let app = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_get_delete_file_flow() {
    let app = test_app().await;

    let create_req = Request::builder()
        .method("POST")
        .uri("/files")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "path": "/a.bin", "replication_factor": 3 }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(create_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let get_req = Request::builder().uri("/files/a.bin").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(get_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["path"], "/a.bin");
    assert_eq!(body["replication_factor"], 3);

    let delete_req = Request::builder()
        .method("DELETE")
        .uri("/files/a.bin")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(delete_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let get_again = Request::builder().uri("/files/a.bin").body(Body::empty()).unwrap();
    let response = app.oneshot(get_again).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_file_rejects_missing_parent() {
    let app = test_app().await;
    let req = Request::builder()
        .method("POST")
        .uri("/files")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "path": "/missing/a.bin" }).to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn allocate_chunk_with_no_nodes_returns_empty_locations() {
    let app = test_app().await;
    let req = Request::builder()
        .method("POST")
        .uri("/chunks/allocate")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "size": 1024, "replication_factor": 3 }).to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["locations"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn register_and_list_datanodes() {
    let app = test_app().await;
    let register_req = Request::builder()
        .method("POST")
        .uri("/datanodes/register")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "node_id": "n1", "host": "127.0.0.1", "port": 50010 }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(register_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list_req = Request::builder().uri("/datanodes").body(Body::empty()).unwrap();
    let response = app.oneshot(list_req).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["datanodes"].as_array().unwrap().len(), 1);
}
