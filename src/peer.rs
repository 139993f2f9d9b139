//! Capability set for talking to a DataNode, abstracted behind a trait so
//! the Replication Maintainer can be driven by an in-memory double in
//! tests (design note §9) instead of always going over the network.
//!
//! Grounded on the teacher's `#[tonic::async_trait] impl Chunk for
//! ChunkService` services, but expressed as a hand-rolled trait over
//! `reqwest` rather than a tonic-generated service, since the external
//! interface is HTTP+JSON (SPEC_FULL.md §6).

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::cluster::NodeInfo;
use crate::error::{DfsError, DfsResult};
use crate::metadata::ChunkId;

#[async_trait]
pub trait DataNodeClient: Send + Sync {
    async fn put(&self, node: &NodeInfo, chunk_id: &ChunkId, bytes: Bytes) -> DfsResult<String>;
    async fn get(&self, node: &NodeInfo, chunk_id: &ChunkId) -> DfsResult<Bytes>;
    async fn exists(&self, node: &NodeInfo, chunk_id: &ChunkId) -> DfsResult<bool>;
    async fn delete(&self, node: &NodeInfo, chunk_id: &ChunkId) -> DfsResult<()>;
    /// Commands `node` to push `chunk_id` to every node in `targets`.
    async fn replicate(&self, node: &NodeInfo, chunk_id: &ChunkId, targets: &[NodeInfo]) -> DfsResult<()>;
    /// Lists the chunk IDs `node` currently holds on disk. Used to rebuild
    /// the coordinator's chunk<->node index after it loses in-memory state
    /// (SPEC_FULL.md §8 scenario f).
    async fn list_chunks(&self, node: &NodeInfo) -> DfsResult<Vec<String>>;
}

/// Target descriptor sent in a `/replicate` request body.
#[derive(serde::Serialize)]
pub struct ReplicateTarget {
    pub node_id: String,
    pub host: String,
    pub api_port: u16,
}

#[derive(serde::Serialize)]
struct ReplicateRequest {
    chunk_id: String,
    target_nodes: Vec<ReplicateTarget>,
}

pub struct HttpDataNodeClient {
    client: reqwest::Client,
    existence_timeout: Duration,
}

impl HttpDataNodeClient {
    pub fn new(api_timeout: Duration, existence_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(api_timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            existence_timeout,
        }
    }

    fn base_url(node: &NodeInfo) -> String {
        format!("http://{}:{}", node.host, node.port)
    }
}

#[async_trait]
impl DataNodeClient for HttpDataNodeClient {
    async fn put(&self, node: &NodeInfo, chunk_id: &ChunkId, bytes: Bytes) -> DfsResult<String> {
        let url = format!("{}/chunks/{}", Self::base_url(node), chunk_id);
        let response = self
            .client
            .put(&url)
            .body(bytes)
            .send()
            .await
            .map_err(|e| DfsError::NodeUnavailable(format!("PUT {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(DfsError::NodeUnavailable(format!(
                "PUT {url} returned {}",
                response.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct PutResponse {
            checksum: String,
        }
        let body: PutResponse = response
            .json()
            .await
            .map_err(|e| DfsError::NodeUnavailable(format!("decoding PUT response: {e}")))?;
        Ok(body.checksum)
    }

    async fn get(&self, node: &NodeInfo, chunk_id: &ChunkId) -> DfsResult<Bytes> {
        let url = format!("{}/chunks/{}", Self::base_url(node), chunk_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DfsError::NodeUnavailable(format!("GET {url}: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DfsError::NotFound(chunk_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(DfsError::NodeUnavailable(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        response
            .bytes()
            .await
            .map_err(|e| DfsError::NodeUnavailable(format!("reading GET body: {e}")))
    }

    async fn exists(&self, node: &NodeInfo, chunk_id: &ChunkId) -> DfsResult<bool> {
        let url = format!("{}/chunks/{}/exists", Self::base_url(node), chunk_id);
        let response = self
            .client
            .get(&url)
            .timeout(self.existence_timeout)
            .send()
            .await
            .map_err(|e| DfsError::NodeUnavailable(format!("GET {url}: {e}")))?;
        Ok(response.status().is_success())
    }

    async fn delete(&self, node: &NodeInfo, chunk_id: &ChunkId) -> DfsResult<()> {
        let url = format!("{}/chunks/{}", Self::base_url(node), chunk_id);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| DfsError::NodeUnavailable(format!("DELETE {url}: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DfsError::NotFound(chunk_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(DfsError::NodeUnavailable(format!(
                "DELETE {url} returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn replicate(&self, node: &NodeInfo, chunk_id: &ChunkId, targets: &[NodeInfo]) -> DfsResult<()> {
        let url = format!("{}/replicate", Self::base_url(node));
        let request = ReplicateRequest {
            chunk_id: chunk_id.to_string(),
            target_nodes: targets
                .iter()
                .map(|t| ReplicateTarget {
                    node_id: t.node_id.clone(),
                    host: t.host.clone(),
                    api_port: t.port,
                })
                .collect(),
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DfsError::NodeUnavailable(format!("POST {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(DfsError::NodeUnavailable(format!(
                "POST {url} returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn list_chunks(&self, node: &NodeInfo) -> DfsResult<Vec<String>> {
        let url = format!("{}/chunks", Self::base_url(node));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DfsError::NodeUnavailable(format!("GET {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(DfsError::NodeUnavailable(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct ListChunksResponse {
            chunks: Vec<String>,
        }
        let body: ListChunksResponse = response
            .json()
            .await
            .map_err(|e| DfsError::NodeUnavailable(format!("decoding GET {url} response: {e}")))?;
        Ok(body.chunks)
    }
}
