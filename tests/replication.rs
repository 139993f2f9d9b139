//! Multi-component replication scenarios driven end-to-end through the
//! public API, against a fake `DataNodeClient` (spec.md §8 scenarios a/c
//! and the replication-bound invariant).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dfs_core::cluster::{ClusterView, NodeInfo};
use dfs_core::error::DfsResult;
use dfs_core::metadata::{ChunkId, ChunkInfo, MetadataStore, Path};
use dfs_core::peer::DataNodeClient;
use dfs_core::replication::ReplicationMaintainer;

struct CountingPeer {
    replicate_calls: AtomicUsize,
}

#[async_trait]
impl DataNodeClient for CountingPeer {
    async fn put(&self, _node: &NodeInfo, _chunk_id: &ChunkId, _bytes: Bytes) -> DfsResult<String> {
        Ok("checksum".to_string())
    }
    async fn get(&self, _node: &NodeInfo, _chunk_id: &ChunkId) -> DfsResult<Bytes> {
        Ok(Bytes::new())
    }
    async fn exists(&self, _node: &NodeInfo, _chunk_id: &ChunkId) -> DfsResult<bool> {
        Ok(true)
    }
    async fn delete(&self, _node: &NodeInfo, _chunk_id: &ChunkId) -> DfsResult<()> {
        Ok(())
    }
    async fn replicate(&self, _node: &NodeInfo, _chunk_id: &ChunkId, targets: &[NodeInfo]) -> DfsResult<()> {
        self.replicate_calls.fetch_add(targets.len(), Ordering::SeqCst);
        Ok(())
    }
    async fn list_chunks(&self, _node: &NodeInfo) -> DfsResult<Vec<String>> {
        Ok(Vec::new())
    }
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn under_replicated_chunk_is_brought_up_to_r() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = Arc::new(MetadataStore::open(dir.path()).await.unwrap());
    let cluster = Arc::new(ClusterView::new());
    for (id, bytes) in [("n1", 10_000u64), ("n2", 10_000), ("n3", 10_000)] {
        cluster.register(id, "h", 1).await;
        cluster.update_stats(id, bytes, 0, 0).await;
    }

    metadata.create_file(&Path::parse("/a.bin").unwrap(), 3).await.unwrap();
    let chunk_id = ChunkId::new();
    cluster.record_replica(chunk_id.as_str(), "n1").await; // only 1 of 3 replicas live
    metadata
        .add_chunk(
            &Path::parse("/a.bin").unwrap(),
            ChunkInfo {
                chunk_id: chunk_id.clone(),
                size: 100,
                checksum: "x".to_string(),
                replication_factor: 3,
                replicas: vec!["n1".to_string()],
            },
        )
        .await
        .unwrap();

    let peer: Arc<dyn DataNodeClient> = Arc::new(CountingPeer {
        replicate_calls: AtomicUsize::new(0),
    });
    let maintainer = Arc::new(ReplicationMaintainer::new(
        Arc::clone(&metadata),
        Arc::clone(&cluster),
        peer,
        100,
        Duration::from_secs(3600), // sweep disabled for this test; rely on direct enqueue
    ));
    maintainer.spawn(2);
    maintainer.queue.enqueue(chunk_id.to_string()).await;

    wait_until(|| {
        let cluster = Arc::clone(&cluster);
        let chunk_id = chunk_id.clone();
        async move { cluster.live_locations(chunk_id.as_str()).await.len() >= 3 }
    })
    .await;

    let locations = cluster.live_locations(chunk_id.as_str()).await;
    assert_eq!(locations.len(), 3);
}

#[tokio::test]
async fn insufficient_capacity_allocates_partial_and_increments_no_loss() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = Arc::new(MetadataStore::open(dir.path()).await.unwrap());
    let cluster = Arc::new(ClusterView::new());
    cluster.register("n1", "h", 1).await;
    cluster.update_stats("n1", 10_000, 0, 0).await;

    metadata.create_file(&Path::parse("/a.bin").unwrap(), 3).await.unwrap();
    let chunk_id = ChunkId::new();
    cluster.record_replica(chunk_id.as_str(), "n1").await;
    metadata
        .add_chunk(
            &Path::parse("/a.bin").unwrap(),
            ChunkInfo {
                chunk_id: chunk_id.clone(),
                size: 100,
                checksum: "x".to_string(),
                replication_factor: 3,
                replicas: vec!["n1".to_string()],
            },
        )
        .await
        .unwrap();

    let peer: Arc<dyn DataNodeClient> = Arc::new(CountingPeer {
        replicate_calls: AtomicUsize::new(0),
    });
    let maintainer = Arc::new(ReplicationMaintainer::new(
        Arc::clone(&metadata),
        Arc::clone(&cluster),
        peer,
        100,
        Duration::from_secs(3600),
    ));
    maintainer.spawn(1);
    maintainer.queue.enqueue(chunk_id.to_string()).await;

    // Only one node exists; give the worker a moment and confirm it never
    // exceeds what's actually available instead of erroring out.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let locations = cluster.live_locations(chunk_id.as_str()).await;
    assert_eq!(locations.len(), 1);

    let stats = cluster.stats().await;
    assert_eq!(stats.lost_chunks, 0);
}
