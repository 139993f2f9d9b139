//! Replication Maintainer: a dedup FIFO queue drained by a small worker
//! pool, plus a periodic sweep that re-enqueues every under-replicated
//! chunk. Grounded on `master_service.rs::start_heartbeat_checker`'s
//! source-selection + `transfer_chunk` + metadata-update loop, generalized
//! to run against the `DataNodeClient` trait and a proper bounded,
//! deduplicating queue instead of being inlined into the heartbeat task.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cluster::{select_placement, ClusterView};
use crate::metadata::{ChunkId, MetadataStore};
use crate::peer::DataNodeClient;

const MAX_REPLICATION_ATTEMPTS: u32 = 3;

struct QueueInner {
    order: VecDeque<String>,
    queued: HashSet<String>,
}

/// Bounded, deduplicating FIFO. A chunk already queued is never
/// re-enqueued; when full, the oldest entry is dropped and
/// `overflow_drops` is incremented (spec.md §5).
pub struct ReplicationQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
    pub overflow_drops: AtomicU64,
}

impl ReplicationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                order: VecDeque::new(),
                queued: HashSet::new(),
            }),
            notify: Notify::new(),
            capacity,
            overflow_drops: AtomicU64::new(0),
        }
    }

    pub async fn enqueue(&self, chunk_id: String) {
        let mut inner = self.inner.lock().await;
        if inner.queued.contains(&chunk_id) {
            return;
        }
        if inner.order.len() >= self.capacity {
            if let Some(dropped) = inner.order.pop_front() {
                inner.queued.remove(&dropped);
                self.overflow_drops.fetch_add(1, Ordering::Relaxed);
                warn!(dropped_chunk = %dropped, "replication queue full, dropped oldest entry");
            }
        }
        inner.queued.insert(chunk_id.clone());
        inner.order.push_back(chunk_id);
        drop(inner);
        self.notify.notify_one();
    }

    pub async fn enqueue_many(&self, chunk_ids: impl IntoIterator<Item = String>) {
        for id in chunk_ids {
            self.enqueue(id).await;
        }
    }

    async fn dequeue(&self) -> Option<String> {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(id) = inner.order.pop_front() {
                    inner.queued.remove(&id);
                    return Some(id);
                }
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.order.len()
    }
}

pub struct ReplicationMaintainer {
    metadata: Arc<MetadataStore>,
    cluster: Arc<ClusterView>,
    peer_client: Arc<dyn DataNodeClient>,
    pub queue: Arc<ReplicationQueue>,
    sweep_interval: Duration,
}

impl ReplicationMaintainer {
    pub fn new(
        metadata: Arc<MetadataStore>,
        cluster: Arc<ClusterView>,
        peer_client: Arc<dyn DataNodeClient>,
        queue_capacity: usize,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            metadata,
            cluster,
            peer_client,
            queue: Arc::new(ReplicationQueue::new(queue_capacity)),
            sweep_interval,
        }
    }

    /// Spawns `worker_count` queue-draining workers plus one periodic
    /// sweep task. Returns their join handles so the caller can await a
    /// graceful shutdown.
    pub fn spawn(self: &Arc<Self>, worker_count: usize) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(worker_count + 1);
        for worker_id in 0..worker_count {
            let this = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                this.worker_loop(worker_id).await;
            }));
        }

        let this = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            this.sweep_loop().await;
        }));

        handles
    }

    async fn worker_loop(&self, worker_id: usize) {
        loop {
            let Some(chunk_id) = self.queue.dequeue().await else {
                continue;
            };
            if let Err(e) = self.reconcile_chunk(&chunk_id).await {
                error!(worker_id, chunk_id = %chunk_id, error = %e, "replication attempt failed, deferring to next sweep");
            }
        }
    }

    async fn sweep_loop(&self) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        loop {
            ticker.tick().await;
            let chunk_ids = self.cluster.all_chunk_ids().await;
            self.queue.enqueue_many(chunk_ids).await;
        }
    }

    /// Reconciles a single chunk: checks live replica count, places
    /// additional replicas if under-replicated, retries up to
    /// `MAX_REPLICATION_ATTEMPTS` per target.
    async fn reconcile_chunk(&self, chunk_id: &str) -> Result<(), String> {
        let chunk_info = match self.metadata.get_chunk(&ChunkId::from_string(chunk_id.to_string())).await {
            Ok(info) => info,
            Err(_) => return Ok(()), // chunk was deleted since being enqueued
        };

        let live = self.cluster.live_locations(chunk_id).await;
        if live.len() >= chunk_info.replication_factor {
            return Ok(());
        }

        let Some(source_id) = live.first().cloned() else {
            self.cluster.increment_lost_chunks().await;
            error!(chunk_id, "chunk has zero live replicas: permanent data loss");
            return Err("no live holder".to_string());
        };
        let Some(source_node) = self.cluster.node(&source_id).await else {
            return Err(format!("source node {source_id} vanished from cluster view"));
        };

        let needed = chunk_info.replication_factor - live.len();
        let candidates = self.cluster.snapshot_nodes().await;
        let targets = select_placement(&candidates, chunk_info.size, needed, &live);

        if targets.len() < needed {
            warn!(
                chunk_id,
                wanted = needed,
                got = targets.len(),
                "not enough eligible targets, will retry on next sweep"
            );
        }

        for target in &targets {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match self
                    .peer_client
                    .replicate(&source_node, &ChunkId::from_string(chunk_id.to_string()), std::slice::from_ref(target))
                    .await
                {
                    Ok(()) => {
                        self.cluster.record_replica(chunk_id, &target.node_id).await;
                        info!(chunk_id, target = %target.node_id, "replicated chunk");
                        break;
                    }
                    Err(e) if attempt < MAX_REPLICATION_ATTEMPTS => {
                        warn!(chunk_id, target = %target.node_id, attempt, error = %e, "replication attempt failed, retrying");
                        continue;
                    }
                    Err(e) => {
                        error!(chunk_id, target = %target.node_id, error = %e, "replication failed after max attempts");
                        break;
                    }
                }
            }
        }

        let updated_locations = self.cluster.locations(chunk_id).await;
        let _ = self
            .metadata
            .update_chunk_replicas(&ChunkId::from_string(chunk_id.to_string()), updated_locations)
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::NodeInfo;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::Mutex as AsyncMutex;

    struct FakePeer {
        fail_first_n: AtomicU32,
        stores: AsyncMutex<HashSet<(String, String)>>,
    }

    #[async_trait]
    impl DataNodeClient for FakePeer {
        async fn put(&self, _n: &NodeInfo, _c: &ChunkId, _b: Bytes) -> crate::error::DfsResult<String> {
            Ok("checksum".to_string())
        }
        async fn get(&self, _n: &NodeInfo, _c: &ChunkId) -> crate::error::DfsResult<Bytes> {
            Ok(Bytes::new())
        }
        async fn exists(&self, _n: &NodeInfo, _c: &ChunkId) -> crate::error::DfsResult<bool> {
            Ok(true)
        }
        async fn delete(&self, _n: &NodeInfo, _c: &ChunkId) -> crate::error::DfsResult<()> {
            Ok(())
        }
        async fn replicate(
            &self,
            _node: &NodeInfo,
            chunk_id: &ChunkId,
            targets: &[NodeInfo],
        ) -> crate::error::DfsResult<()> {
            if self.fail_first_n.load(Ordering::SeqCst) > 0 {
                self.fail_first_n.fetch_sub(1, Ordering::SeqCst);
                return Err(crate::error::DfsError::NodeUnavailable("simulated failure".into()));
            }
            let mut stores = self.stores.lock().await;
            for t in targets {
                stores.insert((chunk_id.to_string(), t.node_id.clone()));
            }
            Ok(())
        }
        async fn list_chunks(&self, _n: &NodeInfo) -> crate::error::DfsResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn queue_dedups_and_drops_oldest_on_overflow() {
        let queue = ReplicationQueue::new(2);
        queue.enqueue("a".to_string()).await;
        queue.enqueue("a".to_string()).await; // dedup, no-op
        queue.enqueue("b".to_string()).await;
        queue.enqueue("c".to_string()).await; // overflow: drops "a"

        assert_eq!(queue.overflow_drops.load(Ordering::Relaxed), 1);
        assert_eq!(queue.dequeue().await, Some("b".to_string()));
        assert_eq!(queue.dequeue().await, Some("c".to_string()));
    }
}
