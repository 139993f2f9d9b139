//! Node table + chunk<->node bidirectional index, behind a single guard.
//!
//! Grounded on `master_service.rs`'s `chunk_servers`/`chunk_map` fields,
//! generalized into the explicit bidirectional index spec.md §3 names so
//! invariant 1 (`n in chunk_to_nodes[c] <=> c in node_to_chunks[n]`) holds
//! structurally rather than by convention.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use tracing::info;

use crate::cluster::{ClusterStats, NodeInfo};
use crate::util::now_unix;

#[derive(Default)]
struct Inner {
    nodes: HashMap<String, NodeInfo>,
    chunk_to_nodes: HashMap<String, HashSet<String>>,
    node_to_chunks: HashMap<String, HashSet<String>>,
    lost_chunks: u64,
}

#[derive(Default)]
pub struct ClusterView {
    inner: RwLock<Inner>,
}

impl ClusterView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: re-registering resets host/port/liveness.
    pub async fn register(&self, node_id: &str, host: &str, port: u16) -> NodeInfo {
        let mut inner = self.inner.write().await;
        let info = NodeInfo {
            node_id: node_id.to_string(),
            host: host.to_string(),
            port,
            available_bytes: 0,
            used_bytes: 0,
            chunk_count: 0,
            last_heartbeat: now_unix(),
            alive: true,
        };
        inner.nodes.insert(node_id.to_string(), info.clone());
        inner.node_to_chunks.entry(node_id.to_string()).or_default();
        info!(node_id, host, port, "registered datanode");
        info
    }

    /// No-op for unknown nodes. Bumps the heartbeat clock and clears `alive`.
    pub async fn update_stats(&self, node_id: &str, available: u64, used: u64, chunk_count: u64) {
        let mut inner = self.inner.write().await;
        if let Some(node) = inner.nodes.get_mut(node_id) {
            node.available_bytes = available;
            node.used_bytes = used;
            node.chunk_count = chunk_count;
            node.last_heartbeat = now_unix();
            node.alive = true;
        }
    }

    /// Idempotent: adds both directions of the index.
    pub async fn record_replica(&self, chunk_id: &str, node_id: &str) {
        let mut inner = self.inner.write().await;
        inner
            .chunk_to_nodes
            .entry(chunk_id.to_string())
            .or_default()
            .insert(node_id.to_string());
        inner
            .node_to_chunks
            .entry(node_id.to_string())
            .or_default()
            .insert(chunk_id.to_string());
    }

    pub async fn forget_replica(&self, chunk_id: &str, node_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(set) = inner.chunk_to_nodes.get_mut(chunk_id) {
            set.remove(node_id);
        }
        if let Some(set) = inner.node_to_chunks.get_mut(node_id) {
            set.remove(chunk_id);
        }
    }

    pub async fn locations(&self, chunk_id: &str) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .chunk_to_nodes
            .get(chunk_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns only the node IDs among `locations(chunk_id)` that are
    /// currently marked alive.
    pub async fn live_locations(&self, chunk_id: &str) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .chunk_to_nodes
            .get(chunk_id)
            .map(|set| {
                set.iter()
                    .filter(|id| inner.nodes.get(*id).map(|n| n.alive).unwrap_or(false))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Marks a node dead, clears its side of the index, and returns the
    /// chunk IDs it used to host so callers can enqueue re-replication.
    pub async fn mark_dead(&self, node_id: &str) -> Vec<String> {
        let mut inner = self.inner.write().await;
        if let Some(node) = inner.nodes.get_mut(node_id) {
            node.alive = false;
        } else {
            return Vec::new();
        }

        let affected: Vec<String> = inner
            .node_to_chunks
            .remove(node_id)
            .unwrap_or_default()
            .into_iter()
            .collect();
        inner.node_to_chunks.insert(node_id.to_string(), HashSet::new());

        for chunk_id in &affected {
            if let Some(set) = inner.chunk_to_nodes.get_mut(chunk_id) {
                set.remove(node_id);
            }
        }

        info!(node_id, affected_chunks = affected.len(), "marked datanode dead");
        affected
    }

    pub async fn increment_lost_chunks(&self) {
        let mut inner = self.inner.write().await;
        inner.lost_chunks += 1;
    }

    pub async fn node(&self, node_id: &str) -> Option<NodeInfo> {
        let inner = self.inner.read().await;
        inner.nodes.get(node_id).cloned()
    }

    pub async fn snapshot_nodes(&self) -> Vec<NodeInfo> {
        let inner = self.inner.read().await;
        inner.nodes.values().cloned().collect()
    }

    /// Every chunk ID currently indexed, live replicas or not. Used by the
    /// Replication Maintainer's periodic sweep (spec.md §4.5).
    pub async fn all_chunk_ids(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner.chunk_to_nodes.keys().cloned().collect()
    }

    /// Replaces `node_id`'s side of the index with exactly the chunk IDs in
    /// `listing` — a DataNode's own `GET /chunks` enumeration is
    /// authoritative for what it holds right now. Drops stale entries for
    /// chunks the node no longer reports and adds any the index didn't
    /// know about, rebuilding `chunk_to_nodes` after the coordinator has
    /// lost its in-memory state (spec.md §8 scenario f). No-op for a
    /// `node_id` the cluster hasn't registered.
    pub async fn reconcile_node_chunks(&self, node_id: &str, listing: &[String]) {
        let mut inner = self.inner.write().await;
        if !inner.nodes.contains_key(node_id) {
            return;
        }

        let new_set: HashSet<String> = listing.iter().cloned().collect();
        let old_set = inner.node_to_chunks.get(node_id).cloned().unwrap_or_default();

        for chunk_id in old_set.difference(&new_set) {
            if let Some(set) = inner.chunk_to_nodes.get_mut(chunk_id) {
                set.remove(node_id);
            }
        }
        for chunk_id in new_set.difference(&old_set) {
            inner
                .chunk_to_nodes
                .entry(chunk_id.clone())
                .or_default()
                .insert(node_id.to_string());
        }

        let added = new_set.difference(&old_set).count();
        let removed = old_set.difference(&new_set).count();
        inner.node_to_chunks.insert(node_id.to_string(), new_set);
        if added > 0 || removed > 0 {
            info!(node_id, added, removed, "reconciled node's chunk listing into index");
        }
    }

    pub async fn stats(&self) -> ClusterStats {
        let inner = self.inner.read().await;
        let total_nodes = inner.nodes.len();
        let alive_nodes = inner.nodes.values().filter(|n| n.alive).count();
        ClusterStats {
            total_nodes,
            alive_nodes,
            dead_nodes: total_nodes - alive_nodes,
            total_available_bytes: inner.nodes.values().map(|n| n.available_bytes).sum(),
            total_used_bytes: inner.nodes.values().map(|n| n.used_bytes).sum(),
            total_chunks: inner.chunk_to_nodes.len(),
            lost_chunks: inner.lost_chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_is_idempotent() {
        let view = ClusterView::new();
        view.register("n1", "host-a", 100).await;
        let info = view.register("n1", "host-b", 200).await;
        assert_eq!(info.host, "host-b");
        assert_eq!(view.snapshot_nodes().await.len(), 1);
    }

    #[tokio::test]
    async fn record_and_forget_replica_round_trip() {
        let view = ClusterView::new();
        view.register("n1", "h", 1).await;
        view.record_replica("c1", "n1").await;
        view.record_replica("c1", "n1").await; // idempotent
        assert_eq!(view.locations("c1").await, vec!["n1".to_string()]);

        view.forget_replica("c1", "n1").await;
        assert!(view.locations("c1").await.is_empty());
    }

    #[tokio::test]
    async fn mark_dead_clears_both_index_directions() {
        let view = ClusterView::new();
        view.register("n1", "h", 1).await;
        view.register("n2", "h", 1).await;
        view.record_replica("c1", "n1").await;
        view.record_replica("c1", "n2").await;

        let affected = view.mark_dead("n1").await;
        assert_eq!(affected, vec!["c1".to_string()]);
        assert_eq!(view.locations("c1").await, vec!["n2".to_string()]);

        let stats = view.stats().await;
        assert_eq!(stats.alive_nodes, 1);
        assert_eq!(stats.dead_nodes, 1);
    }

    #[tokio::test]
    async fn reconcile_node_chunks_rebuilds_both_directions() {
        let view = ClusterView::new();
        view.register("n1", "h", 1).await;
        view.record_replica("stale", "n1").await;

        view.reconcile_node_chunks("n1", &["c1".to_string(), "c2".to_string()]).await;

        assert!(view.locations("stale").await.is_empty());
        assert_eq!(view.locations("c1").await, vec!["n1".to_string()]);
        assert_eq!(view.locations("c2").await, vec!["n1".to_string()]);
    }

    #[tokio::test]
    async fn reconcile_node_chunks_ignores_unknown_node() {
        let view = ClusterView::new();
        view.reconcile_node_chunks("ghost", &["c1".to_string()]).await;
        assert!(view.locations("c1").await.is_empty());
    }
}
