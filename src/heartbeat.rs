//! Background loop watching for DataNode heartbeat timeouts.
//!
//! Grounded on `master_service.rs::start_heartbeat_checker`, but split out
//! of `MasterService` per design note §9 so it stays a pure consumer: it
//! calls `ClusterView::mark_dead` and hands the affected chunk IDs to the
//! Replication Maintainer's queue rather than reassigning chunks itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::cluster::ClusterView;
use crate::replication::ReplicationQueue;
use crate::util::now_unix;

pub struct HeartbeatMonitor {
    cluster: Arc<ClusterView>,
    queue: Arc<ReplicationQueue>,
    timeout_secs: u64,
}

impl HeartbeatMonitor {
    pub fn new(cluster: Arc<ClusterView>, queue: Arc<ReplicationQueue>, timeout_secs: u64) -> Self {
        Self {
            cluster,
            queue,
            timeout_secs,
        }
    }

    /// Runs the check loop at 1 Hz until the process exits. Returns the
    /// join handle so callers can track/abort it during shutdown.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                self.check_once().await;
            }
        })
    }

    async fn check_once(&self) {
        let now = now_unix();
        let timed_out: Vec<String> = self
            .cluster
            .snapshot_nodes()
            .await
            .into_iter()
            .filter(|n| n.alive && now.saturating_sub(n.last_heartbeat) > self.timeout_secs)
            .map(|n| n.node_id)
            .collect();

        for node_id in timed_out {
            warn!(node_id, "heartbeat timeout, marking dead");
            let affected = self.cluster.mark_dead(&node_id).await;
            self.queue.enqueue_many(affected).await;
        }
    }
}
