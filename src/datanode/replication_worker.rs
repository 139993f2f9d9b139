//! Per-DataNode outbound replication: a single FIFO worker that pushes
//! locally-held chunk bytes to peer DataNodes on command.
//!
//! Grounded on `original_source/datanode/replication_manager.py`'s queue +
//! retry-via-PUT loop, and on the teacher's `send_heartbeat`-adjacent
//! background-task pattern in `chunkserver_service.rs`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::datanode::storage::StorageWorker;

const MAX_PUSH_ATTEMPTS: u32 = 3;

#[derive(Clone, Deserialize)]
pub struct ReplicateTargetAddr {
    pub node_id: String,
    pub host: String,
    pub api_port: u16,
}

struct Job {
    chunk_id: String,
    targets: Vec<ReplicateTargetAddr>,
}

pub struct ReplicationWorker {
    storage: Arc<StorageWorker>,
    client: Client,
    jobs: Mutex<VecDeque<Job>>,
    notify: Notify,
}

impl ReplicationWorker {
    pub fn new(storage: Arc<StorageWorker>, api_timeout: Duration) -> Self {
        Self {
            storage,
            client: Client::builder()
                .timeout(api_timeout)
                .build()
                .expect("failed to build reqwest client"),
            jobs: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Enqueues a push of `chunk_id` to every node in `targets`. Never
    /// blocks on the network; the actual transfer happens on `spawn`'s task.
    pub async fn enqueue(&self, chunk_id: String, targets: Vec<ReplicateTargetAddr>) {
        let mut jobs = self.jobs.lock().await;
        jobs.push_back(Job { chunk_id, targets });
        drop(jobs);
        self.notify.notify_one();
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let job = {
                    let mut jobs = self.jobs.lock().await;
                    jobs.pop_front()
                };
                let Some(job) = job else {
                    self.notify.notified().await;
                    continue;
                };
                self.push_job(job).await;
            }
        })
    }

    /// Pushes one chunk to each target in turn; a failed target is
    /// retried up to `MAX_PUSH_ATTEMPTS` times and then reported, but
    /// never aborts the remaining targets (spec.md §4.6).
    async fn push_job(&self, job: Job) {
        let bytes = match self.storage.get(&job.chunk_id).await {
            Ok(b) => b,
            Err(e) => {
                error!(chunk_id = %job.chunk_id, error = %e, "cannot replicate: chunk missing locally");
                return;
            }
        };

        for target in &job.targets {
            let url = format!("http://{}:{}/chunks/{}", target.host, target.api_port, job.chunk_id);
            let mut attempt = 0;
            loop {
                attempt += 1;
                match self.client.put(&url).body(bytes.clone()).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        info!(chunk_id = %job.chunk_id, target = %target.node_id, "pushed replica");
                        break;
                    }
                    Ok(resp) => {
                        warn!(chunk_id = %job.chunk_id, target = %target.node_id, status = %resp.status(), attempt, "replication push rejected");
                    }
                    Err(e) => {
                        warn!(chunk_id = %job.chunk_id, target = %target.node_id, error = %e, attempt, "replication push failed");
                    }
                }
                if attempt >= MAX_PUSH_ATTEMPTS {
                    error!(chunk_id = %job.chunk_id, target = %target.node_id, "replication push abandoned after max attempts");
                    break;
                }
            }
        }
    }
}
