use std::sync::Arc;

use crate::datanode::replication_worker::ReplicationWorker;
use crate::datanode::storage::StorageWorker;

#[derive(Clone)]
pub struct DataNodeState {
    pub storage: Arc<StorageWorker>,
    pub replication: Arc<ReplicationWorker>,
}
