//! Liveness and capacity of every registered DataNode, plus the
//! bidirectional chunk<->node index. Owned exclusively by `ClusterView`.

pub mod placement;
pub mod view;

use serde::{Deserialize, Serialize};

pub use placement::select_placement;
pub use view::ClusterView;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub available_bytes: u64,
    pub used_bytes: u64,
    pub chunk_count: u64,
    pub last_heartbeat: u64,
    pub alive: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClusterStats {
    pub total_nodes: usize,
    pub alive_nodes: usize,
    pub dead_nodes: usize,
    pub total_available_bytes: u64,
    pub total_used_bytes: u64,
    pub total_chunks: usize,
    pub lost_chunks: u64,
}
