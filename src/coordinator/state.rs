use std::sync::Arc;

use crate::cluster::ClusterView;
use crate::config::CommonConfig;
use crate::metadata::MetadataStore;
use crate::peer::DataNodeClient;
use crate::replication::ReplicationMaintainer;

/// Shared state handed to every axum handler, grouping the owning
/// components plus the config knobs the Coordinator API needs (default
/// chunk size / replication factor for `/chunks/allocate`). `peer_client`
/// is kept alongside `replication`'s own copy so the registration handler
/// can pull a newly (re-)registered DataNode's chunk listing without
/// reaching into the maintainer's internals.
#[derive(Clone)]
pub struct AppState {
    pub metadata: Arc<MetadataStore>,
    pub cluster: Arc<ClusterView>,
    pub replication: Arc<ReplicationMaintainer>,
    pub peer_client: Arc<dyn DataNodeClient>,
    pub common: CommonConfig,
}
