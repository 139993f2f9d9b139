//! Coordinator entry point: wires the Metadata Store, Cluster View,
//! Replication Maintainer, and Heartbeat Monitor behind the Coordinator
//! API and serves it over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dfs_core::cluster::ClusterView;
use dfs_core::config::load_config;
use dfs_core::coordinator::{api, AppState};
use dfs_core::heartbeat::HeartbeatMonitor;
use dfs_core::metadata::MetadataStore;
use dfs_core::peer::HttpDataNodeClient;
use dfs_core::replication::ReplicationMaintainer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "coordinator", about = "DFS coordinator (NameNode)")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    let file_appender = tracing_appender::rolling::daily(&config.coordinator.log_path, "coordinator.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(non_blocking))
        .with(fmt::layer())
        .init();

    let metadata = Arc::new(MetadataStore::open(&config.coordinator.metadata_path).await?);
    let cluster = Arc::new(ClusterView::new());
    let peer_client: Arc<dyn dfs_core::peer::DataNodeClient> = Arc::new(HttpDataNodeClient::new(
        Duration::from_secs(config.common.api_timeout),
        Duration::from_secs(config.common.existence_timeout),
    ));

    let replication = Arc::new(ReplicationMaintainer::new(
        Arc::clone(&metadata),
        Arc::clone(&cluster),
        Arc::clone(&peer_client),
        config.common.replication_queue_capacity,
        Duration::from_secs(config.common.sweep_interval),
    ));
    replication.spawn(config.common.replication_workers);

    let heartbeat_monitor = Arc::new(HeartbeatMonitor::new(
        Arc::clone(&cluster),
        Arc::clone(&replication.queue),
        config.common.heartbeat_timeout,
    ));
    heartbeat_monitor.spawn();

    let state = AppState {
        metadata,
        cluster,
        replication,
        peer_client,
        common: config.common.clone(),
    };

    let addr: SocketAddr = format!("{}:{}", config.coordinator.host, config.coordinator.api_port).parse()?;
    info!(%addr, "coordinator listening");
    axum::Server::bind(&addr)
        .serve(api::router(state).into_make_service())
        .await?;

    Ok(())
}
