//! DataNode entry point: serves the Storage Worker + outbound replication
//! queue over HTTP, registers with the coordinator, and ships heartbeats.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dfs_core::config::load_config;
use dfs_core::datanode::replication_worker::ReplicationWorker;
use dfs_core::datanode::{api, DataNodeState, StorageWorker};
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "datanode", about = "DFS storage worker (DataNode)")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long)]
    node_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    let file_appender = tracing_appender::rolling::daily(&config.datanode.log_path, "datanode.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(non_blocking))
        .with(fmt::layer())
        .init();

    let node_id = args
        .node_id
        .unwrap_or_else(|| format!("{}:{}", config.datanode.host, config.datanode.api_port));

    let storage = Arc::new(StorageWorker::open(&config.datanode.data_path, config.datanode.capacity_bytes).await?);
    let replication = Arc::new(ReplicationWorker::new(
        Arc::clone(&storage),
        Duration::from_secs(config.common.api_timeout),
    ));
    replication.clone().spawn();

    let http_client = reqwest::Client::new();
    register_with_coordinator(&http_client, &config.datanode.coordinator_addr, &node_id, &config.datanode).await;
    spawn_heartbeat_loop(
        http_client,
        config.datanode.coordinator_addr.clone(),
        node_id.clone(),
        config.datanode.clone(),
        Arc::clone(&storage),
        config.common.heartbeat_interval,
    );

    let state = DataNodeState { storage, replication };
    let addr: SocketAddr = format!("{}:{}", config.datanode.host, config.datanode.api_port).parse()?;
    info!(%addr, node_id, "datanode listening");
    axum::Server::bind(&addr)
        .serve(api::router(state).into_make_service())
        .await?;

    Ok(())
}

async fn register_with_coordinator(
    client: &reqwest::Client,
    coordinator_addr: &str,
    node_id: &str,
    datanode_config: &dfs_core::config::DataNodeConfig,
) {
    let url = format!("{coordinator_addr}/datanodes/register");
    let body = json!({
        "node_id": node_id,
        "host": datanode_config.host,
        "port": datanode_config.api_port,
    });
    match client.post(&url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => debug!(node_id, "registered with coordinator"),
        Ok(resp) => warn!(node_id, status = %resp.status(), "coordinator rejected registration"),
        Err(e) => warn!(node_id, error = %e, "failed to reach coordinator for registration"),
    }
}

/// Ships `{node_id, available_space, used_space, chunk_count}` to the
/// coordinator on the configured interval (spec.md §6 heartbeat transport).
///
/// Re-registers before every heartbeat. `register` is idempotent
/// (spec.md §4.2), so on a healthy coordinator this is a cheap no-op; if
/// the coordinator restarted and lost its in-memory Cluster View, this is
/// what makes the DataNode rejoin and trigger index reconciliation
/// instead of heartbeating forever into an unknown node ID (spec.md §8
/// scenario f).
fn spawn_heartbeat_loop(
    client: reqwest::Client,
    coordinator_addr: String,
    node_id: String,
    datanode_config: dfs_core::config::DataNodeConfig,
    storage: Arc<StorageWorker>,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        let url = format!("{coordinator_addr}/heartbeat");
        loop {
            ticker.tick().await;
            register_with_coordinator(&client, &coordinator_addr, &node_id, &datanode_config).await;

            let stats = match storage.stats().await {
                Ok(s) => s,
                Err(e) => {
                    warn!(node_id, error = %e, "failed to compute local stats for heartbeat");
                    continue;
                }
            };
            let body = json!({
                "node_id": node_id,
                "available_space": stats.available_bytes,
                "used_space": stats.used_bytes,
                "chunk_count": stats.chunk_count,
            });
            if let Err(e) = client.post(&url).json(&body).send().await {
                warn!(node_id, error = %e, "heartbeat delivery failed");
            }
        }
    });
}
