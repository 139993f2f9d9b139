//! Thin operator CLI over the Coordinator API. The richer multipart
//! upload/download driver is a separate client-side concern and is not
//! part of the coordination core (spec.md §1 out-of-scope).

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dfsctl", about = "Operator CLI for the DFS coordinator")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    coordinator: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Coordinator liveness check.
    Health,
    /// List registered DataNodes.
    Nodes,
    /// Cluster-wide space and chunk totals.
    Stats,
    /// Create a directory.
    Mkdir { path: String },
    /// List a directory's contents.
    Ls { path: String },
    /// Show file metadata and chunk locations.
    Stat { path: String },
    /// Delete a file.
    Rm { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let client = reqwest::Client::new();

    let result: Value = match args.command {
        Command::Health => client.get(format!("{}/health", args.coordinator)).send().await?.json().await?,
        Command::Nodes => client.get(format!("{}/datanodes", args.coordinator)).send().await?.json().await?,
        Command::Stats => client
            .get(format!("{}/cluster/stats", args.coordinator))
            .send()
            .await?
            .json()
            .await?,
        Command::Mkdir { path } => client
            .post(format!("{}/directories", args.coordinator))
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await?
            .json()
            .await?,
        Command::Ls { path } => client
            .get(format!("{}/directories{}", args.coordinator, path))
            .send()
            .await?
            .json()
            .await?,
        Command::Stat { path } => client
            .get(format!("{}/files{}", args.coordinator, path))
            .send()
            .await?
            .json()
            .await?,
        Command::Rm { path } => client
            .delete(format!("{}/files{}", args.coordinator, path))
            .send()
            .await?
            .json()
            .await?,
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
