//! Configuration structs and TOML + environment-variable loading.
//!
//! Mirrors the teacher's `toml`-backed `Config` split by role, but the
//! shared knobs are also overridable by the environment variables named in
//! the coordination spec (`NAMENODE_HOST`, `CHUNK_SIZE`, ...).

use serde::Deserialize;
use std::fs;

const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024 * 1024;
const DEFAULT_REPLICATION_FACTOR: usize = 3;
const DEFAULT_HEARTBEAT_INTERVAL: u64 = 3;
const DEFAULT_HEARTBEAT_TIMEOUT: u64 = 10;
const DEFAULT_API_TIMEOUT: u64 = 30;
const DEFAULT_EXISTENCE_TIMEOUT: u64 = 5;
const DEFAULT_SWEEP_INTERVAL: u64 = 10;
const DEFAULT_REPLICATION_WORKERS: usize = 4;
const DEFAULT_REPLICATION_QUEUE_CAPACITY: usize = 10_000;

#[derive(Clone, Debug, Deserialize)]
pub struct CommonConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout: u64,
    #[serde(default = "default_api_timeout")]
    pub api_timeout: u64,
    #[serde(default = "default_existence_timeout")]
    pub existence_timeout: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
    #[serde(default = "default_replication_workers")]
    pub replication_workers: usize,
    #[serde(default = "default_replication_queue_capacity")]
    pub replication_queue_capacity: usize,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}
fn default_replication_factor() -> usize {
    DEFAULT_REPLICATION_FACTOR
}
fn default_heartbeat_interval() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL
}
fn default_heartbeat_timeout() -> u64 {
    DEFAULT_HEARTBEAT_TIMEOUT
}
fn default_api_timeout() -> u64 {
    DEFAULT_API_TIMEOUT
}
fn default_existence_timeout() -> u64 {
    DEFAULT_EXISTENCE_TIMEOUT
}
fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL
}
fn default_replication_workers() -> usize {
    DEFAULT_REPLICATION_WORKERS
}
fn default_replication_queue_capacity() -> usize {
    DEFAULT_REPLICATION_QUEUE_CAPACITY
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            replication_factor: default_replication_factor(),
            heartbeat_interval: default_heartbeat_interval(),
            heartbeat_timeout: default_heartbeat_timeout(),
            api_timeout: default_api_timeout(),
            existence_timeout: default_existence_timeout(),
            sweep_interval: default_sweep_interval(),
            replication_workers: default_replication_workers(),
            replication_queue_capacity: default_replication_queue_capacity(),
        }
    }
}

impl CommonConfig {
    /// Overlays environment variables onto an already-parsed config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CHUNK_SIZE") {
            if let Ok(parsed) = v.parse() {
                self.chunk_size = parsed;
            }
        }
        if let Ok(v) = std::env::var("REPLICATION_FACTOR") {
            if let Ok(parsed) = v.parse() {
                self.replication_factor = parsed;
            }
        }
        if let Ok(v) = std::env::var("HEARTBEAT_INTERVAL") {
            if let Ok(parsed) = v.parse() {
                self.heartbeat_interval = parsed;
            }
        }
        if let Ok(v) = std::env::var("HEARTBEAT_TIMEOUT") {
            if let Ok(parsed) = v.parse() {
                self.heartbeat_timeout = parsed;
            }
        }
        if let Ok(v) = std::env::var("API_TIMEOUT") {
            if let Ok(parsed) = v.parse() {
                self.api_timeout = parsed;
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CoordinatorConfig {
    #[serde(default = "default_coordinator_host")]
    pub host: String,
    #[serde(default = "default_coordinator_api_port")]
    pub api_port: u16,
    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,
    #[serde(default = "default_log_path")]
    pub log_path: String,
}

fn default_coordinator_host() -> String {
    "0.0.0.0".to_string()
}
fn default_coordinator_api_port() -> u16 {
    8080
}
fn default_metadata_path() -> String {
    "data/coordinator/metadata".to_string()
}
fn default_log_path() -> String {
    "logs".to_string()
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct DataNodeConfig {
    #[serde(default = "default_datanode_host")]
    pub host: String,
    #[serde(default = "default_datanode_api_port")]
    pub api_port: u16,
    #[serde(default = "default_data_path")]
    pub data_path: String,
    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: u64,
    pub coordinator_addr: String,
}

fn default_datanode_host() -> String {
    "0.0.0.0".to_string()
}
fn default_datanode_api_port() -> u16 {
    50010
}
fn default_data_path() -> String {
    "data/datanode".to_string()
}
fn default_capacity_bytes() -> u64 {
    100 * 1024 * 1024 * 1024
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct DfsctlConfig {
    #[serde(default = "default_log_path")]
    pub log_path: String,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub datanode: DataNodeConfig,
    #[serde(default)]
    pub dfsctl: DfsctlConfig,
    #[serde(default)]
    pub common: CommonConfig,
}

pub fn load_config(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;
    config.common.apply_env_overrides();
    Ok(config)
}
