//! Namespace + chunk metadata types owned exclusively by the Metadata Store.

pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use store::MetadataStore;

/// A UTF-8 absolute, `/`-separated path. Validated on construction.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(String);

impl Path {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if !raw.starts_with('/') {
            return Err(format!("path must be absolute: {raw}"));
        }
        if raw.len() > 1 && raw.ends_with('/') {
            return Err(format!("path must not have a trailing slash: {raw}"));
        }
        if raw != "/" {
            for component in raw.split('/').skip(1) {
                if component.is_empty() {
                    return Err(format!("path has an empty component: {raw}"));
                }
            }
        }
        Ok(Path(raw.to_string()))
    }

    pub fn root() -> Self {
        Path("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Basename: the final `/`-separated component, empty for root.
    pub fn basename(&self) -> &str {
        if self.is_root() {
            return "";
        }
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Parent directory path. Root is its own parent.
    pub fn parent(&self) -> Path {
        if self.is_root() {
            return Path::root();
        }
        match self.0.rfind('/') {
            Some(0) => Path::root(),
            Some(idx) => Path(self.0[..idx].to_string()),
            None => Path::root(),
        }
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 128-bit chunk identifier, rendered as a canonical lowercase UUID.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn new() -> Self {
        ChunkId(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_string(s: String) -> Self {
        ChunkId(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ChunkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: Path,
    pub size: u64,
    pub chunks: Vec<ChunkId>,
    pub created_at: u64,
    pub modified_at: u64,
    pub replication_factor: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectoryInfo {
    pub path: Path,
    pub created_at: u64,
    pub modified_at: u64,
    pub children: BTreeSet<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub chunk_id: ChunkId,
    pub size: u64,
    pub checksum: String,
    pub replication_factor: usize,
    /// Replica locations as last reported by the Cluster View. This is a
    /// snapshot hint persisted for crash recovery, not the runtime source
    /// of truth — see SPEC_FULL.md §9 open questions.
    #[serde(default)]
    pub replicas: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DirectoryEntry {
    File {
        path: String,
        name: String,
        size: u64,
        created_at: u64,
        modified_at: u64,
    },
    Directory {
        path: String,
        name: String,
        created_at: u64,
        modified_at: u64,
    },
}
