//! Authoritative file/directory/chunk namespace, durably snapshotted.
//!
//! Grounded on `master_service.rs`'s `RwLock`-guarded `HashMap` fields,
//! generalized from a flat file-name keyspace into the Path/Directory tree
//! spec.md §3 describes, and on
//! `original_source/namenode/metadata_manager.py` for the parent-directory
//! and snapshot semantics.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use tokio::fs;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::error::{DfsError, DfsResult};
use crate::metadata::{ChunkId, ChunkInfo, DirectoryEntry, DirectoryInfo, FileInfo, Path};
use crate::util::now_unix;

#[derive(Default, Clone)]
struct Namespace {
    files: HashMap<String, FileInfo>,
    directories: HashMap<String, DirectoryInfo>,
    chunks: HashMap<String, ChunkInfo>,
}

/// `inner` guards only in-memory reads/writes; no mutating method holds it
/// across disk I/O. Each mutation builds a candidate `Namespace`, persists
/// it to disk first, and only then swaps it into `inner` — a durability
/// failure leaves the live namespace exactly as the caller last observed
/// it (spec.md §4.1, §5).
pub struct MetadataStore {
    root: PathBuf,
    inner: RwLock<Namespace>,
}

impl MetadataStore {
    /// Opens (or initializes) a metadata store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> DfsResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| DfsError::Durability(format!("failed to create metadata root: {e}")))?;

        let mut namespace = Namespace::default();
        load_table(&root, "files.json", &mut namespace.files).await;
        load_table(&root, "directories.json", &mut namespace.directories).await;
        load_table(&root, "chunks.json", &mut namespace.chunks).await;

        if !namespace.directories.contains_key("/") {
            let now = now_unix();
            namespace.directories.insert(
                "/".to_string(),
                DirectoryInfo {
                    path: Path::root(),
                    created_at: now,
                    modified_at: now,
                    children: BTreeSet::new(),
                },
            );
        }

        let store = Self {
            root,
            inner: RwLock::new(namespace),
        };
        Ok(store)
    }

    pub async fn create_file(&self, path: &Path, replication_factor: usize) -> DfsResult<FileInfo> {
        let (candidate, info) = {
            let ns = self.inner.read().await;
            if ns.files.contains_key(path.as_str()) || ns.directories.contains_key(path.as_str()) {
                return Err(DfsError::Exists(path.to_string()));
            }
            let parent = path.parent();
            if !ns.directories.contains_key(parent.as_str()) {
                return Err(DfsError::ParentMissing(parent.to_string()));
            }

            let now = now_unix();
            let info = FileInfo {
                path: path.clone(),
                size: 0,
                chunks: Vec::new(),
                created_at: now,
                modified_at: now,
                replication_factor,
            };

            let mut candidate = ns.clone();
            candidate.files.insert(path.to_string(), info.clone());
            if let Some(dir) = candidate.directories.get_mut(parent.as_str()) {
                dir.children.insert(path.to_string());
                dir.modified_at = now;
            }
            (candidate, info)
        };

        self.commit(candidate).await?;
        info!(path = %path, "created file");
        Ok(info)
    }

    pub async fn get_file(&self, path: &Path) -> DfsResult<FileInfo> {
        let ns = self.inner.read().await;
        ns.files
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| DfsError::NotFound(path.to_string()))
    }

    pub async fn delete_file(&self, path: &Path) -> DfsResult<Vec<ChunkId>> {
        let (candidate, chunks) = {
            let ns = self.inner.read().await;
            let file = ns
                .files
                .get(path.as_str())
                .ok_or_else(|| DfsError::NotFound(path.to_string()))?;
            let chunks = file.chunks.clone();

            let mut candidate = ns.clone();
            candidate.files.remove(path.as_str());
            let parent = path.parent();
            if let Some(dir) = candidate.directories.get_mut(parent.as_str()) {
                dir.children.remove(path.as_str());
                dir.modified_at = now_unix();
            }
            for chunk_id in &chunks {
                candidate.chunks.remove(chunk_id.as_str());
            }
            (candidate, chunks)
        };

        self.commit(candidate).await?;
        info!(path = %path, chunks = chunks.len(), "deleted file");
        Ok(chunks)
    }

    pub async fn create_directory(&self, path: &Path) -> DfsResult<()> {
        let candidate = {
            let ns = self.inner.read().await;
            if ns.directories.contains_key(path.as_str()) || ns.files.contains_key(path.as_str()) {
                return Err(DfsError::Exists(path.to_string()));
            }
            let parent = path.parent();
            if !path.is_root() && !ns.directories.contains_key(parent.as_str()) {
                return Err(DfsError::ParentMissing(parent.to_string()));
            }

            let now = now_unix();
            let mut candidate = ns.clone();
            candidate.directories.insert(
                path.to_string(),
                DirectoryInfo {
                    path: path.clone(),
                    created_at: now,
                    modified_at: now,
                    children: BTreeSet::new(),
                },
            );
            if !path.is_root() {
                if let Some(dir) = candidate.directories.get_mut(parent.as_str()) {
                    dir.children.insert(path.to_string());
                    dir.modified_at = now;
                }
            }
            candidate
        };

        self.commit(candidate).await?;
        info!(path = %path, "created directory");
        Ok(())
    }

    pub async fn list_directory(&self, path: &Path) -> DfsResult<Vec<DirectoryEntry>> {
        let ns = self.inner.read().await;
        let dir = ns
            .directories
            .get(path.as_str())
            .ok_or_else(|| DfsError::NotFound(path.to_string()))?;

        let mut entries: Vec<DirectoryEntry> = Vec::new();
        for child in &dir.children {
            if let Some(file) = ns.files.get(child) {
                entries.push(DirectoryEntry::File {
                    path: file.path.to_string(),
                    name: file.path.basename().to_string(),
                    size: file.size,
                    created_at: file.created_at,
                    modified_at: file.modified_at,
                });
            } else if let Some(sub) = ns.directories.get(child) {
                entries.push(DirectoryEntry::Directory {
                    path: sub.path.to_string(),
                    name: sub.path.basename().to_string(),
                    created_at: sub.created_at,
                    modified_at: sub.modified_at,
                });
            }
        }
        entries.sort_by(|a, b| entry_name(a).cmp(entry_name(b)));
        Ok(entries)
    }

    pub async fn add_chunk(&self, file_path: &Path, chunk: ChunkInfo) -> DfsResult<()> {
        let candidate = {
            let ns = self.inner.read().await;
            let file = ns
                .files
                .get(file_path.as_str())
                .ok_or_else(|| DfsError::NotFound(file_path.to_string()))?;

            if file.chunks.contains(&chunk.chunk_id) {
                return Err(DfsError::Exists(format!(
                    "chunk {} already appended to {}",
                    chunk.chunk_id, file_path
                )));
            }

            let mut candidate = ns.clone();
            let file = candidate
                .files
                .get_mut(file_path.as_str())
                .expect("file presence re-checked above under the same snapshot");
            file.chunks.push(chunk.chunk_id.clone());
            file.size += chunk.size;
            file.modified_at = now_unix();
            candidate.chunks.insert(chunk.chunk_id.to_string(), chunk);
            candidate
        };

        self.commit(candidate).await
    }

    pub async fn get_chunk(&self, chunk_id: &ChunkId) -> DfsResult<ChunkInfo> {
        let ns = self.inner.read().await;
        ns.chunks
            .get(chunk_id.as_str())
            .cloned()
            .ok_or_else(|| DfsError::NotFound(chunk_id.to_string()))
    }

    /// Rewrites the authoritative-hint replica list carried in chunk
    /// metadata. The Cluster View's live index remains the runtime source
    /// of truth (SPEC_FULL.md §9); this field is a persisted snapshot used
    /// only to seed recovery before DataNode chunk listings are rediscovered.
    pub async fn update_chunk_replicas(
        &self,
        chunk_id: &ChunkId,
        replicas: Vec<String>,
    ) -> DfsResult<()> {
        let candidate = {
            let ns = self.inner.read().await;
            if !ns.chunks.contains_key(chunk_id.as_str()) {
                return Err(DfsError::NotFound(chunk_id.to_string()));
            }
            let mut candidate = ns.clone();
            candidate.chunks.get_mut(chunk_id.as_str()).unwrap().replicas = replicas;
            candidate
        };

        self.commit(candidate).await
    }

    /// Persists `candidate` to disk, then — only once that succeeds —
    /// swaps it into `inner`. No lock is held while writing to disk, and
    /// the in-memory namespace is left untouched on a persist failure, so
    /// a caller who observes `Err` sees a namespace identical to the one
    /// before the call (spec.md §4.1).
    async fn commit(&self, candidate: Namespace) -> DfsResult<()> {
        write_table(&self.root, "files.json", &candidate.files).await?;
        write_table(&self.root, "directories.json", &candidate.directories).await?;
        write_table(&self.root, "chunks.json", &candidate.chunks).await?;

        let mut ns = self.inner.write().await;
        *ns = candidate;
        Ok(())
    }
}

fn entry_name(entry: &DirectoryEntry) -> &str {
    match entry {
        DirectoryEntry::File { name, .. } => name,
        DirectoryEntry::Directory { name, .. } => name,
    }
}

async fn load_table<T>(root: &PathBuf, file_name: &str, into: &mut HashMap<String, T>)
where
    T: serde::de::DeserializeOwned,
{
    let path = root.join(file_name);
    match fs::read_to_string(&path).await {
        Ok(contents) => match serde_json::from_str::<HashMap<String, T>>(&contents) {
            Ok(table) => *into = table,
            Err(e) => error!(file = file_name, error = %e, "failed to parse metadata snapshot"),
        },
        Err(_) => {
            // No snapshot yet; starting from an empty table is expected on first boot.
        }
    }
}

async fn write_table<T>(root: &PathBuf, file_name: &str, table: &HashMap<String, T>) -> DfsResult<()>
where
    T: serde::Serialize,
{
    let serialized = serde_json::to_vec_pretty(table)
        .map_err(|e| DfsError::Durability(format!("failed to serialize {file_name}: {e}")))?;

    let tmp_path = root.join(format!("{file_name}.tmp"));
    let final_path = root.join(file_name);

    fs::write(&tmp_path, &serialized)
        .await
        .map_err(|e| DfsError::Durability(format!("failed to write {file_name}: {e}")))?;
    fs::rename(&tmp_path, &final_path)
        .await
        .map_err(|e| DfsError::Durability(format!("failed to rename {file_name} into place: {e}")))?;
    Ok(())
}
