//! Storage Worker: durable chunk bytes on local disk, keyed by chunk ID.
//!
//! Grounded on `original_source/datanode/storage_manager.py`'s
//! store/retrieve/delete-with-checksum shape and on the teacher's
//! `chunkserver_service.rs::upload`/`read`/`delete` handlers, rewritten
//! around `tokio::fs` with the write-ahead temp-file-then-rename pattern
//! spec.md §4.6 requires instead of the teacher's streaming gRPC writer.

use std::path::PathBuf;

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{DfsError, DfsResult};
use crate::util::sha256_hex;

pub struct DataNodeStats {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
    pub chunk_count: u64,
}

/// Owns the on-disk chunk directory for one DataNode. Every operation is
/// keyed purely by chunk ID string; there is no cross-chunk locking since
/// the filesystem already serializes a single file's writes.
pub struct StorageWorker {
    root: PathBuf,
    capacity_bytes: u64,
}

impl StorageWorker {
    pub async fn open(root: impl Into<PathBuf>, capacity_bytes: u64) -> DfsResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| DfsError::Durability(format!("failed to create chunk root: {e}")))?;
        Ok(Self { root, capacity_bytes })
    }

    fn chunk_path(&self, chunk_id: &str) -> PathBuf {
        self.root.join(format!("{chunk_id}.chunk"))
    }

    /// Writes `bytes` to a temp file, fsyncs, then renames into place.
    /// Overwriting an existing chunk is allowed; later write wins.
    pub async fn put(&self, chunk_id: &str, bytes: Bytes) -> DfsResult<(u64, String)> {
        let checksum = sha256_hex(&bytes);
        let final_path = self.chunk_path(chunk_id);
        let tmp_path = self.root.join(format!("{chunk_id}.tmp"));

        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| DfsError::Durability(format!("creating temp chunk file: {e}")))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| DfsError::Durability(format!("writing chunk bytes: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| DfsError::Durability(format!("fsync chunk file: {e}")))?;
        drop(file);

        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| DfsError::Durability(format!("renaming chunk into place: {e}")))?;

        info!(chunk_id, size = bytes.len(), "stored chunk");
        Ok((bytes.len() as u64, checksum))
    }

    pub async fn get(&self, chunk_id: &str) -> DfsResult<Bytes> {
        let path = self.chunk_path(chunk_id);
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DfsError::NotFound(chunk_id.to_string())),
            Err(e) => Err(DfsError::Durability(format!("reading chunk: {e}"))),
        }
    }

    pub async fn exists(&self, chunk_id: &str) -> bool {
        fs::metadata(self.chunk_path(chunk_id)).await.is_ok()
    }

    pub async fn delete(&self, chunk_id: &str) -> DfsResult<()> {
        match fs::remove_file(self.chunk_path(chunk_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DfsError::NotFound(chunk_id.to_string())),
            Err(e) => Err(DfsError::Durability(format!("deleting chunk: {e}"))),
        }
    }

    pub async fn list_chunk_ids(&self) -> DfsResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| DfsError::Durability(format!("listing chunk root: {e}")))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DfsError::Durability(format!("reading chunk root entry: {e}")))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = name.strip_suffix(".chunk") {
                    ids.push(id.to_string());
                }
            }
        }
        Ok(ids)
    }

    /// Computed on demand from the filesystem, per spec.md §4.6.
    pub async fn stats(&self) -> DfsResult<DataNodeStats> {
        let mut used_bytes = 0u64;
        let mut chunk_count = 0u64;
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| DfsError::Durability(format!("listing chunk root: {e}")))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DfsError::Durability(format!("reading chunk root entry: {e}")))?
        {
            let name_is_chunk = entry
                .file_name()
                .to_str()
                .map(|n| n.ends_with(".chunk"))
                .unwrap_or(false);
            if !name_is_chunk {
                continue;
            }
            if let Ok(meta) = entry.metadata().await {
                used_bytes += meta.len();
                chunk_count += 1;
            }
        }

        Ok(DataNodeStats {
            total_bytes: self.capacity_bytes,
            available_bytes: self.capacity_bytes.saturating_sub(used_bytes),
            used_bytes,
            chunk_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let worker = StorageWorker::open(dir.path(), 1024 * 1024).await.unwrap();

        let (size, checksum) = worker.put("c1", Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(size, 5);
        assert_eq!(checksum, sha256_hex(b"hello"));
        assert!(worker.exists("c1").await);

        let bytes = worker.get("c1").await.unwrap();
        assert_eq!(&bytes[..], b"hello");

        worker.delete("c1").await.unwrap();
        assert!(!worker.exists("c1").await);
        assert!(matches!(worker.get("c1").await, Err(DfsError::NotFound(_))));
    }

    #[tokio::test]
    async fn overwrite_is_idempotent_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let worker = StorageWorker::open(dir.path(), 1024 * 1024).await.unwrap();

        worker.put("c1", Bytes::from_static(b"first")).await.unwrap();
        worker.put("c1", Bytes::from_static(b"second")).await.unwrap();

        let bytes = worker.get("c1").await.unwrap();
        assert_eq!(&bytes[..], b"second");
    }

    #[tokio::test]
    async fn stats_reflect_stored_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let worker = StorageWorker::open(dir.path(), 1024).await.unwrap();
        worker.put("c1", Bytes::from_static(b"abc")).await.unwrap();
        worker.put("c2", Bytes::from_static(b"de")).await.unwrap();

        let stats = worker.stats().await.unwrap();
        assert_eq!(stats.used_bytes, 5);
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.available_bytes, 1024 - 5);
    }
}
