//! Durability and namespace-integrity scenarios for the Metadata Store
//! (spec.md §8, scenario d and the durability invariant).

use dfs_core::error::DfsError;
use dfs_core::metadata::{ChunkInfo, MetadataStore, Path};

fn path(p: &str) -> Path {
    Path::parse(p).unwrap()
}

#[tokio::test]
async fn create_file_rejects_exists_and_missing_parent() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::open(dir.path()).await.unwrap();

    store.create_file(&path("/a.bin"), 3).await.unwrap();
    assert!(matches!(
        store.create_file(&path("/a.bin"), 3).await,
        Err(DfsError::Exists(_))
    ));
    assert!(matches!(
        store.create_file(&path("/missing/b.bin"), 3).await,
        Err(DfsError::ParentMissing(_))
    ));
}

#[tokio::test]
async fn delete_semantics_scenario_d() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::open(dir.path()).await.unwrap();

    store.create_directory(&path("/d")).await.unwrap();
    store.create_file(&path("/d/f"), 3).await.unwrap();

    let c1 = ChunkInfo {
        chunk_id: dfs_core::metadata::ChunkId::new(),
        size: 10,
        checksum: "deadbeef".to_string(),
        replication_factor: 3,
        replicas: vec![],
    };
    let c2 = ChunkInfo {
        chunk_id: dfs_core::metadata::ChunkId::new(),
        size: 20,
        checksum: "beefdead".to_string(),
        replication_factor: 3,
        replicas: vec![],
    };
    let c1_id = c1.chunk_id.clone();
    let c2_id = c2.chunk_id.clone();
    store.add_chunk(&path("/d/f"), c1).await.unwrap();
    store.add_chunk(&path("/d/f"), c2).await.unwrap();

    let deleted_chunks = store.delete_file(&path("/d/f")).await.unwrap();
    assert_eq!(deleted_chunks.len(), 2);

    assert!(matches!(store.get_file(&path("/d/f")).await, Err(DfsError::NotFound(_))));
    assert!(matches!(store.get_chunk(&c1_id).await, Err(DfsError::NotFound(_))));
    assert!(matches!(store.get_chunk(&c2_id).await, Err(DfsError::NotFound(_))));

    let entries = store.list_directory(&path("/d")).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn appending_same_chunk_id_twice_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::open(dir.path()).await.unwrap();
    store.create_file(&path("/a.bin"), 3).await.unwrap();

    let chunk = ChunkInfo {
        chunk_id: dfs_core::metadata::ChunkId::new(),
        size: 10,
        checksum: "c".to_string(),
        replication_factor: 3,
        replicas: vec![],
    };
    let chunk_dup = ChunkInfo {
        chunk_id: chunk.chunk_id.clone(),
        size: 10,
        checksum: "c".to_string(),
        replication_factor: 3,
        replicas: vec![],
    };

    store.add_chunk(&path("/a.bin"), chunk).await.unwrap();
    assert!(matches!(
        store.add_chunk(&path("/a.bin"), chunk_dup).await,
        Err(DfsError::Exists(_))
    ));
}

#[tokio::test]
async fn durability_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = MetadataStore::open(dir.path()).await.unwrap();
        store.create_directory(&path("/d")).await.unwrap();
        store.create_file(&path("/d/f"), 2).await.unwrap();
    }

    let reopened = MetadataStore::open(dir.path()).await.unwrap();
    let file = reopened.get_file(&path("/d/f")).await.unwrap();
    assert_eq!(file.replication_factor, 2);

    let entries = reopened.list_directory(&path("/d")).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn root_directory_is_always_present() {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::open(dir.path()).await.unwrap();
    let entries = store.list_directory(&Path::root()).await.unwrap();
    assert!(entries.is_empty());
}
