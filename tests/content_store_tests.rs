use mosaic::content_store::ContentStore;
use mosaic::error::IngestError;
use mosaic::utils::sha1_hex;

#[tokio::test]
async fn test_write_and_read_roundtrip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(temp_dir.path().join("blobs")).unwrap();

    let data = b"some chunk bytes";
    let hash = sha1_hex(data);

    assert!(!store.contains(&hash).await);

    let path = store.write(&hash, data).await.unwrap();
    assert_eq!(path, store.blob_path(&hash));
    assert!(store.contains(&hash).await);

    let read_back = store.read(&hash).await.unwrap();
    assert_eq!(read_back, data);
}

#[tokio::test]
async fn test_write_is_deduplicated() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(temp_dir.path().join("blobs")).unwrap();

    let data = b"identical content";
    let hash = sha1_hex(data);

    store.write(&hash, data).await.unwrap();
    // second write of the same content is a no-op, not an error
    store.write(&hash, data).await.unwrap();

    // exactly one blob on disk, no stray temp files
    let entries: Vec<_> = std::fs::read_dir(store.root())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries, vec![hash.clone()]);
}

#[tokio::test]
async fn test_read_missing_blob_is_not_found() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(temp_dir.path().join("blobs")).unwrap();

    let err = store.read("0000000000000000000000000000000000000000").await.unwrap_err();
    assert!(matches!(err, IngestError::NotFound(_)));
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ContentStore::open(temp_dir.path().join("blobs")).unwrap();

    let data = b"to be removed";
    let hash = sha1_hex(data);
    store.write(&hash, data).await.unwrap();

    store.remove(&hash).await.unwrap();
    assert!(!store.contains(&hash).await);

    // removing again is fine
    store.remove(&hash).await.unwrap();
}
