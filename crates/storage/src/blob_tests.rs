// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn save_file_hashes_and_counts() {
    let dir = tempdir().unwrap();
    let store = BlobStore::new(dir.path());

    let saved = store.save_file("file-1", &b"hello world"[..]).await.unwrap();

    assert_eq!(saved.size, 11);
    assert_eq!(
        saved.sha256,
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
}

#[tokio::test]
async fn get_file_streams_saved_bytes() {
    let dir = tempdir().unwrap();
    let store = BlobStore::new(dir.path());
    store.save_file("file-1", &b"payload"[..]).await.unwrap();

    let mut file = store.get_file("file-1").await.unwrap();
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).await.unwrap();
    assert_eq!(contents, b"payload");
}

#[tokio::test]
async fn get_missing_file_is_not_found() {
    let dir = tempdir().unwrap();
    let store = BlobStore::new(dir.path());
    assert!(matches!(
        store.get_file("nope").await,
        Err(BlobError::NotFound(_))
    ));
}

#[tokio::test]
async fn screenshots_listed_newest_first_with_limit() {
    let dir = tempdir().unwrap();
    let store = BlobStore::new(dir.path());

    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        store.save_screenshot("runner-1", name, &b"jpegdata"[..]).await.unwrap();
        // Distinct mtimes for ordering.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let listed = store.list_screenshots("runner-1", 2).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].filename, "c.jpg");
    assert_eq!(listed[1].filename, "b.jpg");

    assert!(store.get_screenshot_path("runner-1", "a.jpg").await.is_some());
    assert!(store.get_screenshot_path("runner-1", "zz.jpg").await.is_none());
}

#[tokio::test]
async fn screenshots_for_unknown_runner_is_empty() {
    let dir = tempdir().unwrap();
    let store = BlobStore::new(dir.path());
    assert!(store.list_screenshots("ghost", 10).await.unwrap().is_empty());
}
