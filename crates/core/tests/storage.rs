use std::collections::BTreeSet;
use std::sync::Arc;

use futures::StreamExt;

use bucketdir_core::backend::local::LocalBackend;
use bucketdir_core::backend::memory::MemoryBackend;
use bucketdir_core::matcher::match_recursive;
use bucketdir_core::{Storage, StorageError};

const FIXTURE: [(&str, &str); 3] = [
    ("a/b.txt", "contents of b"),
    ("a/c/d.txt", "contents of d"),
    ("a/e.txt", "contents of e"),
];

fn memory_storage(page_size: usize) -> (Arc<MemoryBackend>, Storage) {
    let backend = Arc::new(MemoryBackend::new("fixture").with_page_size(page_size));
    for (key, data) in FIXTURE {
        backend.insert(key, data);
    }
    backend.insert("unrelated/z.txt", "z");
    (backend.clone(), Storage::new(backend))
}

#[tokio::test]
async fn recursive_traversal_selects_exactly_the_literal_prefix() {
    let (backend, _) = memory_storage(2);
    backend.insert("ab/x.txt", "sibling");

    for prefix in ["a", "/a/", "a/c", "unrelated", "nothing"] {
        let normalized = bucketdir_core::path::normalize_prefix(prefix);
        let got: BTreeSet<String> = match_recursive(backend.clone(), prefix, |_| true)
            .map(|item| item.unwrap())
            .collect()
            .await;
        let want: BTreeSet<String> = backend
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(&normalized))
            .collect();
        assert_eq!(got, want, "prefix {prefix:?}");
    }
}

#[tokio::test]
async fn list_returns_one_level_with_markers() {
    let (_, storage) = memory_storage(2);
    let mut listed = storage.list("a").await.unwrap();
    listed.sort();
    assert_eq!(listed, ["a/b.txt", "a/c/", "a/e.txt"]);
}

#[tokio::test]
async fn get_returns_stored_bytes() {
    let (_, storage) = memory_storage(2);
    assert_eq!(storage.get("a/c/d.txt").await.unwrap(), b"contents of d");

    let err = storage.get("a/missing.txt").await.unwrap_err();
    assert!(matches!(err, StorageError::NotExist { ref path } if path == "a/missing.txt"));
}

#[tokio::test]
async fn match_finds_single_file_then_closes() {
    let (_, storage) = memory_storage(1);
    let mut stream = storage.match_filenames_recursive("a", "d.txt");
    assert_eq!(stream.next().await.unwrap().unwrap(), "a/c/d.txt");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn get_directory_recreates_tree() {
    let (_, storage) = memory_storage(2);
    let out = tempfile::tempdir().unwrap();

    let copied = storage.get_directory("a", out.path()).await.unwrap();
    assert_eq!(copied, 3);

    for (key, data) in FIXTURE {
        let rel = key.strip_prefix("a/").unwrap();
        let local = std::fs::read(out.path().join(rel)).unwrap();
        assert_eq!(local, data.as_bytes(), "{rel}");
    }
    assert!(!out.path().join("z.txt").exists());
}

#[tokio::test]
async fn delete_directory_removes_nested_objects() {
    let (backend, storage) = memory_storage(2);
    storage.delete("a/c").await.unwrap();

    assert!(!backend.contains("a/c/d.txt"));
    let mut matches = storage.match_filenames_recursive("a", "d.txt");
    assert!(matches.next().await.is_none());

    let mut listed = storage.list("a").await.unwrap();
    listed.sort();
    assert_eq!(listed, ["a/b.txt", "a/e.txt"]);
}

#[tokio::test]
async fn delete_whole_prefix() {
    let (backend, storage) = memory_storage(1);
    let deleted = storage.delete("/a/").await.unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(backend.keys(), ["unrelated/z.txt"]);
}

#[tokio::test]
async fn failed_download_leaves_partial_tree() {
    let backend = Arc::new(MemoryBackend::new("fixture").with_page_size(1).fail_list_call(2));
    for (key, data) in FIXTURE {
        backend.insert(key, data);
    }
    let storage = Storage::new(backend).with_concurrency(1);
    let out = tempfile::tempdir().unwrap();

    let err = storage.get_directory("a", out.path()).await.unwrap_err();
    assert!(matches!(err, StorageError::List { .. }));
    assert!(out.path().join("b.txt").exists());
    assert!(out.path().join("c/d.txt").exists());
    assert!(!out.path().join("e.txt").exists());
}

#[tokio::test]
async fn failed_read_leaves_partial_tree_and_names_the_object() {
    let backend = Arc::new(MemoryBackend::new("fixture").with_page_size(1).fail_read("a/e.txt"));
    for (key, data) in FIXTURE {
        backend.insert(key, data);
    }
    let storage = Storage::new(backend).with_concurrency(1);
    let out = tempfile::tempdir().unwrap();

    let err = storage.get_directory("a", out.path()).await.unwrap_err();
    assert!(matches!(err, StorageError::Transfer { .. }));
    let message = err.to_string();
    assert!(message.starts_with("failed to copy memory://fixture/a/"), "{message}");
    assert!(message.contains("memory://fixture/a/e.txt"), "{message}");

    assert_eq!(std::fs::read(out.path().join("b.txt")).unwrap(), b"contents of b");
    assert_eq!(std::fs::read(out.path().join("c/d.txt")).unwrap(), b"contents of d");
}

#[tokio::test]
async fn failed_delete_stops_and_names_the_object() {
    let backend = Arc::new(
        MemoryBackend::new("fixture")
            .with_page_size(1)
            .fail_delete("a/c/d.txt"),
    );
    for (key, data) in FIXTURE {
        backend.insert(key, data);
    }
    let storage = Storage::new(backend.clone()).with_concurrency(1);

    let err = storage.delete("a").await.unwrap_err();
    assert!(matches!(err, StorageError::Transfer { .. }));
    let message = err.to_string();
    assert!(message.starts_with("failed to delete memory://fixture/a"), "{message}");
    assert!(message.contains("memory://fixture/a/c/d.txt"), "{message}");

    assert!(!backend.contains("a/b.txt"));
    assert!(backend.contains("a/c/d.txt"));
    assert!(backend.contains("a/e.txt"));
}

#[tokio::test]
async fn local_backend_behaves_like_a_bucket() {
    let root = tempfile::tempdir().unwrap();
    let backend = Arc::new(LocalBackend::new(root.path()).unwrap().with_page_size(2));
    let storage = Storage::new(backend);
    for (key, data) in FIXTURE {
        storage.put(key, data.as_bytes()).await.unwrap();
    }

    let mut listed = storage.list("a").await.unwrap();
    listed.sort();
    assert_eq!(listed, ["a/b.txt", "a/c/", "a/e.txt"]);

    let out = tempfile::tempdir().unwrap();
    storage.get_directory("a/c", out.path()).await.unwrap();
    assert_eq!(std::fs::read(out.path().join("d.txt")).unwrap(), b"contents of d");

    storage.delete("a").await.unwrap();
    assert!(storage.list("a").await.unwrap().is_empty());
    assert!(storage.get("a/b.txt").await.unwrap_err().is_not_exist());
}
