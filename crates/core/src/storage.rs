use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::TryStreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::apply::{DEFAULT_CONCURRENCY, apply_recursive};
use crate::backend::{Backend, BackendError};
use crate::error::{Result, StorageError};
use crate::list::list;
use crate::matcher::{MatchStream, match_recursive};
use crate::path::{DELIMITER, base_name, normalize_prefix, relative_path};

/// Directory-style access to a flat object namespace.
///
/// Cheap to clone; every clone shares the same backend handle.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn Backend>,
    concurrency: usize,
}

impl Storage {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Concurrency for bulk operations (delete, directory download). Zero is
    /// rejected by those operations with [`StorageError::Config`].
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn root_url(&self) -> String {
        self.backend.root_url()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.root_url(), path)
    }

    /// Read a single object fully into memory.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        match self.backend.read_into(path, &mut data).await {
            Ok(_) => Ok(data),
            Err(BackendError::NotFound(_)) => Err(StorageError::NotExist {
                path: path.to_string(),
            }),
            Err(BackendError::Other(e)) => Err(StorageError::transfer(
                format!("failed to read {}", self.url(path)),
                e,
            )),
        }
    }

    /// Store `data` at `path`, replacing any existing object.
    pub async fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        debug!(url = %self.url(path), bytes = data.len(), "uploading");
        self.backend
            .write(path, data)
            .await
            .map_err(|e| StorageError::transfer(format!("failed to write {}", self.url(path)), e))
    }

    /// Uploading a directory tree is not supported.
    pub async fn put_directory(&self, _local_path: &Path, _remote_path: &str) -> Result<()> {
        Err(StorageError::NotImplemented("put_directory"))
    }

    /// Delete `path` and, treating it as a directory, everything nested under
    /// it. Keys that merely share a string prefix (`a/cat` for `a/c`) are left
    /// alone. The exact key goes last, once everything under it is gone, so a
    /// failed call never removes it. Returns the number of objects deleted
    /// under the directory.
    pub async fn delete(&self, path: &str) -> Result<usize> {
        let url = self.url(path);
        debug!(url = %url, "deleting");

        let backend = self.backend.clone();
        let root_url = self.root_url();
        let deleted = apply_recursive(self.backend.clone(), path, self.concurrency, move |record| {
            let backend = backend.clone();
            let remote = format!("{root_url}/{}", record.key);
            async move {
                backend
                    .delete(&record.key)
                    .await
                    .map_err(|e| StorageError::transfer(format!("failed to delete {remote}"), e))?;
                debug!(key = %record.key, "deleted");
                Ok(())
            }
        })
        .await
        .map_err(|e| e.within(format!("failed to delete {url}")))?;

        let exact = path.trim_start_matches('/');
        if !exact.is_empty() && !exact.ends_with('/') {
            self.backend
                .delete(exact)
                .await
                .map_err(|e| StorageError::transfer(format!("failed to delete {url}"), e))?;
        }

        info!(url = %url, deleted, "delete complete");
        Ok(deleted)
    }

    /// Keys and prefix markers one level under `dir`.
    pub async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = normalize_prefix(dir);
        list(self.backend.clone(), &prefix, Some(DELIMITER))
            .map_ok(|record| record.key)
            .try_collect()
            .await
    }

    /// Stream every key under `prefix` whose last path component is
    /// `filename`. The consumer must drain or drop the returned stream.
    pub fn match_filenames_recursive(&self, prefix: &str, filename: &str) -> MatchStream {
        let filename = filename.to_string();
        match_recursive(self.backend.clone(), prefix, move |key| {
            base_name(key) == filename
        })
    }

    /// Copy everything under `remote_prefix` into `local_dir`, recreating the
    /// directory structure. A failure leaves whatever was already copied in
    /// place. Returns the number of objects copied.
    pub async fn get_directory(&self, remote_prefix: &str, local_dir: &Path) -> Result<usize> {
        let prefix = normalize_prefix(remote_prefix);
        let url = self.url(&prefix);
        let backend = self.backend.clone();
        let root_url = self.root_url();
        let local_root = local_dir.to_path_buf();

        let copied = apply_recursive(self.backend.clone(), &prefix, self.concurrency, |record| {
            download(
                backend.clone(),
                root_url.clone(),
                prefix.clone(),
                record.key,
                local_root.clone(),
            )
        })
        .await
        .map_err(|e| e.within(format!("failed to copy {url} to {}", local_dir.display())))?;

        info!(url = %url, local = %local_dir.display(), copied, "download complete");
        Ok(copied)
    }
}

/// Stream one object into its place under `local_root`.
async fn download(
    backend: Arc<dyn Backend>,
    root_url: String,
    prefix: String,
    key: String,
    local_root: PathBuf,
) -> Result<()> {
    let remote = format!("{root_url}/{key}");
    let rel = relative_path(&key, &prefix)?;
    let local_path = local_root.join(&rel);

    // directory marker objects
    if rel.is_empty() || rel.ends_with('/') {
        return create_dir_all(&local_path).await;
    }
    if let Some(parent) = local_path.parent() {
        create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(&local_path).await.map_err(|e| {
        StorageError::transfer(format!("failed to create file {}", local_path.display()), e)
    })?;

    debug!(remote = %remote, local = %local_path.display(), "downloading");
    let copy_context = || format!("failed to copy {remote} to {}", local_path.display());
    match backend.read_into(&key, &mut file).await {
        Ok(_) => {}
        Err(BackendError::NotFound(_)) => {
            return Err(StorageError::NotExist { path: key });
        }
        Err(BackendError::Other(e)) => return Err(StorageError::transfer(copy_context(), e)),
    }
    file.flush()
        .await
        .map_err(|e| StorageError::transfer(copy_context(), e))?;
    Ok(())
}

async fn create_dir_all(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        StorageError::transfer(format!("failed to create directory {}", dir.display()), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn storage() -> (Arc<MemoryBackend>, Storage) {
        let backend = Arc::new(MemoryBackend::new("bucket"));
        backend.insert("a/b.txt", "bee");
        backend.insert("a/c/d.txt", "dee");
        backend.insert("a/e.txt", "eee");
        (backend.clone(), Storage::new(backend))
    }

    #[test]
    fn root_url_comes_from_backend() {
        let (_, storage) = storage();
        assert_eq!(storage.root_url(), "memory://bucket");
    }

    #[tokio::test]
    async fn get_missing_is_not_exist() {
        let (_, storage) = storage();
        let err = storage.get("a/nope.txt").await.unwrap_err();
        assert!(err.is_not_exist());
        assert_eq!(storage.get("a/b.txt").await.unwrap(), b"bee");
    }

    #[tokio::test]
    async fn put_then_get() {
        let (_, storage) = storage();
        storage.put("x/y.bin", &[0, 1, 2]).await.unwrap();
        assert_eq!(storage.get("x/y.bin").await.unwrap(), [0, 1, 2]);
    }

    #[tokio::test]
    async fn put_directory_is_not_implemented() {
        let (_, storage) = storage();
        let err = storage
            .put_directory(Path::new("/tmp"), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotImplemented(_)));
    }

    #[tokio::test]
    async fn delete_spares_siblings_sharing_a_prefix() {
        let (backend, storage) = storage();
        backend.insert("a/c", "exact");
        backend.insert("a/cat.txt", "sibling");

        let deleted = storage.delete("a/c").await.unwrap();
        assert_eq!(deleted, 1);
        assert!(!backend.contains("a/c"));
        assert!(!backend.contains("a/c/d.txt"));
        assert!(backend.contains("a/cat.txt"));
        assert!(backend.contains("a/b.txt"));
    }

    #[tokio::test]
    async fn zero_concurrency_surfaces_config_error() {
        let (_, storage) = storage();
        let err = storage
            .with_concurrency(0)
            .delete("a")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[tokio::test]
    async fn zero_concurrency_delete_keeps_the_exact_key() {
        let (backend, storage) = storage();
        backend.insert("a/c", "exact");

        let err = storage
            .with_concurrency(0)
            .delete("a/c")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
        assert!(backend.contains("a/c"));
        assert!(backend.contains("a/c/d.txt"));
    }

    #[tokio::test]
    async fn failed_first_listing_deletes_nothing() {
        let backend = Arc::new(MemoryBackend::new("bucket").fail_list_call(0));
        backend.insert("a/c", "exact");
        backend.insert("a/c/d.txt", "dee");
        let storage = Storage::new(backend.clone());

        let err = storage.delete("a/c").await.unwrap_err();
        assert!(matches!(err, StorageError::List { .. }));
        assert_eq!(backend.keys(), ["a/c", "a/c/d.txt"]);
    }

    #[tokio::test]
    async fn failed_nested_delete_keeps_the_exact_key() {
        let backend = Arc::new(MemoryBackend::new("bucket").fail_delete("a/c/d.txt"));
        backend.insert("a/c", "exact");
        backend.insert("a/c/d.txt", "dee");
        let storage = Storage::new(backend.clone());

        let err = storage.delete("a/c").await.unwrap_err();
        assert!(matches!(err, StorageError::Transfer { .. }));
        assert!(backend.contains("a/c"));
        assert!(backend.contains("a/c/d.txt"));
    }

    #[tokio::test]
    async fn get_failure_is_a_transfer_error_naming_the_url() {
        let backend = Arc::new(MemoryBackend::new("bucket").fail_read("a/b.txt"));
        backend.insert("a/b.txt", "bee");
        let storage = Storage::new(backend);

        let err = storage.get("a/b.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::Transfer { .. }));
        assert!(!err.is_not_exist());
        assert!(err.to_string().contains("memory://bucket/a/b.txt"), "{err}");
    }

    #[tokio::test]
    async fn get_directory_rejects_traversal_keys() {
        let (backend, storage) = storage();
        backend.insert("a/../escape.txt", "nope");
        let dir = tempfile::tempdir().unwrap();
        let err = storage.get_directory("a", dir.path()).await.unwrap_err();
        assert!(matches!(err, StorageError::Path { .. }));
        assert!(!dir.path().join("../escape.txt").exists());
    }

    #[tokio::test]
    async fn get_directory_turns_markers_into_directories() {
        let (backend, storage) = storage();
        backend.insert("a/empty/", "");
        let dir = tempfile::tempdir().unwrap();
        storage.get_directory("a", dir.path()).await.unwrap();
        assert!(dir.path().join("empty").is_dir());
    }
}
