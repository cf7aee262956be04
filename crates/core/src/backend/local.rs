use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use tokio::io::AsyncWrite;

use super::{Backend, BackendError, DEFAULT_PAGE_SIZE, ListPage, ListQuery, page_sorted_keys};
use crate::error::StorageError;

/// A local directory viewed as a flat key namespace. Keys are the `/`-joined
/// paths of regular files relative to the root.
pub struct LocalBackend {
    root: PathBuf,
    page_size: usize,
}

impl LocalBackend {
    /// Open an existing directory.
    pub fn new(path: impl AsRef<Path>) -> crate::Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StorageError::Connection {
                target: root.display().to_string(),
                source: anyhow!("not a directory"),
            });
        }
        Ok(Self {
            root,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Create the directory if needed, then open it.
    pub fn init(path: impl AsRef<Path>) -> crate::Result<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::Connection {
            target: root.display().to_string(),
            source: anyhow::Error::new(e).context("failed to create directory"),
        })?;
        Self::new(root)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    fn full_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        if key.is_empty()
            || key
                .split('/')
                .any(|part| part.is_empty() || part == "." || part == "..")
        {
            anyhow::bail!("invalid key: {key:?}");
        }
        Ok(self.root.join(key))
    }

    /// File keys that can start with `prefix`, sorted. Only the directory
    /// holding the prefix's last complete component is walked; the caller
    /// still filters on the full prefix.
    async fn keys_under(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let start = match prefix.rfind('/') {
            None => (self.root.clone(), String::new()),
            Some(end) => {
                let Ok(dir) = self.full_path(&prefix[..end]) else {
                    return Ok(Vec::new());
                };
                if !tokio::fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
                    return Ok(Vec::new());
                }
                (dir, prefix[..=end].to_string())
            }
        };

        let mut keys = Vec::new();
        let mut pending = vec![start];

        while let Some((dir, dir_key)) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("failed to read directory: {}", dir.display()))?;
            while let Some(entry) = read_dir.next_entry().await? {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let key = format!("{dir_key}{name}");
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), format!("{key}/")));
                } else if file_type.is_file() {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn root_url(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn list_page(
        &self,
        query: &ListQuery,
        token: Option<String>,
    ) -> Result<ListPage, BackendError> {
        let keys = self.keys_under(&query.prefix).await?;
        Ok(page_sorted_keys(
            keys.iter().map(String::as_str),
            query,
            token.as_deref(),
            self.page_size,
        ))
    }

    async fn read_into(
        &self,
        key: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, BackendError> {
        let full = self.full_path(key)?;
        if full.is_dir() {
            return Err(BackendError::NotFound(key.to_string()));
        }
        let mut file = match tokio::fs::File::open(&full).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BackendError::NotFound(key.to_string()));
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("failed to open: {}", full.display()))
                    .into());
            }
        };
        let copied = tokio::io::copy(&mut file, sink)
            .await
            .with_context(|| format!("failed to read: {}", full.display()))?;
        Ok(copied)
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<(), BackendError> {
        let full = self.full_path(key)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
        tokio::fs::write(&full, data)
            .await
            .with_context(|| format!("failed to write: {}", full.display()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let full = self.full_path(key)?;
        if full.is_file() {
            tokio::fs::remove_file(&full)
                .await
                .with_context(|| format!("failed to delete: {}", full.display()))?;
        }
        Ok(())
    }
}
