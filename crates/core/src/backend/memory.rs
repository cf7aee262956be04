use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{Backend, BackendError, DEFAULT_PAGE_SIZE, ListPage, ListQuery, page_sorted_keys};

/// In-process object namespace, mostly for tests.
///
/// Listing calls are counted. One listing call, and reads or deletes of chosen
/// keys, can be made to fail, which lets tests drive the error paths of
/// everything built on top of the backend.
pub struct MemoryBackend {
    name: String,
    objects: RwLock<BTreeMap<String, Bytes>>,
    page_size: usize,
    list_calls: AtomicUsize,
    fail_list_call: Option<usize>,
    fail_reads: BTreeSet<String>,
    fail_deletes: BTreeSet<String>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            list_calls: AtomicUsize::new(0),
            fail_list_call: None,
            fail_reads: BTreeSet::new(),
            fail_deletes: BTreeSet::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Make the `call`-th listing request (zero based, counted across all
    /// listings) fail.
    pub fn fail_list_call(mut self, call: usize) -> Self {
        self.fail_list_call = Some(call);
        self
    }

    /// Make every read of `key` fail with a non-missing error.
    pub fn fail_read(mut self, key: impl Into<String>) -> Self {
        self.fail_reads.insert(key.into());
        self
    }

    /// Make every delete of `key` fail, leaving the object in place.
    pub fn fail_delete(mut self, key: impl Into<String>) -> Self {
        self.fail_deletes.insert(key.into());
        self
    }

    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), data.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn get(&self, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn root_url(&self) -> String {
        format!("memory://{}", self.name)
    }

    async fn list_page(
        &self,
        query: &ListQuery,
        token: Option<String>,
    ) -> Result<ListPage, BackendError> {
        // one page per scheduling slot, as with a remote listing
        tokio::task::yield_now().await;
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_call == Some(call) {
            return Err(anyhow!("injected listing failure on call {call}").into());
        }
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        Ok(page_sorted_keys(
            objects.keys().map(String::as_str),
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
        if self.fail_reads.contains(key) {
            return Err(anyhow!("injected read failure for {key}").into());
        }
        let data = self
            .get(key)
            .ok_or_else(|| BackendError::NotFound(key.to_string()))?;
        sink.write_all(&data)
            .await
            .map_err(|e| anyhow::Error::new(e).context(format!("failed to write {key}")))?;
        Ok(data.len() as u64)
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<(), BackendError> {
        self.insert(key, Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        if self.fail_deletes.contains(key) {
            return Err(anyhow!("injected delete failure for {key}").into());
        }
        self.objects
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}
