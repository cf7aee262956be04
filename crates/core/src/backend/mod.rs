pub mod local;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWrite;

/// Default number of records returned per listing page, matching the S3
/// `max-keys` default.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One entry returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectRecord {
    pub key: String,
    /// Synthetic "directory" produced by a delimited listing.
    pub is_prefix: bool,
}

impl ObjectRecord {
    pub fn object(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_prefix: false,
        }
    }

    pub fn prefix(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_prefix: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub prefix: String,
    /// When set, keys are collapsed at the first delimiter past the prefix.
    pub delimiter: Option<String>,
}

impl ListQuery {
    pub fn recursive(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: None,
        }
    }

    pub fn shallow(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: Some(delimiter.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub records: Vec<ObjectRecord>,
    /// `None` once the listing is exhausted.
    pub next_token: Option<String>,
}

/// A flat, prefix-addressed object namespace.
///
/// Implementations must be usable from many tasks at once without external
/// locking.
#[async_trait]
pub trait Backend: Send + Sync {
    /// URL of the namespace root, e.g. `s3://bucket`.
    fn root_url(&self) -> String;

    /// Fetch one page of a listing. Pass the previous page's `next_token` to
    /// continue.
    async fn list_page(
        &self,
        query: &ListQuery,
        token: Option<String>,
    ) -> Result<ListPage, BackendError>;

    /// Stream the object's bytes into `sink`, returning the number copied.
    async fn read_into(
        &self,
        key: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, BackendError>;

    async fn write(&self, key: &str, data: &[u8]) -> Result<(), BackendError>;

    async fn delete(&self, key: &str) -> Result<(), BackendError>;
}

/// Cut one listing page out of a lexicographically sorted key set.
///
/// Shared by the in-process backends. `token` is a start-after cursor: the
/// last key or prefix marker handed out by the previous page.
pub(crate) fn page_sorted_keys<'a, I>(
    keys: I,
    query: &ListQuery,
    token: Option<&str>,
    page_size: usize,
) -> ListPage
where
    I: IntoIterator<Item = &'a str>,
{
    let page_size = page_size.max(1);
    let delimiter = query.delimiter.as_deref().filter(|d| !d.is_empty());
    let mut page = ListPage::default();

    for key in keys {
        let Some(rest) = key.strip_prefix(query.prefix.as_str()) else {
            continue;
        };
        if let Some(token) = token {
            let under_marker =
                delimiter.is_some_and(|d| token.ends_with(d) && key.starts_with(token));
            if key <= token || under_marker {
                continue;
            }
        }

        let record = match delimiter.and_then(|d| rest.find(d).map(|i| i + d.len())) {
            Some(end) => ObjectRecord::prefix(&key[..query.prefix.len() + end]),
            None => ObjectRecord::object(key),
        };
        if record.is_prefix && page.records.last() == Some(&record) {
            continue;
        }
        if page.records.len() == page_size {
            page.next_token = page.records.last().map(|r| r.key.clone());
            break;
        }
        page.records.push(record);
    }
    page
}
