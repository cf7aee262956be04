//! Paginated listing as a stream of [`ObjectRecord`]s.

use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::BoxStream;
use tracing::debug;

use crate::backend::{Backend, ListQuery, ObjectRecord};
use crate::error::{Result, StorageError};

pub type RecordStream = BoxStream<'static, Result<ObjectRecord>>;

/// List everything under `prefix`, one backend page at a time.
///
/// With a `delimiter` only the immediate children are returned, with
/// subdirectories collapsed into prefix markers; without one every key at any
/// depth is returned in backend order. The prefix is used as given.
///
/// A backend failure ends the stream with [`StorageError::List`].
pub fn list(backend: Arc<dyn Backend>, prefix: &str, delimiter: Option<&str>) -> RecordStream {
    let query = ListQuery {
        prefix: prefix.to_string(),
        delimiter: delimiter.map(str::to_string),
    };

    Box::pin(try_stream! {
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = backend
                .list_page(&query, token.take())
                .await
                .map_err(|e| StorageError::List {
                    prefix: format!("{}/{}", backend.root_url(), query.prefix),
                    source: e.into(),
                })?;
            pages += 1;
            debug!(prefix = %query.prefix, page = pages, records = page.records.len(), "fetched listing page");

            for record in page.records {
                yield record;
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
    })
}
