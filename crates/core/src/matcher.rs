//! Recursive filtered listing, delivered as a lazy stream fed by a background
//! task.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::backend::Backend;
use crate::error::Result;
use crate::list::list;
use crate::path::normalize_prefix;

/// Matches buffered ahead of the consumer.
const MATCH_BUFFER: usize = 64;

/// One emitted match: the key of a matching object, or the listing error
/// that ended the traversal.
pub type MatchResult = Result<String>;

/// Handle on a running traversal.
///
/// Dropping the handle (or calling [`MatchStream::close`]) stops the producer
/// before its next listing page. A listing error is delivered as the final item; the
/// stream ends after it.
pub struct MatchStream {
    rx: mpsc::Receiver<MatchResult>,
}

impl MatchStream {
    /// Stop the producer; matches already buffered can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl Stream for MatchStream {
    type Item = MatchResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Walk everything under `prefix` and stream the keys accepted by `filter`,
/// in listing order.
pub fn match_recursive<P>(backend: Arc<dyn Backend>, prefix: &str, filter: P) -> MatchStream
where
    P: Fn(&str) -> bool + Send + 'static,
{
    let prefix = normalize_prefix(prefix);
    let (tx, rx) = mpsc::channel(MATCH_BUFFER);

    tokio::spawn(async move {
        let mut records = list(backend, &prefix, None);
        let mut matched = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => {
                    debug!(prefix = %prefix, "match consumer went away");
                    return;
                }
                next = records.next() => next,
            };
            let Some(next) = next else {
                break;
            };
            let item = match next {
                Ok(record) if filter(&record.key) => Ok(record.key),
                Ok(_) => continue,
                Err(err) => Err(err),
            };
            let failed = item.is_err();
            if !failed {
                matched += 1;
            }
            if tx.send(item).await.is_err() {
                debug!(prefix = %prefix, "match consumer went away");
                return;
            }
            if failed {
                break;
            }
        }
        debug!(prefix = %prefix, matched, "match traversal finished");
    });

    MatchStream { rx }
}
