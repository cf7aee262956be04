//! Bounded, first-error-wins bulk operations over a recursive listing.

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{Backend, ObjectRecord};
use crate::error::{Result, StorageError};
use crate::list::list;
use crate::path::normalize_prefix;

/// Concurrency used by the gateway's bulk operations.
pub const DEFAULT_CONCURRENCY: usize = 128;

/// Run `op` once for every object under `prefix`, at most `concurrency` at a
/// time.
///
/// The first failure, from the listing or from any `op`, stops further
/// submissions and is the error returned. Operations already running are left
/// to finish; the call only returns once every spawned operation has
/// completed. Returns the number of objects processed.
pub async fn apply_recursive<F, Fut>(
    backend: Arc<dyn Backend>,
    prefix: &str,
    concurrency: usize,
    op: F,
) -> Result<usize>
where
    F: Fn(ObjectRecord) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    if concurrency == 0 {
        return Err(StorageError::Config(
            "concurrency must be at least 1".to_string(),
        ));
    }

    let prefix = normalize_prefix(prefix);
    let tokens = Arc::new(Semaphore::new(concurrency));
    let failure = Arc::new(FirstFailure::default());
    let mut units = JoinSet::new();
    let mut records = list(backend, &prefix, None);
    let mut submitted = 0usize;

    loop {
        let record = tokio::select! {
            biased;
            _ = failure.cancelled() => break,
            next = records.next() => match next {
                Some(Ok(record)) => record,
                Some(Err(err)) => {
                    failure.record(err);
                    break;
                }
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            _ = failure.cancelled() => break,
            permit = tokens.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        debug!(key = %record.key, "submitting");
        let unit = op(record);
        let failure = failure.clone();
        units.spawn(async move {
            let _permit = permit;
            if let Err(err) = unit.await {
                failure.record(err);
            }
        });
        submitted += 1;
    }
    drop(records);

    while let Some(joined) = units.join_next().await {
        if let Err(err) = joined {
            if err.is_panic() {
                std::panic::resume_unwind(err.into_panic());
            }
        }
    }

    match failure.take() {
        Some(err) => Err(err),
        None => Ok(submitted),
    }
}

/// The single "first error" slot shared by one bulk call, together with the
/// cancellation signal it trips.
#[derive(Default)]
struct FirstFailure {
    slot: Mutex<Option<StorageError>>,
    cancel: CancellationToken,
}

impl FirstFailure {
    fn record(&self, err: StorageError) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            warn!(error = %err, "bulk operation failed, cancelling remaining work");
            *slot = Some(err);
        } else {
            debug!(error = %err, "discarding later failure");
        }
        self.cancel.cancel();
    }

    async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    fn take(&self) -> Option<StorageError> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}
