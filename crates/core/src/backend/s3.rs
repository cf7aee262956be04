use anyhow::Context;
use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use tokio::io::AsyncWrite;

use super::{Backend, BackendError, ListPage, ListQuery, ObjectRecord};
use crate::error::StorageError;

pub struct S3Backend {
    bucket: Box<Bucket>,
}

impl S3Backend {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
    ) -> crate::Result<Self> {
        let connection_error = |source: anyhow::Error| StorageError::Connection {
            target: format!("s3://{bucket_name}"),
            source,
        };
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };
        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| connection_error(e.into()))?;
        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| connection_error(e.into()))?
            .with_path_style();
        Ok(Self { bucket })
    }
}

fn classify(err: S3Error, key: &str, op: &str) -> BackendError {
    match err {
        S3Error::HttpFailWithBody(404, _) => BackendError::NotFound(key.to_string()),
        other => {
            BackendError::Other(anyhow::Error::new(other).context(format!("S3 {op} failed: {key}")))
        }
    }
}

#[async_trait]
impl Backend for S3Backend {
    fn root_url(&self) -> String {
        format!("s3://{}", self.bucket.name())
    }

    async fn list_page(
        &self,
        query: &ListQuery,
        token: Option<String>,
    ) -> Result<ListPage, BackendError> {
        let (result, _status) = self
            .bucket
            .list_page(query.prefix.clone(), query.delimiter.clone(), token, None, None)
            .await
            .with_context(|| format!("S3 LIST failed: {}", query.prefix))?;

        let mut records: Vec<ObjectRecord> = result
            .contents
            .into_iter()
            .map(|obj| ObjectRecord::object(obj.key))
            .collect();
        records.extend(
            result
                .common_prefixes
                .unwrap_or_default()
                .into_iter()
                .map(|p| ObjectRecord::prefix(p.prefix)),
        );

        let next_token = if result.is_truncated {
            result.next_continuation_token
        } else {
            None
        };
        Ok(ListPage {
            records,
            next_token,
        })
    }

    async fn read_into(
        &self,
        key: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, BackendError> {
        let mut counter = CountingWriter {
            inner: sink,
            written: 0,
        };
        let status = self
            .bucket
            .get_object_to_writer(key, &mut counter)
            .await
            .map_err(|e| classify(e, key, "GET"))?;
        match status {
            200..=299 => Ok(counter.written),
            404 => Err(BackendError::NotFound(key.to_string())),
            code => Err(anyhow::anyhow!("S3 GET failed: {key} returned {code}").into()),
        }
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<(), BackendError> {
        self.bucket
            .put_object(key, data)
            .await
            .map_err(|e| classify(e, key, "PUT"))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        match self.bucket.delete_object(key).await {
            Ok(_) => Ok(()),
            Err(e) => match classify(e, key, "DELETE") {
                BackendError::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }
}

/// Counts bytes on their way into the caller's sink; `get_object_to_writer`
/// only reports the status code.
struct CountingWriter<'a> {
    inner: &'a mut (dyn AsyncWrite + Send + Unpin),
    written: u64,
}

impl AsyncWrite for CountingWriter<'_> {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        let poll = std::pin::Pin::new(&mut *self.inner).poll_write(cx, buf);
        if let std::task::Poll::Ready(Ok(n)) = poll {
            self.written += n as u64;
        }
        poll
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut *self.inner).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut *self.inner).poll_shutdown(cx)
    }
}
