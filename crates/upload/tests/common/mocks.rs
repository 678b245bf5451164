//! Fault-injecting storage wrapper for failure-path tests.

use async_trait::async_trait;
use bytes::Bytes;
use silo_storage::{ByteStream, ObjectMeta, ObjectStore, StorageError, StorageResult, StreamingUpload};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Delegating backend that fails the first `fail_puts` put() calls.
#[derive(Debug)]
pub struct FlakyBackend {
    inner: Arc<dyn ObjectStore>,
    remaining_put_failures: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyBackend {
    pub fn new(inner: Arc<dyn ObjectStore>, fail_puts: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            remaining_put_failures: AtomicUsize::new(fail_puts),
        })
    }
}

#[async_trait]
impl ObjectStore for FlakyBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.get_stream(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let remaining = self.remaining_put_failures.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .remaining_put_failures
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(StorageError::Io(std::io::Error::other(
                "injected put failure",
            )));
        }
        self.inner.put(key, data).await
    }

    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        self.inner.put_stream(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}
