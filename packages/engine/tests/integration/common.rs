use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use beacon_engine::{ChangeStream, Document, DocumentStore, Filter, MemoryStore, StoreError};

static TRACING: Once = Once::new();

/// Route engine logs to the test harness output
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
    });
}

/// Store whose subscriptions fail for selected keys
pub struct FlakyStore {
    inner: MemoryStore,
    broken_keys: HashSet<String>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore, broken_keys: &[&str]) -> Arc<Self> {
        Arc::new(Self { inner, broken_keys: broken_keys.iter().map(|key| key.to_string()).collect() })
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, key).await
    }

    async fn set(&self, collection: &str, key: &str, fields: Document, merge: bool) -> Result<(), StoreError> {
        self.inner.set(collection, key, fields, merge).await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, key).await
    }

    async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<(String, Document)>, StoreError> {
        self.inner.query(collection, filter).await
    }

    async fn subscribe(&self, collection: &str, filter: Filter) -> Result<ChangeStream, StoreError> {
        if let Filter::Key(key) = &filter {
            if self.broken_keys.contains(key) {
                return Err(StoreError::Unavailable(format!("listener for {key} refused")));
            }
        }
        self.inner.subscribe(collection, filter).await
    }
}

/// Store whose writes take a configurable time. Tracks how many writes overlap.
pub struct SlowStore {
    inner: MemoryStore,
    delay_ms: AtomicU64,
    started: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowStore {
    pub fn new(inner: MemoryStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            delay_ms: AtomicU64::new(0),
            started: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Writes started so far
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for SlowStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, key).await
    }

    async fn set(&self, collection: &str, key: &str, fields: Document, merge: bool) -> Result<(), StoreError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let overlapping = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(overlapping, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(self.delay_ms.load(Ordering::SeqCst))).await;
        let result = self.inner.set(collection, key, fields, merge).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, key).await
    }

    async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<(String, Document)>, StoreError> {
        self.inner.query(collection, filter).await
    }

    async fn subscribe(&self, collection: &str, filter: Filter) -> Result<ChangeStream, StoreError> {
        self.inner.subscribe(collection, filter).await
    }
}
