use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::{StreamExt, future, stream};
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;

use super::{Change, ChangeStream, Document, DocumentStore, Filter, StoreError};

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// Failure injected into a [`MemoryStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Requests fail with [`StoreError::Unavailable`]
    Unavailable,
    /// Requests fail with [`StoreError::PermissionDenied`]
    PermissionDenied,
}

impl FailureMode {
    fn to_error(self, operation: &str) -> StoreError {
        match self {
            Self::Unavailable => StoreError::Unavailable(format!("{operation}: store offline")),
            Self::PermissionDenied => {
                StoreError::PermissionDenied(format!("{operation}: rejected by store rules"))
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    document: Document,
}

#[derive(Default)]
struct Failures {
    reads: Option<FailureMode>,
    writes: Option<FailureMode>,
}

struct Inner {
    collections: RwLock<HashMap<String, HashMap<String, Entry>>>,
    changes: broadcast::Sender<(String, Change)>,
    failures: RwLock<Failures>,
    next_seq: AtomicU64,
    writes: AtomicU64,
}

/// In-process document store with live subscriptions.
///
/// Queries return documents in insertion order; rewriting an existing key
/// keeps its position. Failures can be injected for reads and writes
/// independently.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                changes,
                failures: RwLock::new(Failures::default()),
                next_seq: AtomicU64::new(0),
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Make subsequent `get`, `query` and `subscribe` calls fail
    pub async fn set_read_failure(&self, mode: Option<FailureMode>) {
        self.inner.failures.write().await.reads = mode;
    }

    /// Make subsequent `set` and `delete` calls fail
    pub async fn set_write_failure(&self, mode: Option<FailureMode>) {
        self.inner.failures.write().await.writes = mode;
    }

    /// Number of successful `set` and `delete` calls so far
    pub fn writes(&self) -> u64 {
        self.inner.writes.load(Ordering::Acquire)
    }

    /// Number of documents currently stored in `collection`
    pub async fn len(&self, collection: &str) -> usize {
        self.inner.collections.read().await.get(collection).map_or(0, HashMap::len)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    async fn check_read(&self, operation: &str) -> Result<(), StoreError> {
        match self.inner.failures.read().await.reads {
            Some(mode) => Err(mode.to_error(operation)),
            None => Ok(()),
        }
    }

    async fn check_write(&self, operation: &str) -> Result<(), StoreError> {
        match self.inner.failures.read().await.writes {
            Some(mode) => Err(mode.to_error(operation)),
            None => Ok(()),
        }
    }

    fn publish(&self, collection: &str, change: Change) {
        // No receivers is fine, nobody is subscribed yet.
        let _ = self.inner.changes.send((collection.to_string(), change));
    }
}

fn merge_fields(target: &mut Document, fields: Document) {
    for (field, value) in fields {
        if value.is_null() {
            target.remove(&field);
        } else {
            target.insert(field, value);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        self.check_read("get").await?;
        let collections = self.inner.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .map(|entry| entry.document.clone()))
    }

    async fn set(
        &self,
        collection: &str,
        key: &str,
        fields: Document,
        merge: bool,
    ) -> Result<(), StoreError> {
        self.check_write("set").await?;

        let document = {
            let mut collections = self.inner.collections.write().await;
            let docs = collections.entry(collection.to_string()).or_default();
            let entry = docs.entry(key.to_string()).or_insert_with(|| Entry {
                seq: self.inner.next_seq.fetch_add(1, Ordering::AcqRel),
                document: Document::new(),
            });

            if !merge {
                entry.document.clear();
            }
            merge_fields(&mut entry.document, fields);
            entry.document.clone()
        };

        self.inner.writes.fetch_add(1, Ordering::AcqRel);
        debug!(collection, key, merge, "document written");
        self.publish(collection, Change::upserted(key, document));
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        self.check_write("delete").await?;

        let removed = {
            let mut collections = self.inner.collections.write().await;
            collections.get_mut(collection).and_then(|docs| docs.remove(key))
        };

        match removed {
            Some(entry) => {
                self.inner.writes.fetch_add(1, Ordering::AcqRel);
                debug!(collection, key, "document deleted");
                self.publish(collection, Change::removed(key, entry.document));
                Ok(())
            },
            None => Err(StoreError::not_found(collection, key)),
        }
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        self.check_read("query").await?;

        let collections = self.inner.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matching: Vec<(u64, String, Document)> = docs
            .iter()
            .filter(|(key, entry)| filter.matches(key, &entry.document))
            .map(|(key, entry)| (entry.seq, key.clone(), entry.document.clone()))
            .collect();
        matching.sort_by_key(|(seq, _, _)| *seq);

        Ok(matching.into_iter().map(|(_, key, document)| (key, document)).collect())
    }

    async fn subscribe(&self, collection: &str, filter: Filter) -> Result<ChangeStream, StoreError> {
        self.check_read("subscribe").await?;

        // Subscribe before taking the snapshot so no change falls in between;
        // a change may be seen twice, consumers treat upserts idempotently.
        let receiver = self.inner.changes.subscribe();
        let snapshot = self.query(collection, &filter).await?;

        let initial = stream::iter(
            snapshot.into_iter().map(|(key, document)| Ok(Change::upserted(key, document))),
        );

        let collection = collection.to_string();
        let live = BroadcastStream::new(receiver).filter_map(move |item| {
            let item = match item {
                Ok((changed, change))
                    if changed == collection && filter.matches(&change.key, &change.document) =>
                {
                    Some(Ok(change))
                },
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => Some(Err(StoreError::Lagged(skipped))),
            };
            future::ready(item)
        });

        Ok(initial.chain(live).boxed())
    }
}
