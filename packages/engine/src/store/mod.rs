//! Document store contract consumed by the engine.
//!
//! The store is document oriented: collections of JSON objects addressed by
//! key, with change subscriptions that deliver the current matching snapshot
//! followed by live changes. Writes are treated as eventually consistent.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::{FailureMode, MemoryStore};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::Error;

/// A stored document, a JSON object of fields
pub type Document = serde_json::Map<String, Value>;

/// Stream of changes produced by [`DocumentStore::subscribe`]
pub type ChangeStream = BoxStream<'static, Result<Change, StoreError>>;

/// Selects documents within a collection
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document in the collection
    All,
    /// The single document stored under this key
    Key(String),
    /// Documents whose top-level `field` equals `value`
    FieldEquals { field: String, value: Value },
}

impl Filter {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::FieldEquals { field: field.into(), value: value.into() }
    }

    pub fn matches(&self, key: &str, document: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Key(wanted) => wanted == key,
            Self::FieldEquals { field, value } => document.get(field) == Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Document added or changed
    Upserted,
    /// Document deleted; the change carries its last contents
    Removed,
}

/// One observed change to a document
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    pub key: String,
    pub document: Document,
}

impl Change {
    pub fn upserted(key: impl Into<String>, document: Document) -> Self {
        Self { kind: ChangeKind::Upserted, key: key.into(), document }
    }

    pub fn removed(key: impl Into<String>, document: Document) -> Self {
        Self { kind: ChangeKind::Removed, key: key.into(), document }
    }
}

/// Remote document store with per-collection subscriptions
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetch one document, `None` when the key does not exist
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    /// Write `fields` under `key`.
    ///
    /// With `merge` the fields are merged into the existing document and a
    /// `null` value removes that field; without it the document is replaced.
    async fn set(
        &self,
        collection: &str,
        key: &str,
        fields: Document,
        merge: bool,
    ) -> Result<(), StoreError>;

    /// Delete one document. A missing key yields [`StoreError::NotFound`].
    async fn delete(&self, collection: &str, key: &str) -> Result<(), StoreError>;

    /// One-shot query returning `(key, document)` pairs in insertion order
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<(String, Document)>, StoreError>;

    /// Subscribe to matching documents: current snapshot first, then live changes
    async fn subscribe(&self, collection: &str, filter: Filter) -> Result<ChangeStream, StoreError>;
}

/// Build a document from a JSON object literal; any other value yields an empty document.
pub fn object(value: Value) -> Document {
    match value {
        Value::Object(fields) => fields,
        _ => Document::new(),
    }
}

/// Serialize a value into a store document.
pub fn to_document<T: Serialize>(collection: &str, key: &str, value: &T) -> Result<Document, Error> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(Error::malformed(collection, key, format!("expected object, got {other}"))),
        Err(e) => Err(Error::malformed(collection, key, e)),
    }
}

/// Deserialize a store document, reporting missing or invalid fields as malformed.
pub fn from_document<T: DeserializeOwned>(
    collection: &str,
    key: &str,
    document: &Document,
) -> Result<T, Error> {
    serde_json::from_value(Value::Object(document.clone()))
        .map_err(|e| Error::malformed(collection, key, e))
}
