use thiserror::Error;

/// Errors reported by a document store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store unreachable or timed out; retry on the next tick or user action
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {collection}/{key}")]
    NotFound { collection: String, key: String },

    /// Rejected by store rules; surfaced to the user, never retried
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A subscription fell behind and dropped this many changes
    #[error("Subscription lagged, {0} changes dropped")]
    Lagged(u64),
}

impl StoreError {
    /// Create a new NotFound error
    pub fn not_found(collection: &str, key: &str) -> Self {
        Self::NotFound { collection: collection.to_string(), key: key.to_string() }
    }

    /// Whether retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Lagged(_))
    }
}
