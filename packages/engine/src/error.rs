use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::notify::NotifyError;
use crate::store::StoreError;

/// Errors surfaced by the engine
#[derive(Error, Debug)]
pub enum Error {
    /// The document store rejected or could not serve a request
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A fetched record is missing required fields or holds invalid values
    #[error("Malformed document {collection}/{key}: {reason}")]
    MalformedDocument { collection: String, key: String, reason: String },

    /// The presence session actor has stopped
    #[error("Presence session for {0} is closed")]
    SessionClosed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new MalformedDocument error
    pub fn malformed<R: fmt::Display>(collection: &str, key: &str, reason: R) -> Self {
        Self::MalformedDocument {
            collection: collection.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(store) => store.is_transient(),
            _ => false,
        }
    }
}
