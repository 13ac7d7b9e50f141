use purse_domain::RecordError;
use thiserror::Error;

use crate::{remote::RemoteError, store::Collection};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("store not initialized (collection `{collection}`)")]
    StoreNotInitialized { collection: Collection },
    #[error("record `{key}` already exists in `{collection}`")]
    DuplicateKey { collection: Collection, key: String },
    #[error("record in `{collection}` has no string `{field}` key")]
    MissingKey {
        collection: Collection,
        field: &'static str,
    },
    #[error("storage error in `{collection}`: {message}")]
    Storage {
        collection: Collection,
        message: String,
    },
    #[error("key-value storage error for `{key}`: {message}")]
    KeyValue { key: String, message: String },
    #[error("remote write to `{path}` failed: {source}")]
    RemoteWriteFailed { path: String, source: RemoteError },
    #[error("restore from remote failed: {0}")]
    RemoteRestoreFailed(String),
    #[error("migration failed: {0}")]
    MigrationFailed(String),
    #[error("invalid import: {0}")]
    InvalidImport(String),
    #[error(transparent)]
    InvalidRecord(#[from] RecordError),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Category not found: {0}")]
    CategoryNotFound(String),
    #[error("Category `{0}` is still referenced by transactions")]
    CategoryInUse(String),
    #[error("Transaction `{0}` is not a recurring template")]
    NotARecurringTemplate(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn storage(collection: Collection, message: impl Into<String>) -> Self {
        Self::Storage {
            collection,
            message: message.into(),
        }
    }

    /// Collection the failure happened in, when it came from the local store.
    pub fn collection(&self) -> Option<Collection> {
        match self {
            Self::StoreNotInitialized { collection }
            | Self::DuplicateKey { collection, .. }
            | Self::MissingKey { collection, .. }
            | Self::Storage { collection, .. } => Some(*collection),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}
