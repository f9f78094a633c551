//! Storage trait definitions

use crate::record::AdjacencyRecord;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid token: {0:?}")]
    InvalidToken(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for adjacency record storage backends
///
/// Records are keyed by their canonical token (trimmed, lowercase); every
/// method normalizes the token it is given. Implementations must be
/// thread-safe (Send + Sync) so one store can serve concurrent acquisitions.
pub trait RecordStore: Send + Sync {
    /// Load the record stored for a token
    fn load(&self, token: &str) -> StorageResult<Option<AdjacencyRecord>>;

    /// Save a record (insert or replace), returning where it was written
    fn save(&self, record: &AdjacencyRecord) -> StorageResult<String>;

    /// All stored tokens, sorted
    fn list(&self) -> StorageResult<Vec<String>>;

    /// Delete the record for a token
    fn delete(&self, token: &str) -> StorageResult<bool>;

    /// Every stored record keyed by token
    fn export_all(&self) -> StorageResult<BTreeMap<String, AdjacencyRecord>> {
        let mut bundle = BTreeMap::new();
        for token in self.list()? {
            if let Some(record) = self.load(&token)? {
                bundle.insert(token, record);
            }
        }
        Ok(bundle)
    }
}

/// Extension trait for opening stores from paths
pub trait OpenStore: RecordStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;
}

/// Canonical storage key for a token, rejecting blank input.
pub(crate) fn storage_key(token: &str) -> StorageResult<String> {
    let key = crate::record::normalize_token(token);
    if key.is_empty() {
        Err(StorageError::InvalidToken(token.to_string()))
    } else {
        Ok(key)
    }
}
