//! Run-scoped record cache
//!
//! Resolves a token to a record: first from the store, otherwise through the
//! acquisition protocol, saving what was acquired. Concurrent requests for
//! the same token share a single in-flight acquisition.

use crate::acquire::{AcquireError, Acquirer};
use crate::cancel::CancellationToken;
use crate::record::{is_junk, normalize_token, validate, AdjacencyRecord};
use crate::storage::{RecordStore, StorageError};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Errors that can occur while resolving a record
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Where a resolved record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Read back from the store (or resolved earlier in this run)
    Cached,
    /// Acquired from the model by this call
    Downloaded,
}

/// Store-backed cache with at most one in-flight acquisition per token.
pub struct RecordCache {
    store: Arc<dyn RecordStore>,
    acquirer: Arc<Acquirer>,
    resolved: DashMap<String, Arc<OnceCell<AdjacencyRecord>>>,
}

impl RecordCache {
    pub fn new(store: Arc<dyn RecordStore>, acquirer: Arc<Acquirer>) -> Self {
        Self {
            store,
            acquirer,
            resolved: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// A stored record that re-validates and is not junk.
    ///
    /// Unreadable, invalid and junk records are reported as absent.
    pub fn load_trusted(&self, token: &str) -> Option<AdjacencyRecord> {
        let record = match self.store.load(token) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!(token, error = %e, "Unreadable cached record, treating as miss");
                return None;
            }
        };
        if let Err(violation) = validate(&record) {
            warn!(token, %violation, "Cached record failed validation, treating as miss");
            return None;
        }
        if is_junk(&record) {
            warn!(token, "Cached record is junk, treating as miss");
            return None;
        }
        Some(record)
    }

    /// Resolve `token`, acquiring and persisting it on a miss.
    ///
    /// Only the call that actually ran the acquisition reports
    /// [`Origin::Downloaded`]; callers that joined it, or came later, see
    /// [`Origin::Cached`]. Failed acquisitions are not remembered.
    pub async fn get_or_acquire(
        &self,
        token: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<(AdjacencyRecord, Origin), CacheError> {
        let key = normalize_token(token);
        if key.is_empty() {
            return Err(StorageError::InvalidToken(token.to_string()).into());
        }

        let cell = self.resolved.entry(key.clone()).or_default().clone();
        let downloaded = AtomicBool::new(false);
        let flag = &downloaded;
        let key_ref = key.as_str();

        let record = cell
            .get_or_try_init(move || async move {
                if let Some(record) = self.load_trusted(key_ref) {
                    debug!(token = key_ref, "Cache hit");
                    return Ok::<_, CacheError>(record);
                }
                let record = self.acquirer.acquire(key_ref, model, None, cancel).await?;
                cancel.checkpoint().map_err(AcquireError::from)?;
                let location = self.store.save(&record)?;
                info!(token = key_ref, location = %location, source = ?record.meta.source, "Record saved");
                flag.store(true, Ordering::Release);
                Ok(record)
            })
            .await?
            .clone();

        let origin = if downloaded.load(Ordering::Acquire) {
            Origin::Downloaded
        } else {
            Origin::Cached
        };
        Ok((record, origin))
    }

    /// Records resolved so far in this run
    pub fn resolved_count(&self) -> usize {
        self.resolved.iter().filter(|entry| entry.value().initialized()).count()
    }

    /// Forget everything resolved in memory; the store is untouched.
    pub fn clear(&self) {
        self.resolved.clear();
    }
}
