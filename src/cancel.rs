//! Cooperative cancellation for runs and acquisitions
//!
//! The caller holds a token and cancels it; long-running work checks it at
//! safe points (before a pass, before a retry attempt, before persisting).
//! Work already committed stays committed; nothing half-built is saved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Raised at a checkpoint once cancellation has been requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

/// A cooperative cancellation token shared by every task of a run.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation. Takes effect at the next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Checkpoint: `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_passes_until_cancelled() {
        let token = CancellationToken::new();
        assert_eq!(token.checkpoint(), Ok(()));
        token.cancel();
        assert_eq!(token.checkpoint(), Err(Cancelled));
    }

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
