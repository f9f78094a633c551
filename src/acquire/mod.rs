//! Acquisition & validation protocol
//!
//! Turns `(token, model)` into a schema-valid, non-degenerate
//! [`AdjacencyRecord`](crate::record::AdjacencyRecord). The model is asked up
//! to three times with escalating instructions; if every pass comes back too
//! sparse the record is seeded locally so no caller ever receives a record
//! with zero evidence.
//!
//! Error taxonomy:
//! - transient upstream failures (no status, 5xx, 429) and unparseable
//!   responses are retried with backoff inside a pass; a parse failure that
//!   outlasts the budget surfaces as an upstream error without a status;
//! - permanent upstream failures (other statuses) fail immediately;
//! - a schema mismatch ends the pass and escalates to the next one;
//! - insufficient coverage is not an error, it drives escalation.

mod protocol;
mod retry;

pub use protocol::{
    bootstrap_neighbors, AcquireConfig, Acquirer, Acquisition, LadderState, PassKind,
    PassOutcome, PassReport, GENERIC_NEIGHBORS,
};
pub use retry::{
    RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper, DEFAULT_BACKOFF_MS, DEFAULT_RETRIES,
};

use crate::cancel::Cancelled;
use crate::llm::GenerationError;
use crate::record::SchemaViolation;
use thiserror::Error;

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "no status".to_string(),
    }
}

/// Errors surfaced by [`Acquirer::acquire`]
#[derive(Debug, Clone, Error)]
pub enum AcquireError {
    #[error("upstream error ({}): {message}", status_label(.status))]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// One attempt's text held no JSON object. Retried inside a pass; once
    /// the budget is spent it surfaces as `Upstream` without a status.
    #[error("response was not recoverable JSON: {0}")]
    Unparseable(String),

    #[error("schema mismatch: {0}")]
    Schema(#[from] SchemaViolation),

    #[error("acquisition cancelled")]
    Cancelled,
}

impl AcquireError {
    /// Whether a failed attempt may be repeated as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            AcquireError::Upstream { status: None, .. } => true,
            AcquireError::Upstream {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            AcquireError::Unparseable(_) => true,
            AcquireError::Schema(_) | AcquireError::Cancelled => false,
        }
    }

    /// The form a pass's final error takes once its retry budget is spent.
    pub(crate) fn into_exhausted(self) -> Self {
        match self {
            AcquireError::Unparseable(excerpt) => AcquireError::Upstream {
                status: None,
                message: format!("no parseable response after retries: {}", excerpt),
            },
            other => other,
        }
    }

    /// HTTP status of an upstream rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AcquireError::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<GenerationError> for AcquireError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Unconfigured(message) => AcquireError::Upstream {
                // A client that cannot even be used behaves like a rejection.
                status: Some(401),
                message,
            },
            other => AcquireError::Upstream {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

impl From<Cancelled> for AcquireError {
    fn from(_: Cancelled) -> Self {
        AcquireError::Cancelled
    }
}
