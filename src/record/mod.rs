//! Adjacency records: the per-token unit that is acquired and persisted

mod sanitize;
mod types;
mod validate;

pub use sanitize::{extract_json, sanitize, Sanitized};
pub use types::{
    empty_slots, normalize_token, AdjacencyRecord, Edge, Provenance, RecordMeta, Slots,
    RECORD_LANGUAGE, RECORD_VERSION,
};
pub use validate::{epoch_floor, is_junk, validate, SchemaViolation};
