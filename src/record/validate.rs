//! Structural validation and degenerate-record detection

use super::types::{AdjacencyRecord, RECORD_LANGUAGE, RECORD_VERSION};
use crate::relation::RelationName;
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

/// A structural problem found in an adjacency record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("version {0} != 1")]
    Version(u32),

    #[error("missing token")]
    MissingToken,

    #[error("missing model")]
    MissingModel,

    #[error("meta.language is '{0}', expected 'en'")]
    Language(String),

    #[error("missing slot \"{0}\"")]
    MissingSlot(RelationName),

    #[error("slots[\"{relation}\"][{index}].token is empty")]
    EmptyNeighbor { relation: RelationName, index: usize },

    #[error("slots[\"{relation}\"][{index}].w = {weight} is out of range")]
    WeightOutOfRange {
        relation: RelationName,
        index: usize,
        weight: f64,
    },
}

/// Check a record against the schema.
///
/// The typed representation already guarantees the version marker is an
/// integer, the source is LLM or BOOTSTRAP and the timestamp is present, so
/// only value-level constraints remain to be checked here.
pub fn validate(record: &AdjacencyRecord) -> Result<(), SchemaViolation> {
    if record.version != RECORD_VERSION {
        return Err(SchemaViolation::Version(record.version));
    }
    if record.token.trim().is_empty() {
        return Err(SchemaViolation::MissingToken);
    }
    if record.model.trim().is_empty() {
        return Err(SchemaViolation::MissingModel);
    }
    if record.meta.language != RECORD_LANGUAGE {
        return Err(SchemaViolation::Language(record.meta.language.clone()));
    }
    for relation in RelationName::ALL {
        let Some(edges) = record.slots.get(&relation) else {
            return Err(SchemaViolation::MissingSlot(relation));
        };
        for (index, edge) in edges.iter().enumerate() {
            if edge.neighbor.trim().is_empty() {
                return Err(SchemaViolation::EmptyNeighbor { relation, index });
            }
            if !edge.weight.is_finite() || !(0.0..=1.0).contains(&edge.weight) {
                return Err(SchemaViolation::WeightOutOfRange {
                    relation,
                    index,
                    weight: edge.weight,
                });
            }
        }
    }
    Ok(())
}

/// Records downloaded before this instant are considered stale.
pub fn epoch_floor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

const PLACEHOLDER_MODELS: [&str; 3] = ["default", "model_name", "language_model"];

/// Whether a cached record is degenerate and should be re-acquired.
///
/// Junk means: the model identifier is an unset placeholder, the timestamp
/// predates [`epoch_floor`], or every slot is empty.
pub fn is_junk(record: &AdjacencyRecord) -> bool {
    let model = record.model.to_lowercase();
    let placeholder_model =
        model.trim().is_empty() || PLACEHOLDER_MODELS.iter().any(|p| model.contains(p));
    let too_old = record.meta.downloaded_at < epoch_floor();
    let empty = record.slots.values().all(Vec::is_empty);
    placeholder_model || too_old || empty
}
