//! Adjacency record representation

use crate::relation::RelationName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The only schema version records are written with.
pub const RECORD_VERSION: u32 = 1;

/// Records are always requested and stored in English.
pub const RECORD_LANGUAGE: &str = "en";

/// Where a record's edges came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provenance {
    /// Populated from a generation response
    Llm,
    /// Synthesized locally after every generation pass came back sparse
    Bootstrap,
}

/// A weighted neighbor inside one relation slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Edge {
    /// Neighbor token (trimmed, lowercase)
    #[serde(rename = "token")]
    pub neighbor: String,
    /// Relationship strength (0.0 - 1.0)
    #[serde(rename = "w", alias = "weight")]
    pub weight: f64,
}

impl Edge {
    pub fn new(neighbor: impl Into<String>, weight: f64) -> Self {
        Self {
            neighbor: neighbor.into(),
            weight,
        }
    }
}

/// Relation slots keyed in canonical order
pub type Slots = BTreeMap<RelationName, Vec<Edge>>;

/// Record metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordMeta {
    /// Always `"en"` for valid records
    pub language: String,
    /// When the record was produced
    pub downloaded_at: DateTime<Utc>,
    /// Whether the edges came from the model or the local bootstrap
    pub source: Provenance,
}

/// Per-token relationship record with one slot per relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdjacencyRecord {
    /// Canonical token (trimmed, lowercase)
    pub token: String,
    /// Model identifier the record was generated with
    pub model: String,
    /// Schema version, always [`RECORD_VERSION`]
    pub version: u32,
    /// Neighbor lists per relation
    pub slots: Slots,
    pub meta: RecordMeta,
}

impl AdjacencyRecord {
    /// Create a record with all 50 slots present and empty.
    pub fn empty(token: &str, model: impl Into<String>) -> Self {
        Self {
            token: normalize_token(token),
            model: model.into(),
            version: RECORD_VERSION,
            slots: empty_slots(),
            meta: RecordMeta {
                language: RECORD_LANGUAGE.to_string(),
                downloaded_at: Utc::now(),
                source: Provenance::Llm,
            },
        }
    }

    /// Edges in one slot (empty if the slot is missing)
    pub fn slot(&self, relation: RelationName) -> &[Edge] {
        self.slots.get(&relation).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append an edge to a slot.
    pub fn push_edge(&mut self, relation: RelationName, edge: Edge) {
        self.slots.entry(relation).or_default().push(edge);
    }

    /// Builder-style variant of [`push_edge`](Self::push_edge).
    pub fn with_edge(mut self, relation: RelationName, neighbor: &str, weight: f64) -> Self {
        self.push_edge(relation, Edge::new(neighbor, weight));
        self
    }

    /// Iterate over every (relation, edge) pair in canonical slot order.
    pub fn edges(&self) -> impl Iterator<Item = (RelationName, &Edge)> {
        self.slots
            .iter()
            .flat_map(|(rel, edges)| edges.iter().map(move |e| (*rel, e)))
    }

    /// Total number of entries across all slots
    pub fn edge_count(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }

    /// Number of entries carrying positive weight
    pub fn non_empty_count(&self) -> usize {
        self.edges().filter(|(_, e)| e.weight > 0.0).count()
    }

    /// Number of slots holding at least one entry
    pub fn populated_slots(&self) -> usize {
        self.slots.values().filter(|edges| !edges.is_empty()).count()
    }

    pub fn is_bootstrap(&self) -> bool {
        self.meta.source == Provenance::Bootstrap
    }
}

/// A slot map with every relation present and empty.
pub fn empty_slots() -> Slots {
    RelationName::ALL.iter().map(|rel| (*rel, Vec::new())).collect()
}

/// Canonical token form: trimmed, lowercase.
pub fn normalize_token(token: &str) -> String {
    token.trim().to_lowercase()
}
