//! Hierarchy classification from per-run centrality quantiles

use crate::record::AdjacencyRecord;
use crate::relation::RelationName;
use serde::Serialize;
use std::collections::BTreeMap;

/// Quantile positions of the three cut points
const CORE_QUANTILE: f64 = 0.8;
const INNER_QUANTILE: f64 = 0.5;
const OUTER_QUANTILE: f64 = 0.2;

/// Hierarchy tier of a token within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub enum HierarchyLayer {
    Core = 0,
    Inner = 1,
    Outer = 2,
    Periphery = 3,
}

impl HierarchyLayer {
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Absolute distance between two layers
    pub fn gap(self, other: HierarchyLayer) -> u8 {
        self.index().abs_diff(other.index())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HierarchyLayer::Core => "core",
            HierarchyLayer::Inner => "inner",
            HierarchyLayer::Outer => "outer",
            HierarchyLayer::Periphery => "periphery",
        }
    }
}

impl From<HierarchyLayer> for u8 {
    fn from(layer: HierarchyLayer) -> Self {
        layer.index()
    }
}

/// Weight mass of one record
#[derive(Debug, Clone, PartialEq)]
pub struct Centrality {
    /// Slot sum divided by the busiest slot's sum (busiest reads 1.0)
    pub per_slot: BTreeMap<RelationName, f64>,
    /// Sum of every edge weight in the record
    pub total: f64,
}

/// Per-slot and total weight mass of a record.
pub fn score_centrality(record: &AdjacencyRecord) -> Centrality {
    let sums: BTreeMap<RelationName, f64> = RelationName::ALL
        .iter()
        .map(|rel| (*rel, record.slot(*rel).iter().map(|e| e.weight).sum::<f64>()))
        .collect();
    let max_slot = sums.values().copied().fold(0.0_f64, f64::max);
    let denom = if max_slot > 0.0 { max_slot } else { 1.0 };
    Centrality {
        per_slot: sums.iter().map(|(rel, sum)| (*rel, sum / denom)).collect(),
        total: sums.values().sum(),
    }
}

/// A token with its total centrality
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenCentrality {
    pub token: String,
    pub centrality: f64,
}

/// Centrality cut points for layers 0, 1 and 2
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Thresholds {
    pub core: f64,
    pub inner: f64,
    pub outer: f64,
}

impl Thresholds {
    /// Layer for a centrality value; boundary ties go to the more central layer.
    pub fn classify(&self, centrality: f64) -> HierarchyLayer {
        if centrality >= self.core {
            HierarchyLayer::Core
        } else if centrality >= self.inner {
            HierarchyLayer::Inner
        } else if centrality >= self.outer {
            HierarchyLayer::Outer
        } else {
            HierarchyLayer::Periphery
        }
    }
}

/// Result of hierarchy classification
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    pub layers: BTreeMap<String, HierarchyLayer>,
    pub stats: Vec<TokenCentrality>,
    pub thresholds: Thresholds,
}

impl Hierarchy {
    /// Layer of a token, periphery when it was not classified
    pub fn layer(&self, token: &str) -> HierarchyLayer {
        self.layers
            .get(token)
            .copied()
            .unwrap_or(HierarchyLayer::Periphery)
    }

    pub fn centrality(&self, token: &str) -> Option<f64> {
        self.stats
            .iter()
            .rev()
            .find(|s| s.token == token)
            .map(|s| s.centrality)
    }
}

/// Classify records by their total centrality.
pub fn classify_hierarchy<'a, I>(records: I) -> Hierarchy
where
    I: IntoIterator<Item = &'a AdjacencyRecord>,
{
    classify_centralities(
        records
            .into_iter()
            .map(|record| TokenCentrality {
                token: record.token.clone(),
                centrality: score_centrality(record).total,
            })
            .collect(),
    )
}

/// Classify an already-scored population.
///
/// Cut points come from this population only: with values sorted ascending,
/// the cut for quantile `q` is `values[min(n - 1, ceil(q * (n - 1)))]`.
pub fn classify_centralities(stats: Vec<TokenCentrality>) -> Hierarchy {
    let mut values: Vec<f64> = stats.iter().map(|s| s.centrality).collect();
    values.sort_by(f64::total_cmp);

    let thresholds = Thresholds {
        core: quantile(&values, CORE_QUANTILE),
        inner: quantile(&values, INNER_QUANTILE),
        outer: quantile(&values, OUTER_QUANTILE),
    };
    let layers = stats
        .iter()
        .map(|s| (s.token.clone(), thresholds.classify(s.centrality)))
        .collect();

    Hierarchy {
        layers,
        stats,
        thresholds,
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let last = sorted.len() - 1;
    let idx = (q * last as f64).ceil() as usize;
    sorted[idx.min(last)]
}
