//! Dynamic reorganization: flatten and rescore each node's edges

use crate::graph::ExpandedGraph;
use crate::record::Edge;
use crate::relation::RelationName;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Age used when an edge's last observation time is unknown
pub const UNKNOWN_AGE_MS: f64 = 1.0;

/// An edge after recency scoring
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEdge {
    #[serde(rename = "token")]
    pub neighbor: String,
    #[serde(rename = "rel")]
    pub relation: RelationName,
    pub score: f64,
}

/// A node's flattened edge list, strongest first
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReorganizedNode {
    pub token: String,
    pub edges: Vec<ScoredEdge>,
}

impl ReorganizedNode {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            edges: Vec::new(),
        }
    }

    /// Restore descending score order (ties: relation order, then neighbor).
    pub fn sort_edges(&mut self) {
        self.edges.sort_by(compare_scored);
    }

    pub fn score_sum(&self) -> f64 {
        self.edges.iter().map(|e| e.score).sum()
    }
}

/// Reorganized nodes keyed by token
pub type Reorganized = BTreeMap<String, ReorganizedNode>;

fn compare_scored(a: &ScoredEdge, b: &ScoredEdge) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.relation.cmp(&b.relation))
        .then_with(|| a.neighbor.cmp(&b.neighbor))
}

/// `1 / (1 + log10(1 + age_ms))`; negative ages count as zero.
pub fn recency_decay(age_ms: f64) -> f64 {
    1.0 / (1.0 + (1.0 + age_ms.max(0.0)).log10())
}

/// Reorganize with every edge treated as just observed.
pub fn reorganize(graph: &ExpandedGraph) -> Reorganized {
    reorganize_with_age(graph, |_, _, _| None)
}

/// Reorganize using `age_of(token, relation, edge)` in milliseconds,
/// falling back to [`UNKNOWN_AGE_MS`] when it returns `None`.
pub fn reorganize_with_age<F>(graph: &ExpandedGraph, age_of: F) -> Reorganized
where
    F: Fn(&str, RelationName, &Edge) -> Option<f64>,
{
    graph
        .nodes
        .values()
        .map(|node| {
            let mut reorganized = ReorganizedNode::new(node.token.clone());
            reorganized.edges = node
                .edges()
                .map(|(relation, edge)| {
                    let age = age_of(&node.token, relation, edge).unwrap_or(UNKNOWN_AGE_MS);
                    ScoredEdge {
                        neighbor: edge.neighbor.clone(),
                        relation,
                        score: edge.weight * recency_decay(age),
                    }
                })
                .collect();
            reorganized.sort_edges();
            (node.token.clone(), reorganized)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::expand;
    use crate::record::AdjacencyRecord;
    use std::collections::HashMap;

    fn graph() -> ExpandedGraph {
        let record = AdjacencyRecord::empty("moon", "m")
            .with_edge(RelationName::Causes, "tides", 0.5)
            .with_edge(RelationName::AssociatedWith, "night", 0.5)
            .with_edge(RelationName::AssociatedWith, "apollo", 0.5)
            .with_edge(RelationName::Evokes, "silver", 0.9);
        let records: HashMap<_, _> = [(record.token.clone(), record)].into_iter().collect();
        expand(&["moon"], &records, 0, 5)
    }

    #[test]
    fn test_recency_decay() {
        assert!((recency_decay(0.0) - 1.0).abs() < 1e-12);
        assert!((recency_decay(9.0) - 0.5).abs() < 1e-12);
        let unknown = recency_decay(UNKNOWN_AGE_MS);
        assert!((unknown - 1.0 / (1.0 + 2f64.log10())).abs() < 1e-12);
        assert!(recency_decay(1e9) < recency_decay(1e3));
    }

    #[test]
    fn test_edges_sorted_by_score_then_relation_then_token() {
        let reorganized = reorganize(&graph());
        let node = &reorganized["moon"];
        let order: Vec<_> = node.edges.iter().map(|e| e.neighbor.as_str()).collect();
        // Associated With precedes Causes in canonical order
        assert_eq!(order, vec!["silver", "apollo", "night", "tides"]);
        let decay = recency_decay(UNKNOWN_AGE_MS);
        assert!((node.edges[0].score - 0.9 * decay).abs() < 1e-12);
    }

    #[test]
    fn test_known_age_lowers_score() {
        let reorganized = reorganize_with_age(&graph(), |_, _, edge| {
            (edge.neighbor == "silver").then_some(99_999.0)
        });
        let node = &reorganized["moon"];
        let silver = node.edges.iter().find(|e| e.neighbor == "silver").unwrap();
        assert!((silver.score - 0.9 / 6.0).abs() < 1e-9);
        assert_eq!(node.edges.last().unwrap().neighbor, "silver");
    }
}
