//! Insight composer: folds every scoring signal into one graph

use crate::relation::RelationName;
use crate::scoring::{Hierarchy, HierarchyLayer, Reorganized, ScoredEdge, Signal};
use serde::Serialize;
use std::collections::BTreeSet;

/// A token with every signal computed for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightNode {
    pub token: String,
    pub edges: Vec<ScoredEdge>,
    pub centrality: f64,
    pub layer: HierarchyLayer,
    pub attention: f64,
    pub propagation: f64,
}

/// A scored edge between two tokens
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightEdge {
    pub a: String,
    pub b: String,
    #[serde(rename = "w")]
    pub weight: f64,
    #[serde(rename = "rel")]
    pub relation: RelationName,
}

/// Composed output of one scoring run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsightGraph {
    /// Sorted by token
    pub nodes: Vec<InsightNode>,
    pub edges: Vec<InsightEdge>,
}

impl InsightGraph {
    pub fn node(&self, token: &str) -> Option<&InsightNode> {
        self.nodes
            .binary_search_by(|n| n.token.as_str().cmp(token))
            .ok()
            .map(|i| &self.nodes[i])
    }

    /// Layer of a token, periphery if it is not in the graph
    pub fn layer(&self, token: &str) -> HierarchyLayer {
        self.node(token)
            .map(|n| n.layer)
            .unwrap_or(HierarchyLayer::Periphery)
    }
}

/// Union-merge the signals into an [`InsightGraph`].
///
/// Every token present in any signal becomes a node. Missing centrality,
/// attention and propagation read 0; a missing layer reads periphery.
pub fn compose(
    hierarchy: &Hierarchy,
    reorganized: &Reorganized,
    attention: &Signal,
    propagation: &Signal,
) -> InsightGraph {
    let tokens: BTreeSet<&str> = hierarchy
        .stats
        .iter()
        .map(|s| s.token.as_str())
        .chain(hierarchy.layers.keys().map(String::as_str))
        .chain(reorganized.keys().map(String::as_str))
        .chain(attention.keys().map(String::as_str))
        .chain(propagation.keys().map(String::as_str))
        .collect();

    let nodes: Vec<InsightNode> = tokens
        .into_iter()
        .map(|token| InsightNode {
            token: token.to_string(),
            edges: reorganized
                .get(token)
                .map(|n| n.edges.clone())
                .unwrap_or_default(),
            centrality: hierarchy.centrality(token).unwrap_or(0.0),
            layer: hierarchy.layer(token),
            attention: attention.get(token).copied().unwrap_or(0.0),
            propagation: propagation.get(token).copied().unwrap_or(0.0),
        })
        .collect();

    let edges = nodes
        .iter()
        .flat_map(|node| {
            node.edges.iter().map(move |e| InsightEdge {
                a: node.token.clone(),
                b: e.neighbor.clone(),
                weight: e.score,
                relation: e.relation,
            })
        })
        .collect();

    InsightGraph { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{classify_centralities, ReorganizedNode, TokenCentrality};

    #[test]
    fn test_union_merge_with_defaults() {
        let hierarchy = classify_centralities(vec![TokenCentrality {
            token: "root".into(),
            centrality: 2.0,
        }]);
        let mut reorganized = Reorganized::new();
        let mut node = ReorganizedNode::new("root");
        node.edges.push(ScoredEdge {
            neighbor: "leaf".into(),
            relation: RelationName::Contains,
            score: 0.4,
        });
        reorganized.insert("root".into(), node);
        let mut attention = Signal::new();
        attention.insert("root".into(), 0.38);
        let mut propagation = Signal::new();
        propagation.insert("late".into(), 0.2);

        let graph = compose(&hierarchy, &reorganized, &attention, &propagation);

        let tokens: Vec<_> = graph.nodes.iter().map(|n| n.token.as_str()).collect();
        assert_eq!(tokens, vec!["late", "root"]);

        let late = graph.node("late").unwrap();
        assert_eq!(late.layer, HierarchyLayer::Periphery);
        assert_eq!(late.centrality, 0.0);
        assert_eq!(late.attention, 0.0);
        assert_eq!(late.propagation, 0.2);

        let root = graph.node("root").unwrap();
        assert_eq!(root.layer, HierarchyLayer::Core);
        assert_eq!(root.centrality, 2.0);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].a, "root");
        assert_eq!(graph.edges[0].b, "leaf");
        assert!(graph.node("leaf").is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let graph = InsightGraph {
            nodes: vec![],
            edges: vec![InsightEdge {
                a: "x".into(),
                b: "y".into(),
                weight: 0.5,
                relation: RelationName::Opposes,
            }],
        };
        let value = serde_json::to_value(&graph).unwrap();
        assert_eq!(value["edges"][0]["rel"], "Opposes");
        assert_eq!(value["edges"][0]["w"], 0.5);
    }
}
