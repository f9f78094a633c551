//! Expansion result structures

use crate::record::{AdjacencyRecord, Edge};
use crate::relation::RelationName;
use std::collections::BTreeMap;

/// A token reached by expansion with its strongest neighbors per relation
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub token: String,
    /// At most `fanout` edges per relation, strongest first
    pub neighbors_by_relation: BTreeMap<RelationName, Vec<Edge>>,
    /// Hops from the nearest seed
    pub depth: usize,
}

impl GraphNode {
    /// Iterate over every kept (relation, edge) pair.
    pub fn edges(&self) -> impl Iterator<Item = (RelationName, &Edge)> {
        self.neighbors_by_relation
            .iter()
            .flat_map(|(rel, edges)| edges.iter().map(move |e| (*rel, e)))
    }

    pub fn edge_count(&self) -> usize {
        self.neighbors_by_relation.values().map(Vec::len).sum()
    }
}

/// Result of expanding from a set of seeds
#[derive(Debug, Clone, Default)]
pub struct ExpandedGraph {
    /// Nodes keyed by token (only tokens that had a record)
    pub nodes: BTreeMap<String, GraphNode>,
    /// Every token dequeued and marked, in visit order, with or without a record
    pub visited: Vec<String>,
    /// Records resolved during expansion, keyed by token
    pub records: BTreeMap<String, AdjacencyRecord>,
}

impl ExpandedGraph {
    pub fn node(&self, token: &str) -> Option<&GraphNode> {
        self.nodes.get(token)
    }

    /// Nodes at a specific depth, in token order
    pub fn at_depth(&self, depth: usize) -> Vec<&GraphNode> {
        self.nodes.values().filter(|n| n.depth == depth).collect()
    }

    /// Deepest level that produced a node
    pub fn max_depth(&self) -> usize {
        self.nodes.values().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
