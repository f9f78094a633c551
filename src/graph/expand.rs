//! Breadth-first expansion from seed tokens

use super::lookup::RecordLookup;
use super::types::{ExpandedGraph, GraphNode};
use crate::record::{normalize_token, AdjacencyRecord, Edge};
use crate::relation::RelationName;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::debug;

/// Query for expanding the graph from a set of seed tokens
#[derive(Debug, Clone)]
pub struct Expansion {
    /// Seed tokens (depth 0)
    pub seeds: Vec<String>,
    /// Maximum hops from a seed (0 = seeds only)
    pub max_depth: usize,
    /// Edges kept per relation slot, strongest first (at least 1)
    pub fanout: usize,
}

impl Expansion {
    /// Create an expansion from seed tokens (depth 1, fanout 5)
    pub fn from<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            seeds: seeds.into_iter().map(|s| normalize_token(s.as_ref())).collect(),
            max_depth: 1,
            fanout: 5,
        }
    }

    /// Set the maximum expansion depth
    pub fn depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the number of edges kept per relation
    pub fn fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout;
        self
    }

    /// Execute the expansion against a record source
    pub fn execute(&self, records: &dyn RecordLookup) -> ExpandedGraph {
        let fanout = self.fanout.max(1);
        let mut graph = ExpandedGraph::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = self
            .seeds
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| (s.clone(), 0))
            .collect();

        while let Some((token, depth)) = queue.pop_front() {
            if depth > self.max_depth || !visited.insert(token.clone()) {
                continue;
            }
            graph.visited.push(token.clone());

            let Some(record) = records.lookup(&token) else {
                debug!(token = %token, depth, "No record, skipping");
                continue;
            };

            let neighbors_by_relation = top_neighbors(&record, fanout);
            if depth < self.max_depth {
                for edges in neighbors_by_relation.values() {
                    for edge in edges {
                        if !visited.contains(&edge.neighbor) {
                            queue.push_back((edge.neighbor.clone(), depth + 1));
                        }
                    }
                }
            }

            graph.nodes.insert(
                token.clone(),
                GraphNode {
                    token: token.clone(),
                    neighbors_by_relation,
                    depth,
                },
            );
            graph.records.insert(token, record.into_owned());
        }

        debug!(
            nodes = graph.nodes.len(),
            visited = graph.visited.len(),
            "Expansion complete"
        );
        graph
    }
}

/// Expand from `seeds` up to `depth` hops keeping `fanout` edges per relation.
pub fn expand<S: AsRef<str>>(
    seeds: &[S],
    records: &dyn RecordLookup,
    depth: usize,
    fanout: usize,
) -> ExpandedGraph {
    Expansion::from(seeds).depth(depth).fanout(fanout).execute(records)
}

/// Strongest `fanout` edges of every non-empty slot.
fn top_neighbors(record: &AdjacencyRecord, fanout: usize) -> BTreeMap<RelationName, Vec<Edge>> {
    record
        .slots
        .iter()
        .filter(|(_, edges)| !edges.is_empty())
        .map(|(rel, edges)| {
            let mut sorted = edges.clone();
            sorted.sort_by(|a, b| b.weight.total_cmp(&a.weight));
            sorted.truncate(fanout);
            (*rel, sorted)
        })
        .collect()
}
