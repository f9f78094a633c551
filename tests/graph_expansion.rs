//! Expansion bounds over record lookups.

mod common;

use common::{record, records};
use hlsf::graph::Layered;
use hlsf::{expand, Expansion, RelationName};

fn chain() -> std::collections::BTreeMap<String, hlsf::AdjacencyRecord> {
    records(vec![
        record(
            "a",
            &[
                (RelationName::Next, "b", 0.9),
                (RelationName::Next, "x", 0.2),
            ],
        ),
        record("b", &[(RelationName::Next, "c", 0.8)]),
        record("c", &[(RelationName::Next, "d", 0.7)]),
        record("d", &[]),
    ])
}

#[test]
fn depth_zero_keeps_only_seeds() {
    let graph = expand(&["a", "c"], &chain(), 0, 5);
    assert_eq!(graph.visited, vec!["a", "c"]);
    assert_eq!(graph.len(), 2);
    assert!(graph.nodes.values().all(|n| n.depth == 0));
}

#[test]
fn chain_stops_at_depth_with_fanout_one() {
    let graph = Expansion::from(["A"]).depth(2).fanout(1).execute(&chain());

    assert_eq!(graph.visited, vec!["a", "b", "c"]);
    assert!(graph.node("d").is_none());
    assert!(graph.node("x").is_none());
    for node in graph.nodes.values() {
        assert!(node.neighbors_by_relation.values().all(|edges| edges.len() <= 1));
    }
    assert_eq!(graph.node("c").unwrap().depth, 2);
    assert_eq!(graph.max_depth(), 2);
}

#[test]
fn layered_lookup_falls_back() {
    let batch = records(vec![record("a", &[(RelationName::Next, "b", 0.9)])]);
    let stored = records(vec![record("b", &[(RelationName::Next, "c", 0.5)])]);
    let lookup = Layered::new(&batch, &stored);

    let graph = expand(&["a"], &lookup, 3, 5);
    assert_eq!(graph.visited, vec!["a", "b", "c"]);
    assert_eq!(graph.records.len(), 2);
    assert_eq!(graph.at_depth(1).len(), 1);
}
