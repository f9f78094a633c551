//! Centrality ranking, bridge edges and narrative synthesis

use crate::insight::InsightGraph;
use serde::Serialize;
use std::cmp::Ordering;

/// Bridges kept by [`top_bridges`]
pub const BRIDGE_LIMIT: usize = 10;

/// Narratives are padded to at least this many lines
pub const MIN_NARRATIVE_LINES: usize = 5;

const PLACEHOLDER_LINE: &str = "Signal pending expansion: —";

/// A token with its composite rank score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedToken {
    pub token: String,
    pub score: f64,
}

/// An edge scored for how far across the hierarchy it reaches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bridge {
    pub a: String,
    pub b: String,
    pub weight: f64,
    pub layer_gap: u8,
    pub score: f64,
}

fn by_value_then_token(a_value: f64, a_token: &str, b_value: f64, b_token: &str) -> Ordering {
    b_value.total_cmp(&a_value).then_with(|| a_token.cmp(b_token))
}

/// Tokens by `centrality + 0.5 * attention + 0.25 * propagation`, descending.
pub fn rank(graph: &InsightGraph) -> Vec<RankedToken> {
    let mut ranked: Vec<RankedToken> = graph
        .nodes
        .iter()
        .map(|n| RankedToken {
            token: n.token.clone(),
            score: n.centrality + 0.5 * n.attention + 0.25 * n.propagation,
        })
        .collect();
    ranked.sort_by(|x, y| by_value_then_token(x.score, &x.token, y.score, &y.token));
    ranked
}

/// Edges by `2 * layer_gap + weight`, descending, at most [`BRIDGE_LIMIT`].
///
/// Endpoints missing from the graph count as periphery.
pub fn top_bridges(graph: &InsightGraph) -> Vec<Bridge> {
    let mut bridges: Vec<Bridge> = graph
        .edges
        .iter()
        .map(|e| {
            let layer_gap = graph.layer(&e.a).gap(graph.layer(&e.b));
            Bridge {
                a: e.a.clone(),
                b: e.b.clone(),
                weight: e.weight,
                layer_gap,
                score: 2.0 * f64::from(layer_gap) + e.weight,
            }
        })
        .collect();
    bridges.sort_by(|x, y| {
        y.score
            .total_cmp(&x.score)
            .then_with(|| x.a.cmp(&y.a))
            .then_with(|| x.b.cmp(&y.b))
    });
    bridges.truncate(BRIDGE_LIMIT);
    bridges
}

/// Tokens sitting in the core or inner layer
pub fn count_promoted(graph: &InsightGraph) -> usize {
    graph.nodes.iter().filter(|n| n.layer.index() <= 1).count()
}

/// Tokens by `propagation - 0.3 * centrality`, descending: rising influence
/// that is not yet central.
pub fn suggest_next(graph: &InsightGraph) -> Vec<String> {
    let mut scored: Vec<(f64, &str)> = graph
        .nodes
        .iter()
        .map(|n| (n.propagation - 0.3 * n.centrality, n.token.as_str()))
        .collect();
    scored.sort_by(|x, y| by_value_then_token(x.0, x.1, y.0, y.1));
    scored.into_iter().map(|(_, t)| t.to_string()).collect()
}

/// Short narrative of the run, never fewer than [`MIN_NARRATIVE_LINES`] lines.
pub fn synthesize_narrative(graph: &InsightGraph) -> Vec<String> {
    let top: Vec<String> = rank(graph).into_iter().take(3).map(|r| r.token).collect();
    let bridges: Vec<String> = top_bridges(graph)
        .into_iter()
        .take(2)
        .map(|b| format!("{}↔{}", b.a, b.b))
        .collect();
    let next: Vec<String> = suggest_next(graph).into_iter().take(3).collect();

    let mut lines = Vec::new();
    if !top.is_empty() {
        lines.push(format!("Core topics converging: {}", top.join(", ")));
    }
    if !bridges.is_empty() {
        lines.push(format!("Bridging links: {}", bridges.join("; ")));
    }
    lines.push(format!(
        "Layer reorg: {} tokens shifted upward",
        count_promoted(graph)
    ));
    lines.push(format!(
        "Attention focus rising on: {}",
        top.first().map(String::as_str).unwrap_or("—")
    ));
    lines.push(format!(
        "Next expansions suggested: {}",
        if next.is_empty() {
            "—".to_string()
        } else {
            next.join(", ")
        }
    ));
    while lines.len() < MIN_NARRATIVE_LINES {
        lines.push(PLACEHOLDER_LINE.to_string());
    }
    lines
}
