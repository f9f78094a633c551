//! Attention embedding and non-local propagation

use super::reorg::Reorganized;
use std::collections::BTreeMap;

/// A per-token scalar signal
pub type Signal = BTreeMap<String, f64>;

/// `tanh` of each node's summed edge scores; a zero sum stays zero.
pub fn attention_embed(reorganized: &Reorganized) -> Signal {
    reorganized
        .iter()
        .map(|(token, node)| {
            let total = node.score_sum();
            let value = if total == 0.0 { 0.0 } else { total.tanh() };
            (token.clone(), value)
        })
        .collect()
}

/// One hop of influence: the score-weighted mean of neighbor attention.
///
/// Nodes without edges keep their own attention. Neighbors missing from
/// `attention` contribute 0. The divisor is the edge count, not the weight
/// sum, so a neighbor's own degree does not matter.
pub fn propagate(reorganized: &Reorganized, attention: &Signal) -> Signal {
    reorganized
        .iter()
        .map(|(token, node)| {
            let value = if node.edges.is_empty() {
                attention.get(token).copied().unwrap_or(0.0)
            } else {
                let sum: f64 = node
                    .edges
                    .iter()
                    .map(|e| attention.get(&e.neighbor).copied().unwrap_or(0.0) * e.score)
                    .sum();
                sum / node.edges.len() as f64
            };
            (token.clone(), value)
        })
        .collect()
}
