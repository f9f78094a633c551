//! Word tokenization and sequential edges bootstrapped from raw text

use super::reorg::{Reorganized, ReorganizedNode, ScoredEdge};
use crate::relation::RelationName;
use std::collections::HashMap;

const SEQUENCE_WEIGHT: f64 = 0.7;
const WINDOW_WEIGHT: f64 = 0.3;
const WINDOW: usize = 2;

/// Lowercase words: anything outside `[a-z0-9'- ]` separates words.
///
/// Words made only of `'` and `-` are dropped.
pub fn tokenize_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '\'' | '-' => c,
            _ => ' ',
        })
        .collect::<String>()
        .split_whitespace()
        .filter(|w| w.chars().any(|c| c.is_ascii_alphanumeric()))
        .map(str::to_string)
        .collect()
}

/// A directed word-to-word edge observed in text
#[derive(Debug, Clone, PartialEq)]
pub struct TextEdge {
    pub a: String,
    pub b: String,
    pub weight: f64,
}

/// Edges between nearby words of a token sequence.
///
/// Each adjacent pair earns 0.7 per occurrence; every pair within two
/// positions also earns `0.3 / distance`. Weights are capped at 1. Edges are
/// returned in order of first observation.
pub fn bootstrap_from_text(tokens: &[String]) -> Vec<TextEdge> {
    if tokens.len() < 2 {
        return Vec::new();
    }
    let mut edges: Vec<TextEdge> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();

    for pair in tokens.windows(2) {
        accumulate(&mut index, &mut edges, &pair[0], &pair[1], SEQUENCE_WEIGHT);
    }
    for i in 0..tokens.len() {
        for j in (i + 1)..=(i + WINDOW).min(tokens.len() - 1) {
            let w = WINDOW_WEIGHT / (j - i) as f64;
            accumulate(&mut index, &mut edges, &tokens[i], &tokens[j], w);
        }
    }

    for edge in &mut edges {
        edge.weight = edge.weight.min(1.0);
    }
    edges
}

fn accumulate<'t>(
    index: &mut HashMap<(&'t str, &'t str), usize>,
    edges: &mut Vec<TextEdge>,
    a: &'t str,
    b: &'t str,
    w: f64,
) {
    let slot = *index.entry((a, b)).or_insert_with(|| {
        edges.push(TextEdge {
            a: a.to_string(),
            b: b.to_string(),
            weight: 0.0,
        });
        edges.len() - 1
    });
    edges[slot].weight += w;
}

/// Append text edges as "Sequence Of" edges, creating nodes as needed.
///
/// Touched nodes are re-sorted so edge lists stay strongest-first.
pub fn integrate_bootstrap_edges(reorganized: &mut Reorganized, edges: &[TextEdge]) {
    let mut touched = Vec::new();
    for edge in edges.iter().filter(|e| !e.a.is_empty() && !e.b.is_empty()) {
        let node = reorganized
            .entry(edge.a.clone())
            .or_insert_with(|| ReorganizedNode::new(edge.a.clone()));
        node.edges.push(ScoredEdge {
            neighbor: edge.b.clone(),
            relation: RelationName::SequenceOf,
            score: edge.weight,
        });
        touched.push(edge.a.clone());
    }
    touched.sort();
    touched.dedup();
    for token in touched {
        if let Some(node) = reorganized.get_mut(&token) {
            node.sort_edges();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        tokenize_words(text)
    }

    #[test]
    fn test_tokenize_words() {
        assert_eq!(
            words("Hello, World! It's a well-known\tfact; 42 times."),
            vec!["hello", "world", "it's", "a", "well-known", "fact", "42", "times"]
        );
        assert!(words("  ...  ").is_empty());
        assert_eq!(words("Café au lait"), vec!["caf", "au", "lait"]);
        assert_eq!(words("tide - moon -- ' o'"), vec!["tide", "moon", "o'"]);
    }

    #[test]
    fn test_bootstrap_weights() {
        let edges = bootstrap_from_text(&words("red green blue"));
        let get = |a: &str, b: &str| {
            edges
                .iter()
                .find(|e| e.a == a && e.b == b)
                .map(|e| e.weight)
                .unwrap()
        };
        // adjacent: 0.7 + 0.3, capped
        assert!((get("red", "green") - 1.0).abs() < 1e-12);
        assert!((get("green", "blue") - 1.0).abs() < 1e-12);
        // distance two: 0.3 / 2
        assert!((get("red", "blue") - 0.15).abs() < 1e-12);
        assert_eq!(edges.len(), 3);
        assert_eq!((edges[0].a.as_str(), edges[0].b.as_str()), ("red", "green"));
    }

    #[test]
    fn test_single_word_has_no_edges() {
        assert!(bootstrap_from_text(&words("solo")).is_empty());
    }

    #[test]
    fn test_integrate_creates_nodes_and_keeps_order() {
        let mut reorganized = Reorganized::new();
        let mut existing = ReorganizedNode::new("red");
        existing.edges.push(ScoredEdge {
            neighbor: "apple".into(),
            relation: RelationName::Evokes,
            score: 0.5,
        });
        reorganized.insert("red".into(), existing);

        integrate_bootstrap_edges(&mut reorganized, &bootstrap_from_text(&words("red green blue")));

        let red = &reorganized["red"];
        let names: Vec<_> = red.edges.iter().map(|e| e.neighbor.as_str()).collect();
        assert_eq!(names, vec!["green", "apple", "blue"]);
        assert_eq!(red.edges[0].relation, RelationName::SequenceOf);
        assert!(reorganized.contains_key("green"));
        assert!(!reorganized.contains_key("blue"));
    }
}
