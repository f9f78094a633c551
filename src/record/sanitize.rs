//! Turning raw model output into a well-formed record

use super::types::{AdjacencyRecord, Edge};
use crate::relation::RelationName;
use serde_json::Value;

/// Extract a JSON object from model response text.
///
/// Models sometimes wrap JSON in markdown code fences or add prose around it.
/// Tries, in order:
/// 1. Direct parse (response is pure JSON)
/// 2. A ```json ... ``` or ``` ... ``` fenced block
/// 3. The span from the first `{` to the last `}`
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }

    let fenced = if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        after.find("```").map(|end| &after[..end])
    } else if let Some(start) = trimmed.find("```\n") {
        let after = &trimmed[start + 4..];
        after.find("```").map(|end| &after[..end])
    } else {
        None
    };

    if let Some(block) = fenced {
        if let Ok(v) = serde_json::from_str::<Value>(block.trim()) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
    }

    None
}

/// A sanitized record plus the number of entries with positive weight.
#[derive(Debug, Clone)]
pub struct Sanitized {
    pub record: AdjacencyRecord,
    pub non_empty: usize,
}

/// Coerce a parsed response into a record for `token` / `model`.
///
/// Slots are read from the `slots` object, or from the top level when the
/// model left that wrapper out. Keys that do not canonicalize to a relation
/// are dropped, as are entries whose neighbor is blank. Weights that are not
/// finite numbers become 0 and everything is clamped to [0, 1].
pub fn sanitize(raw: &Value, token: &str, model: &str) -> Sanitized {
    let mut record = AdjacencyRecord::empty(token, model);
    let mut non_empty = 0;

    let slots = match raw.get("slots") {
        Some(Value::Object(map)) => Some(map),
        Some(_) => None,
        None => raw.as_object(),
    };

    for (key, value) in slots.into_iter().flatten() {
        let Some(relation) = RelationName::canonicalize(key) else {
            continue;
        };
        let Some(entries) = value.as_array() else {
            continue;
        };
        for entry in entries {
            let neighbor = coerce_neighbor(entry.get("token"));
            if neighbor.is_empty() {
                continue;
            }
            let weight = coerce_weight(entry.get("w").or_else(|| entry.get("weight")));
            if weight > 0.0 {
                non_empty += 1;
            }
            record.push_edge(relation, Edge::new(neighbor, weight));
        }
    }

    Sanitized { record, non_empty }
}

fn coerce_neighbor(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_lowercase(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn coerce_weight(value: Option<&Value>) -> f64 {
    let w = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        _ => 0.0,
    };
    if w.is_finite() {
        w.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::validate::validate;
    use serde_json::json;

    #[test]
    fn extract_json_direct() {
        let v = extract_json(r#"{"slots": {}}"#).unwrap();
        assert!(v.get("slots").is_some());
    }

    #[test]
    fn extract_json_from_fence_and_prose() {
        let fenced = "Here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(extract_json(fenced), Some(json!({"a": 1})));

        let prose = "Sure! {\"slots\": {\"Causes\": []}} Hope that helps.";
        assert_eq!(extract_json(prose), Some(json!({"slots": {"Causes": []}})));
    }

    #[test]
    fn extract_json_rejects_garbage() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
        assert_eq!(extract_json("[1, 2, 3]"), None);
    }

    #[test]
    fn sanitize_canonicalizes_keys_and_drops_unknown() {
        let raw = json!({
            "slots": {
                "co-occurs  with": [{"token": " Chlorophyll ", "w": 0.9}],
                "LIKES": [{"token": "sun", "w": 0.8}],
                "Defines": "not an array"
            }
        });
        let out = sanitize(&raw, "Photosynthesis", "m");
        assert_eq!(out.record.token, "photosynthesis");
        assert_eq!(
            out.record.slot(RelationName::CoOccursWith),
            &[Edge::new("chlorophyll", 0.9)]
        );
        assert_eq!(out.record.edge_count(), 1);
        assert_eq!(out.non_empty, 1);
        assert_eq!(validate(&out.record), Ok(()));
    }

    #[test]
    fn sanitize_coerces_and_clamps_weights() {
        let raw = json!({
            "slots": {
                "Causes": [
                    {"token": "a", "w": 1.7},
                    {"token": "b", "w": -0.2},
                    {"token": "c", "w": "0.25"},
                    {"token": "d", "w": "lots"},
                    {"token": "e"},
                    {"token": "   ", "w": 0.9},
                    {"w": 0.9}
                ]
            }
        });
        let out = sanitize(&raw, "x", "m");
        let weights: Vec<f64> = out
            .record
            .slot(RelationName::Causes)
            .iter()
            .map(|e| e.weight)
            .collect();
        assert_eq!(weights, vec![1.0, 0.0, 0.25, 0.0, 0.0]);
        assert_eq!(out.non_empty, 2);
        assert_eq!(validate(&out.record), Ok(()));
    }

    #[test]
    fn sanitize_reads_top_level_slots() {
        let raw = json!({
            "token": "ignored",
            "Evokes": [{"token": "warmth", "weight": 0.7}]
        });
        let out = sanitize(&raw, "fire", "m");
        assert_eq!(out.record.slot(RelationName::Evokes).len(), 1);
        assert_eq!(out.non_empty, 1);
    }

    #[test]
    fn sanitize_empty_response_keeps_all_slots() {
        let out = sanitize(&json!({}), "x", "m");
        assert_eq!(out.record.slots.len(), RelationName::COUNT);
        assert_eq!(out.non_empty, 0);
    }
}
