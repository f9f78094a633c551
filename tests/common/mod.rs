//! Shared fixtures for hlsf integration tests
//!
//! Everything here runs offline: a scripted generation client stands in for
//! the model and a recording sleeper stands in for backoff waits.

#![allow(dead_code)]

use hlsf::acquire::{Acquirer, RecordingSleeper};
use hlsf::{
    AdjacencyRecord, Engine, EngineOptions, RecordCache, RecordStore, RelationName,
    ScriptedClient,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MODEL: &str = "gpt-4o-mini";

/// A model response with `count` neighbors `{prefix}0..` in one slot.
pub fn rich_response(prefix: &str, count: usize) -> String {
    let neighbors: Vec<_> = (0..count)
        .map(|i| json!({"token": format!("{}{}", prefix, i), "w": 0.8}))
        .collect();
    json!({"slots": {"Associated With": neighbors}}).to_string()
}

/// A record with the given `(relation, neighbor, weight)` edges.
pub fn record(token: &str, edges: &[(RelationName, &str, f64)]) -> AdjacencyRecord {
    edges
        .iter()
        .fold(AdjacencyRecord::empty(token, MODEL), |r, (rel, n, w)| {
            r.with_edge(*rel, n, *w)
        })
}

pub fn records(list: Vec<AdjacencyRecord>) -> BTreeMap<String, AdjacencyRecord> {
    list.into_iter().map(|r| (r.token.clone(), r)).collect()
}

pub fn acquirer(client: Arc<ScriptedClient>, sleeper: Arc<RecordingSleeper>) -> Acquirer {
    Acquirer::new(client).with_sleeper(sleeper)
}

pub fn engine(
    client: Arc<ScriptedClient>,
    store: Arc<dyn RecordStore>,
    options: EngineOptions,
) -> Engine {
    let acquirer = acquirer(client.clone(), Arc::new(RecordingSleeper::new()));
    let cache = Arc::new(RecordCache::new(store, Arc::new(acquirer)));
    Engine::new(cache, client, options)
}
