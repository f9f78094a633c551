//! Record sources the graph builder can expand through

use crate::cache::RecordCache;
use crate::record::{normalize_token, AdjacencyRecord};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

/// Anything that can hand out the record for a token
pub trait RecordLookup {
    /// The record for a canonical token, if one is available
    fn lookup(&self, token: &str) -> Option<Cow<'_, AdjacencyRecord>>;
}

impl RecordLookup for HashMap<String, AdjacencyRecord> {
    fn lookup(&self, token: &str) -> Option<Cow<'_, AdjacencyRecord>> {
        self.get(token).map(Cow::Borrowed)
    }
}

impl RecordLookup for BTreeMap<String, AdjacencyRecord> {
    fn lookup(&self, token: &str) -> Option<Cow<'_, AdjacencyRecord>> {
        self.get(token).map(Cow::Borrowed)
    }
}

impl RecordLookup for [AdjacencyRecord] {
    fn lookup(&self, token: &str) -> Option<Cow<'_, AdjacencyRecord>> {
        self.iter().find(|r| r.token == token).map(Cow::Borrowed)
    }
}

/// Stored records that re-validate and are not junk.
impl RecordLookup for RecordCache {
    fn lookup(&self, token: &str) -> Option<Cow<'_, AdjacencyRecord>> {
        self.load_trusted(&normalize_token(token)).map(Cow::Owned)
    }
}

/// Consult `primary`, then `fallback`.
pub struct Layered<'a> {
    pub primary: &'a dyn RecordLookup,
    pub fallback: &'a dyn RecordLookup,
}

impl<'a> Layered<'a> {
    pub fn new(primary: &'a dyn RecordLookup, fallback: &'a dyn RecordLookup) -> Self {
        Self { primary, fallback }
    }
}

impl RecordLookup for Layered<'_> {
    fn lookup(&self, token: &str) -> Option<Cow<'_, AdjacencyRecord>> {
        self.primary
            .lookup(token)
            .or_else(|| self.fallback.lookup(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layered_prefers_primary() {
        let mut batch = HashMap::new();
        batch.insert("a".to_string(), AdjacencyRecord::empty("a", "batch"));
        let mut stored = BTreeMap::new();
        stored.insert("a".to_string(), AdjacencyRecord::empty("a", "stored"));
        stored.insert("b".to_string(), AdjacencyRecord::empty("b", "stored"));

        let layered = Layered::new(&batch, &stored);
        assert_eq!(layered.lookup("a").unwrap().model, "batch");
        assert_eq!(layered.lookup("b").unwrap().model, "stored");
        assert!(layered.lookup("c").is_none());
    }

    #[test]
    fn slices_are_lookups() {
        let records = vec![AdjacencyRecord::empty("x", "m")];
        assert!(records.as_slice().lookup("x").is_some());
        assert!(records.as_slice().lookup("y").is_none());
    }
}
