//! Scoring pipeline
//!
//! Pure passes over one run's records and expanded graph, applied in order:
//! hierarchy → reorganization → (text edges) → attention → propagation →
//! ranking and narrative. Nothing here suspends or touches storage.

mod attention;
mod hierarchy;
mod ranking;
mod reorg;
mod text;

pub use attention::{attention_embed, propagate, Signal};
pub use hierarchy::{
    classify_centralities, classify_hierarchy, score_centrality, Centrality, Hierarchy,
    HierarchyLayer, Thresholds, TokenCentrality,
};
pub use ranking::{
    count_promoted, rank, suggest_next, synthesize_narrative, top_bridges, Bridge, RankedToken,
    BRIDGE_LIMIT, MIN_NARRATIVE_LINES,
};
pub use reorg::{
    recency_decay, reorganize, reorganize_with_age, Reorganized, ReorganizedNode, ScoredEdge,
    UNKNOWN_AGE_MS,
};
pub use text::{bootstrap_from_text, integrate_bootstrap_edges, tokenize_words, TextEdge};
