//! HLSF: LLM-backed adjacency records assembled into a layered knowledge graph
//!
//! For every token the crate asks a text model for a fixed-schema record of
//! weighted neighbors across 50 relation types, validates and persists it,
//! then expands a graph from a batch of seed tokens and scores it.
//!
//! # Core Concepts
//!
//! - **Adjacency records**: one per token, always schema-valid, never empty
//! - **Acquisition**: an escalating ladder of model passes with retry, ending
//!   in a local bootstrap when the model stays sparse
//! - **Scoring**: hierarchy, recency-weighted reorganization, attention and
//!   propagation, folded into one [`InsightGraph`]
//!
//! # Example
//!
//! ```
//! use hlsf::{score_records, AdjacencyRecord, RelationName, ScoreOptions};
//! use std::collections::BTreeMap;
//!
//! let mut records = BTreeMap::new();
//! records.insert(
//!     "tide".to_string(),
//!     AdjacencyRecord::empty("tide", "gpt-4o-mini").with_edge(RelationName::Causes, "erosion", 0.7),
//! );
//! let scored = score_records(&["tide"], &records, &ScoreOptions::default());
//! assert_eq!(scored.ranking[0].token, "tide");
//! ```

pub mod acquire;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod graph;
pub mod insight;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod record;
pub mod relation;
pub mod run_log;
pub mod scoring;
pub mod storage;

pub use acquire::{AcquireConfig, AcquireError, Acquirer, RetryPolicy};
pub use cache::{CacheError, Origin, RecordCache};
pub use cancel::{CancellationToken, Cancelled};
pub use config::{ConfigError, HlsfConfig, StoreBackend};
pub use graph::{expand, ExpandedGraph, Expansion, GraphNode, RecordLookup};
pub use insight::{compose, InsightEdge, InsightGraph, InsightNode};
pub use llm::{GenerationClient, GenerationError, OpenAiClient, ScriptedClient};
pub use pipeline::{
    score_records, Engine, EngineError, EngineOptions, FetchReport, RunOutcome, ScoreOptions,
    ScoredRun, StreamPhase,
};
pub use record::{AdjacencyRecord, Edge, Provenance};
pub use relation::RelationName;
pub use run_log::{format_run_report, reflect_rewrite, RunLog, RunStep, StepRecorder};
pub use storage::{FileStore, OpenStore, RecordStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
