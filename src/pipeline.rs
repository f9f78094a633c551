//! Run orchestration
//!
//! `score_records` is the pure half: expansion, the scoring passes, composition
//! and narrative over records that are already available. `Engine` adds the
//! async half: resolving records through the cache, streaming answers and
//! recording every stage as a [`RunStep`](crate::run_log::RunStep).

use crate::cache::{CacheError, Origin, RecordCache};
use crate::cancel::{Cancelled, CancellationToken};
use crate::graph::{ExpandedGraph, Expansion, Layered, RecordLookup};
use crate::insight::{compose, InsightGraph};
use crate::llm::{ChatMessage, GenerationClient, GenerationError};
use crate::prompts::{answer_messages, reflect_messages};
use crate::record::{normalize_token, AdjacencyRecord};
use crate::run_log::{reflect_rewrite, RunLog, StepRecorder};
use crate::scoring::{
    attention_embed, bootstrap_from_text, classify_hierarchy, integrate_bootstrap_edges,
    propagate, rank, reorganize, suggest_next, synthesize_narrative, top_bridges, Bridge,
    tokenize_words, Hierarchy, HierarchyLayer, RankedToken, Reorganized, Signal, TextEdge,
};
use futures_util::{stream, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_DEPTH: usize = 2;
pub const DEFAULT_FANOUT: usize = 5;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Errors that end a run
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("run cancelled")]
    Cancelled,
}

impl From<Cancelled> for EngineError {
    fn from(_: Cancelled) -> Self {
        EngineError::Cancelled
    }
}

/// Expansion and text-edge settings for one scoring run
#[derive(Debug, Clone)]
pub struct ScoreOptions {
    pub depth: usize,
    pub fanout: usize,
    /// Extra "Sequence Of" edges folded in after reorganization
    pub text_edges: Vec<TextEdge>,
}

impl Default for ScoreOptions {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            fanout: DEFAULT_FANOUT,
            text_edges: Vec::new(),
        }
    }
}

impl ScoreOptions {
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout;
        self
    }

    /// Add sequential edges bootstrapped from a token sequence.
    pub fn with_text(mut self, tokens: &[String]) -> Self {
        self.text_edges = bootstrap_from_text(tokens);
        self
    }
}

/// Everything the scoring half of a run computed
#[derive(Debug, Clone)]
pub struct ScoredRun {
    pub expanded: ExpandedGraph,
    pub hierarchy: Hierarchy,
    pub reorganized: Reorganized,
    pub attention: Signal,
    pub propagation: Signal,
    pub insight: InsightGraph,
    pub ranking: Vec<RankedToken>,
    pub bridges: Vec<Bridge>,
    pub suggestions: Vec<String>,
    pub narrative: Vec<String>,
}

/// Score records reachable from `seeds`.
///
/// The hierarchy is classified over every record the expansion reached, not
/// only the seeds.
pub fn score_records<S: AsRef<str>>(
    seeds: &[S],
    lookup: &dyn RecordLookup,
    options: &ScoreOptions,
) -> ScoredRun {
    score_recorded(seeds, lookup, options, &mut StepRecorder::new())
}

fn mean(signal: &Signal) -> f64 {
    if signal.is_empty() {
        0.0
    } else {
        signal.values().sum::<f64>() / signal.len() as f64
    }
}

fn score_recorded<S: AsRef<str>>(
    seeds: &[S],
    lookup: &dyn RecordLookup,
    options: &ScoreOptions,
    recorder: &mut StepRecorder,
) -> ScoredRun {
    let expanded = recorder.step("expand", || {
        let graph = Expansion::from(seeds.iter().map(|s| s.as_ref()))
            .depth(options.depth)
            .fanout(options.fanout)
            .execute(lookup);
        let note = format!("{} tokens traversed", graph.visited.len());
        (graph, note)
    });

    let hierarchy = recorder.step("hierarchy", || {
        let hierarchy = classify_hierarchy(expanded.records.values());
        let core = hierarchy
            .layers
            .values()
            .filter(|l| **l == HierarchyLayer::Core)
            .count();
        (hierarchy, format!("{} core tokens", core))
    });

    let reorganized = recorder.step("reorganize", || {
        let mut reorganized = reorganize(&expanded);
        integrate_bootstrap_edges(&mut reorganized, &options.text_edges);
        let edges: usize = reorganized.values().map(|n| n.edges.len()).sum();
        (reorganized, format!("{} edges ranked", edges))
    });

    let attention = recorder.step("attention", || {
        let attention = attention_embed(&reorganized);
        let note = format!("mean activation {:.3}", mean(&attention));
        (attention, note)
    });

    let propagation = recorder.step("propagate", || {
        let propagation = propagate(&reorganized, &attention);
        let note = format!("avg signal {:.3}", mean(&propagation));
        (propagation, note)
    });

    let (insight, narrative) = recorder.step("synthesize", || {
        let insight = compose(&hierarchy, &reorganized, &attention, &propagation);
        let narrative = synthesize_narrative(&insight);
        let note = format!(
            "layers={}, traversed={}",
            hierarchy.layers.len(),
            expanded.visited.len()
        );
        ((insight, narrative), note)
    });

    ScoredRun {
        ranking: rank(&insight),
        bridges: top_bridges(&insight),
        suggestions: suggest_next(&insight),
        expanded,
        hierarchy,
        reorganized,
        attention,
        propagation,
        insight,
        narrative,
    }
}

/// Settings an [`Engine`] applies to every run
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub model: String,
    pub depth: usize,
    pub fanout: usize,
    /// Records resolved at once
    pub concurrency: usize,
    /// Fold sequential text edges of the input into the graph
    pub sequence_edges: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            depth: DEFAULT_DEPTH,
            fanout: DEFAULT_FANOUT,
            concurrency: DEFAULT_CONCURRENCY,
            sequence_edges: false,
        }
    }
}

/// Records resolved for a batch of tokens
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// One record per unique token, in first-seen order
    pub records: Vec<AdjacencyRecord>,
    pub downloaded: usize,
    pub cached: usize,
}

impl FetchReport {
    pub fn by_token(&self) -> BTreeMap<String, AdjacencyRecord> {
        self.records
            .iter()
            .map(|r| (r.token.clone(), r.clone()))
            .collect()
    }

    fn note(&self) -> String {
        format!("{} downloaded, {} cached", self.downloaded, self.cached)
    }
}

/// Which streamed text a chunk belongs to in [`Engine::ask`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Answer,
    Reflection,
}

/// Output of a finished run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub log: RunLog,
    pub scored: ScoredRun,
}

/// Resolves records through a [`RecordCache`] and scores them.
pub struct Engine {
    cache: Arc<RecordCache>,
    client: Arc<dyn GenerationClient>,
    options: EngineOptions,
}

fn unique_tokens(tokens: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .iter()
        .map(|t| normalize_token(t))
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

impl Engine {
    pub fn new(
        cache: Arc<RecordCache>,
        client: Arc<dyn GenerationClient>,
        options: EngineOptions,
    ) -> Self {
        Self {
            cache,
            client,
            options,
        }
    }

    pub fn cache(&self) -> &Arc<RecordCache> {
        &self.cache
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Resolve one record per unique token, at most `concurrency` at a time.
    ///
    /// The first failure ends the batch.
    pub async fn fetch_records(
        &self,
        tokens: &[String],
        cancel: &CancellationToken,
    ) -> Result<FetchReport, EngineError> {
        let unique = unique_tokens(tokens);
        let model = self.options.model.as_str();
        let resolved: Vec<(AdjacencyRecord, Origin)> = stream::iter(unique.iter())
            .map(|token| self.cache.get_or_acquire(token, model, cancel))
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await?;

        let mut report = FetchReport::default();
        for (record, origin) in resolved {
            match origin {
                Origin::Downloaded => report.downloaded += 1,
                Origin::Cached => report.cached += 1,
            }
            report.records.push(record);
        }
        Ok(report)
    }

    /// Tokenize `text`, resolve its records and score them.
    pub async fn run(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let mut recorder = StepRecorder::new();
        let mut log = RunLog::new(text);

        log.tokens_in = recorder.step("tokenize", || {
            let tokens = tokenize_words(text);
            let note = format!("{} tokens", tokens.len());
            (tokens, note)
        });

        let fetched = recorder
            .try_step_async("fetch", async {
                let report = self.fetch_records(&log.tokens_in, cancel).await?;
                let note = report.note();
                Ok::<_, EngineError>((report, note))
            })
            .await?;

        let scored = self.score(&log.tokens_in, &fetched, &mut recorder);
        log.emergent_thoughts = scored.narrative.clone();
        log.steps = recorder.into_steps();
        info!(run = %log.id, steps = log.steps.len(), "Run complete");
        Ok(RunOutcome { log, scored })
    }

    /// Answer `prompt`, score prompt and answer together, then stream a
    /// rewrite of the answer informed by the narrative.
    ///
    /// Every streamed chunk of both answers is passed to `on_chunk`.
    pub async fn ask<F>(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
        mut on_chunk: F,
    ) -> Result<RunOutcome, EngineError>
    where
        F: FnMut(StreamPhase, &str) + Send,
    {
        let mut recorder = StepRecorder::new();
        let mut log = RunLog::new(prompt);

        log.tokens_in = recorder.step("tokenize prompt", || {
            let tokens = tokenize_words(prompt);
            let note = format!("{} tokens", tokens.len());
            (tokens, note)
        });
        let prompt_records = recorder
            .try_step_async("fetch prompt", async {
                let report = self.fetch_records(&log.tokens_in, cancel).await?;
                let note = report.note();
                Ok::<_, EngineError>((report, note))
            })
            .await?;

        let answer = recorder
            .try_step_async("answer", async {
                let text = self
                    .collect_stream(
                        answer_messages(prompt),
                        StreamPhase::Answer,
                        cancel,
                        &mut on_chunk,
                    )
                    .await?;
                let note = format!("{} chars", text.chars().count());
                Ok::<_, EngineError>((text, note))
            })
            .await?;

        log.tokens_out = recorder.step("tokenize answer", || {
            let tokens = tokenize_words(&answer);
            let note = format!("{} tokens", tokens.len());
            (tokens, note)
        });
        let answer_records = recorder
            .try_step_async("fetch answer", async {
                let report = self.fetch_records(&log.tokens_out, cancel).await?;
                let note = report.note();
                Ok::<_, EngineError>((report, note))
            })
            .await?;

        let mut combined = prompt_records;
        combined.records.extend(answer_records.records);
        combined.downloaded += answer_records.downloaded;
        combined.cached += answer_records.cached;

        let seeds: Vec<String> = log
            .tokens_in
            .iter()
            .chain(log.tokens_out.iter())
            .cloned()
            .collect();
        let scored = self.score(&seeds, &combined, &mut recorder);

        let reflection = reflect_rewrite(&answer, &scored.narrative);
        let refined = recorder
            .try_step_async("reflect", async {
                let text = self
                    .collect_stream(
                        reflect_messages(&reflection.payload),
                        StreamPhase::Reflection,
                        cancel,
                        &mut on_chunk,
                    )
                    .await?;
                let note = format!("draft {}", reflection.draft_id);
                Ok::<_, EngineError>((text, note))
            })
            .await?;

        log.original_answer = Some(answer);
        log.refined_answer = Some(refined);
        log.emergent_thoughts = scored.narrative.clone();
        log.steps = recorder.into_steps();
        info!(run = %log.id, steps = log.steps.len(), "Ask complete");
        Ok(RunOutcome { log, scored })
    }

    fn score(
        &self,
        seeds: &[String],
        fetched: &FetchReport,
        recorder: &mut StepRecorder,
    ) -> ScoredRun {
        let mut options = ScoreOptions::default()
            .depth(self.options.depth)
            .fanout(self.options.fanout);
        if self.options.sequence_edges {
            options = options.with_text(seeds);
        }
        let batch = fetched.by_token();
        let lookup = Layered::new(&batch, self.cache.as_ref());
        score_recorded(seeds, &lookup, &options, recorder)
    }

    async fn collect_stream<F>(
        &self,
        messages: Vec<ChatMessage>,
        phase: StreamPhase,
        cancel: &CancellationToken,
        on_chunk: &mut F,
    ) -> Result<String, EngineError>
    where
        F: FnMut(StreamPhase, &str) + Send,
    {
        cancel.checkpoint()?;
        let mut stream = self
            .client
            .stream_generate(messages, &self.options.model)
            .await?;
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            cancel.checkpoint()?;
            let chunk = chunk?;
            on_chunk(phase, &chunk);
            text.push_str(&chunk);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::{Acquirer, RecordingSleeper};
    use crate::llm::ScriptedClient;
    use crate::relation::RelationName;
    use crate::storage::{RecordStore, SqliteStore};
    use serde_json::json;

    fn rich_response(prefix: &str) -> String {
        let neighbors: Vec<_> = (0..12)
            .map(|i| json!({"token": format!("{}{}", prefix, i), "w": 0.8}))
            .collect();
        json!({"slots": {"Associated With": neighbors}}).to_string()
    }

    fn engine(client: Arc<ScriptedClient>, store: Arc<SqliteStore>) -> Engine {
        let acquirer = Acquirer::new(client.clone()).with_sleeper(Arc::new(RecordingSleeper::new()));
        let cache = Arc::new(RecordCache::new(store, Arc::new(acquirer)));
        Engine::new(cache, client, EngineOptions::default())
    }

    #[test]
    fn score_records_classifies_reached_records() {
        let mut records = BTreeMap::new();
        records.insert(
            "sun".to_string(),
            AdjacencyRecord::empty("sun", "m")
                .with_edge(RelationName::Causes, "heat", 0.9)
                .with_edge(RelationName::Evokes, "summer", 0.4),
        );
        records.insert(
            "heat".to_string(),
            AdjacencyRecord::empty("heat", "m").with_edge(RelationName::Causes, "sweat", 0.3),
        );

        let scored = score_records(&["sun"], &records, &ScoreOptions::default());
        assert_eq!(scored.expanded.visited, vec!["sun", "heat", "summer", "sweat"]);
        assert_eq!(scored.hierarchy.layers.len(), 2);
        assert_eq!(scored.hierarchy.layer("sun"), HierarchyLayer::Core);
        assert_eq!(scored.ranking[0].token, "sun");
        assert_eq!(scored.narrative.len(), 5);
    }

    #[test]
    fn text_edges_join_the_graph() {
        let records: BTreeMap<String, AdjacencyRecord> = BTreeMap::new();
        let tokens = tokenize_words("quiet river bend");
        let options = ScoreOptions::default().with_text(&tokens);
        let scored = score_records(&tokens, &records, &options);
        assert!(scored.expanded.nodes.is_empty());
        assert_eq!(scored.reorganized["quiet"].edges[0].neighbor, "river");
        assert!(scored.attention["quiet"] > 0.0);
    }

    #[tokio::test]
    async fn fetch_dedupes_and_counts_origins() {
        let client = Arc::new(ScriptedClient::new().always_text(rich_response("x")));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .save(&AdjacencyRecord::empty("moon", "m").with_edge(RelationName::Causes, "tide", 0.7))
            .unwrap();
        let engine = engine(client.clone(), store);

        let tokens: Vec<String> = ["Moon", "tide", "moon", " ", "tide"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = engine
            .fetch_records(&tokens, &CancellationToken::new())
            .await
            .unwrap();

        let names: Vec<_> = report.records.iter().map(|r| r.token.as_str()).collect();
        assert_eq!(names, vec!["moon", "tide"]);
        assert_eq!(report.cached, 1);
        assert_eq!(report.downloaded, 1);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn run_records_every_stage() {
        let client = Arc::new(ScriptedClient::new().always_text(rich_response("n")));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = engine(client, store);

        let outcome = engine
            .run("Moon tides", &CancellationToken::new())
            .await
            .unwrap();
        let names: Vec<_> = outcome.log.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "tokenize",
                "fetch",
                "expand",
                "hierarchy",
                "reorganize",
                "attention",
                "propagate",
                "synthesize"
            ]
        );
        assert!(outcome.log.steps.iter().all(|s| s.ok));
        assert_eq!(outcome.log.steps[1].note, "2 downloaded, 0 cached");
        assert_eq!(outcome.log.tokens_in, vec!["moon", "tides"]);
        assert_eq!(outcome.log.emergent_thoughts, outcome.scored.narrative);
    }

    #[tokio::test]
    async fn cancelled_run_fails_in_fetch() {
        let client = Arc::new(ScriptedClient::new().always_text(rich_response("n")));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = engine(client.clone(), store);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = engine.run("moon", &cancel).await.unwrap_err();
        assert!(matches!(err, EngineError::Cache(_)));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn ask_streams_answer_and_reflection() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        for token in ["why", "sky", "blue", "light", "scatters"] {
            store
                .save(&AdjacencyRecord::empty(token, "m").with_edge(RelationName::Causes, "color", 0.5))
                .unwrap();
        }
        let client = Arc::new(
            ScriptedClient::new()
                .then_text("light scatters")
                .then_text("Blue light scatters most."),
        );
        let engine = engine(client.clone(), store);

        let mut streamed = String::new();
        let mut phases = Vec::new();
        let outcome = engine
            .ask("Why sky blue", &CancellationToken::new(), |phase, chunk| {
                if phases.last() != Some(&phase) {
                    phases.push(phase);
                }
                streamed.push_str(chunk)
            })
            .await
            .unwrap();

        assert_eq!(outcome.log.original_answer.as_deref(), Some("light scatters"));
        assert_eq!(
            outcome.log.refined_answer.as_deref(),
            Some("Blue light scatters most.")
        );
        assert_eq!(streamed, "light scattersBlue light scatters most.");
        assert_eq!(phases, vec![StreamPhase::Answer, StreamPhase::Reflection]);
        assert_eq!(outcome.log.tokens_out, vec!["light", "scatters"]);
        assert_eq!(client.call_count(), 2);

        let reflect_call = &client.calls()[1];
        assert!(reflect_call.user.starts_with("Original answer:\nlight scatters"));
        assert!(outcome
            .log
            .steps
            .iter()
            .any(|s| s.name == "reflect" && s.note.starts_with("draft ")));
    }
}
