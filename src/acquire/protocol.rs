//! The pass ladder: Base → Contextual → Forced → Bootstrap

use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use super::AcquireError;
use crate::cancel::CancellationToken;
use crate::llm::{GenerationClient, GenerationRequest};
use crate::prompts;
use crate::record::{
    extract_json, normalize_token, sanitize, validate, AdjacencyRecord, Edge, Provenance,
    Sanitized,
};
use crate::relation::RelationName;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Terms written into "Co-occurs With" when every model pass came back sparse.
pub const GENERIC_NEIGHBORS: [&str; 7] = [
    "meaning",
    "context",
    "usage",
    "definition",
    "example",
    "related term",
    "synonym",
];

const MAX_BOOTSTRAP_NEIGHBORS: usize = 6;
const BASE_TEMPERATURE: f32 = 0.4;
const FORCED_TEMPERATURE: f32 = 0.6;
const TOP_P: f32 = 0.95;

/// Thresholds and retry budget for one acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireConfig {
    /// Positive-weight entries needed to accept a base or contextual pass
    pub min_base: usize,
    /// Slots the base instruction asks to populate
    pub min_base_slots: usize,
    /// Positive-weight entries needed to accept the forced pass
    pub min_forced: usize,
    /// Slots the forced instruction asks to populate
    pub min_forced_slots: usize,
    /// Disambiguation hints are cut to this many characters
    pub hint_max_chars: usize,
    pub retry: RetryPolicy,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            min_base: 12,
            min_base_slots: 6,
            min_forced: 24,
            min_forced_slots: 8,
            hint_max_chars: 300,
            retry: RetryPolicy::default(),
        }
    }
}

/// A model-backed pass of the ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Base,
    Contextual,
    Forced,
}

impl PassKind {
    /// Model passes in the order they are attempted.
    pub const LADDER: [PassKind; 3] = [PassKind::Base, PassKind::Contextual, PassKind::Forced];

    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Base => "base",
            PassKind::Contextual => "contextual",
            PassKind::Forced => "forced",
        }
    }

    /// Entries needed for this pass's result to be accepted.
    fn threshold(&self, config: &AcquireConfig) -> usize {
        match self {
            PassKind::Base | PassKind::Contextual => config.min_base,
            PassKind::Forced => config.min_forced,
        }
    }

    fn request(
        &self,
        config: &AcquireConfig,
        token: &str,
        model: &str,
        hint: Option<&str>,
    ) -> GenerationRequest {
        let (system, temperature) = match self {
            PassKind::Base | PassKind::Contextual => (
                prompts::adjacency_base_instruction(config.min_base, config.min_base_slots),
                BASE_TEMPERATURE,
            ),
            PassKind::Forced => (
                prompts::adjacency_forced_instruction(config.min_forced, config.min_forced_slots),
                FORCED_TEMPERATURE,
            ),
        };
        GenerationRequest::new(system, prompts::adjacency_user_instruction(token, hint), model)
            .temperature(temperature)
            .top_p(TOP_P)
            .json_object()
    }
}

/// Ladder step that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderState {
    Base,
    Contextual,
    Forced,
    Bootstrap,
}

impl From<PassKind> for LadderState {
    fn from(pass: PassKind) -> Self {
        match pass {
            PassKind::Base => LadderState::Base,
            PassKind::Contextual => LadderState::Contextual,
            PassKind::Forced => LadderState::Forced,
        }
    }
}

/// What happened in one step of the ladder
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// The pass produced enough evidence and its record was returned
    Accepted { pass: PassKind, non_empty: usize },
    /// Valid but too sparse; the ladder moved on
    Insufficient { pass: PassKind, non_empty: usize },
    /// The sanitized record failed validation; the ladder moved on
    SchemaMismatch { pass: PassKind, reason: String },
    /// Generic neighbors were seeded locally
    Bootstrapped { neighbors: usize },
}

/// Trail of pass outcomes for one acquisition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub outcomes: Vec<PassOutcome>,
    /// Disambiguation hint used by the later passes, if one was obtained
    pub hint: Option<String>,
}

/// An acquired record together with how it was obtained
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub record: AdjacencyRecord,
    pub report: PassReport,
    pub resolved_by: LadderState,
}

/// Generic neighbors for `token`: the generic terms minus the token itself,
/// at most six, weighted `max(0.3, 0.9 - 0.05 * i)`.
pub fn bootstrap_neighbors(token: &str) -> Vec<Edge> {
    let token = normalize_token(token);
    GENERIC_NEIGHBORS
        .iter()
        .filter(|term| **term != token)
        .take(MAX_BOOTSTRAP_NEIGHBORS)
        .enumerate()
        .map(|(i, term)| Edge::new(*term, (0.9 - 0.05 * i as f64).max(0.3)))
        .collect()
}

/// Runs the acquisition protocol against a generation client.
pub struct Acquirer {
    client: Arc<dyn GenerationClient>,
    sleeper: Arc<dyn Sleeper>,
    config: AcquireConfig,
}

impl Acquirer {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self {
            client,
            sleeper: Arc::new(TokioSleeper),
            config: AcquireConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AcquireConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the backoff sleeper (tests use a recording one).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &AcquireConfig {
        &self.config
    }

    /// Acquire a schema-valid record for `token`.
    pub async fn acquire(
        &self,
        token: &str,
        model: &str,
        hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AdjacencyRecord, AcquireError> {
        Ok(self.acquire_with_report(token, model, hint, cancel).await?.record)
    }

    /// Like [`acquire`](Self::acquire), also returning the pass trail.
    ///
    /// A caller-supplied hint is used from the base pass on and the hint
    /// fetch is skipped.
    pub async fn acquire_with_report(
        &self,
        token: &str,
        model: &str,
        hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Acquisition, AcquireError> {
        let token = normalize_token(token);
        let caller_hint = hint
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| self.truncate_hint(h));
        let mut report = PassReport {
            outcomes: Vec::new(),
            hint: caller_hint.clone(),
        };
        let mut sparse: Option<AdjacencyRecord> = None;

        for pass in PassKind::LADDER {
            cancel.checkpoint()?;

            if pass == PassKind::Contextual && report.hint.is_none() {
                report.hint = self.fetch_hint(&token, model, cancel).await?;
            }
            let hint = match pass {
                PassKind::Base => caller_hint.as_deref(),
                _ => report.hint.as_deref(),
            };

            let request = pass.request(&self.config, &token, model, hint);
            match self.run_pass(pass, &request, &token, model, cancel).await {
                Ok(Sanitized { record, non_empty }) => {
                    if non_empty >= pass.threshold(&self.config) {
                        info!(token = %token, pass = pass.as_str(), non_empty, "Record accepted");
                        report.outcomes.push(PassOutcome::Accepted { pass, non_empty });
                        return Ok(Acquisition {
                            record,
                            report,
                            resolved_by: pass.into(),
                        });
                    }
                    info!(
                        token = %token,
                        pass = pass.as_str(),
                        non_empty,
                        needed = pass.threshold(&self.config),
                        "Response too sparse, escalating"
                    );
                    report
                        .outcomes
                        .push(PassOutcome::Insufficient { pass, non_empty });
                    sparse = Some(record);
                }
                Err(AcquireError::Schema(violation)) => {
                    warn!(token = %token, pass = pass.as_str(), %violation, "Schema mismatch, escalating");
                    report.outcomes.push(PassOutcome::SchemaMismatch {
                        pass,
                        reason: violation.to_string(),
                    });
                }
                Err(err) => {
                    warn!(token = %token, pass = pass.as_str(), error = %err, "Acquisition failed");
                    return Err(err);
                }
            }
        }

        cancel.checkpoint()?;
        let record = bootstrap(sparse.unwrap_or_else(|| AdjacencyRecord::empty(&token, model)));
        validate(&record)?;
        let neighbors = record.slot(RelationName::CoOccursWith).len();
        info!(token = %token, neighbors, "Model passes exhausted, bootstrap seeding applied");
        report.outcomes.push(PassOutcome::Bootstrapped { neighbors });
        Ok(Acquisition {
            record,
            report,
            resolved_by: LadderState::Bootstrap,
        })
    }

    /// One model pass: generate with retries, parse, sanitize, validate.
    async fn run_pass(
        &self,
        pass: PassKind,
        request: &GenerationRequest,
        token: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<Sanitized, AcquireError> {
        debug!(token, pass = pass.as_str(), "Starting pass");
        let client = &self.client;
        let raw = self
            .config
            .retry
            .run(pass.as_str(), self.sleeper.as_ref(), cancel, move || async move {
                let text = client.generate(request).await?;
                extract_json(&text).ok_or_else(|| {
                    AcquireError::Unparseable(text.chars().take(120).collect())
                })
            })
            .await
            .map_err(AcquireError::into_exhausted)?;

        let sanitized = sanitize(&raw, token, model);
        validate(&sanitized.record)?;
        Ok(sanitized)
    }

    /// Best-effort disambiguation hint; any failure other than cancellation
    /// yields `None`.
    async fn fetch_hint(
        &self,
        token: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, AcquireError> {
        let request = GenerationRequest::new(
            prompts::CONTEXT_HINT_SYSTEM,
            prompts::context_hint_user_instruction(token),
            model,
        )
        .temperature(BASE_TEMPERATURE);
        let request = &request;
        let client = &self.client;

        let result = self
            .config
            .retry
            .run("hint", self.sleeper.as_ref(), cancel, move || async move {
                Ok(client.generate(request).await?)
            })
            .await;

        match result {
            Ok(text) => {
                let hint = self.truncate_hint(text.trim());
                Ok(Some(hint).filter(|h| !h.is_empty()))
            }
            Err(AcquireError::Cancelled) => Err(AcquireError::Cancelled),
            Err(err) => {
                warn!(token, error = %err, "Context hint failed");
                Ok(None)
            }
        }
    }

    fn truncate_hint(&self, hint: &str) -> String {
        hint.chars().take(self.config.hint_max_chars).collect()
    }
}

/// Replace "Co-occurs With" with generic neighbors and mark the record as
/// locally seeded.
fn bootstrap(mut record: AdjacencyRecord) -> AdjacencyRecord {
    record
        .slots
        .insert(RelationName::CoOccursWith, bootstrap_neighbors(&record.token));
    record.meta.source = Provenance::Bootstrap;
    record.meta.downloaded_at = Utc::now();
    record
}
