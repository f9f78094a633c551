//! Timed run steps, run logs and the reflection payload

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use tracing::{info, warn};
use uuid::Uuid;

/// One timed stage of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStep {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ok: bool,
    pub note: String,
}

impl RunStep {
    /// Elapsed wall time in milliseconds, never negative
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0)
    }
}

/// Everything a run produced, for display and later inspection
#[derive(Debug, Clone, Serialize)]
pub struct RunLog {
    pub id: Uuid,
    pub input_prompt: String,
    pub original_answer: Option<String>,
    pub refined_answer: Option<String>,
    pub emergent_thoughts: Vec<String>,
    pub steps: Vec<RunStep>,
    pub tokens_in: Vec<String>,
    pub tokens_out: Vec<String>,
}

impl RunLog {
    pub fn new(input_prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_prompt: input_prompt.into(),
            original_answer: None,
            refined_answer: None,
            emergent_thoughts: Vec::new(),
            steps: Vec::new(),
            tokens_in: Vec::new(),
            tokens_out: Vec::new(),
        }
    }

    pub fn report(&self) -> String {
        format_run_report(&self.steps)
    }
}

/// Times closures as named steps and keeps the resulting [`RunStep`]s.
#[derive(Debug, Default)]
pub struct StepRecorder {
    steps: Vec<RunStep>,
}

impl StepRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run an infallible step; `f` returns its value and a short note.
    pub fn step<T>(&mut self, name: &str, f: impl FnOnce() -> (T, String)) -> T {
        let started_at = Utc::now();
        let (value, note) = f();
        self.finish(name, started_at, true, note);
        value
    }

    /// Run a fallible step; a failure is recorded with its message as note.
    pub fn try_step<T, E: Display>(
        &mut self,
        name: &str,
        f: impl FnOnce() -> Result<(T, String), E>,
    ) -> Result<T, E> {
        let started_at = Utc::now();
        let result = f();
        self.settle(name, started_at, result)
    }

    /// Async variant of [`try_step`](Self::try_step).
    pub async fn try_step_async<T, E, Fut>(&mut self, name: &str, fut: Fut) -> Result<T, E>
    where
        E: Display,
        Fut: Future<Output = Result<(T, String), E>>,
    {
        let started_at = Utc::now();
        let result = fut.await;
        self.settle(name, started_at, result)
    }

    fn settle<T, E: Display>(
        &mut self,
        name: &str,
        started_at: DateTime<Utc>,
        result: Result<(T, String), E>,
    ) -> Result<T, E> {
        match result {
            Ok((value, note)) => {
                self.finish(name, started_at, true, note);
                Ok(value)
            }
            Err(err) => {
                self.finish(name, started_at, false, err.to_string());
                Err(err)
            }
        }
    }

    fn finish(&mut self, name: &str, started_at: DateTime<Utc>, ok: bool, note: String) {
        let step = RunStep {
            name: name.to_string(),
            started_at,
            finished_at: Utc::now(),
            ok,
            note,
        };
        if ok {
            info!(step = %step.name, elapsed_ms = step.duration_ms(), note = %step.note, "Step complete");
        } else {
            warn!(step = %step.name, elapsed_ms = step.duration_ms(), error = %step.note, "Step failed");
        }
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[RunStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<RunStep> {
        self.steps
    }
}

/// One line per step: `✔ name (12ms) — note`, or `✖ …` for failures.
pub fn format_run_report(steps: &[RunStep]) -> String {
    if steps.is_empty() {
        return "No steps recorded.".to_string();
    }
    steps
        .iter()
        .map(|step| {
            let status = if step.ok { "✔" } else { "✖" };
            let note = if step.note.is_empty() {
                String::new()
            } else {
                format!(" — {}", step.note)
            };
            format!("{} {} ({}ms){}", status, step.name, step.duration_ms(), note)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A request to rewrite an answer using the run's narrative
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reflection {
    /// Stable 8-hex-digit id of (answer, narrative)
    pub draft_id: String,
    pub payload: String,
}

/// Build the rewrite payload for `original` given narrative lines.
pub fn reflect_rewrite(original: &str, bullets: &[String]) -> Reflection {
    let bullet_text = bullets
        .iter()
        .map(|b| format!("- {}", b))
        .collect::<Vec<_>>()
        .join("\n");
    let draft_id = draft_hash(&format!("{}|{}", original, bullet_text));
    let payload = format!(
        "Original answer:\n{}\n\nSignals (emergent thoughts):\n{}\n\n\
         Rewrite the answer to be clearer, better-structured, and more complete. \
         Keep it self-contained. Avoid revealing the internal analysis. Return plain text.",
        original, bullet_text
    );
    Reflection { draft_id, payload }
}

/// `h = h * 31 + unit (mod 2^32)` over UTF-16 code units, as 8 hex digits.
fn draft_hash(input: &str) -> String {
    let h = input
        .encode_utf16()
        .fold(0u32, |h, unit| h.wrapping_mul(31).wrapping_add(u32::from(unit)));
    format!("{:08x}", h)
}
