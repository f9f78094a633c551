//! Scripted client for testing: replays preconfigured outcomes in order

use super::{ChatMessage, GenerationClient, GenerationError, GenerationRequest, TextStream};
use crate::cancel::CancellationToken;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;

type Outcome = Result<String, GenerationError>;

/// A generation double.
///
/// Each call pops the next scripted outcome; once the script is exhausted the
/// fallback outcome (if any) repeats forever. Every request is recorded so
/// tests can assert on call counts and prompt contents.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Option<Outcome>,
    calls: Mutex<Vec<GenerationRequest>>,
    cancel_on: Option<(usize, CancellationToken)>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    /// Queue a failure with the given HTTP status.
    pub fn then_status(self, status: u16) -> Self {
        self.push(Err(GenerationError::Status {
            status,
            body: format!("scripted {}", status),
        }))
    }

    /// Queue an arbitrary failure.
    pub fn then_error(self, error: GenerationError) -> Self {
        self.push(Err(error))
    }

    /// Respond with `text` once the script runs out.
    pub fn always_text(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(Ok(text.into()));
        self
    }

    /// Fail with `status` once the script runs out.
    pub fn always_status(mut self, status: u16) -> Self {
        self.fallback = Some(Err(GenerationError::Status {
            status,
            body: format!("scripted {}", status),
        }));
        self
    }

    /// Cancel `token` while serving the `call`-th request (1-based).
    pub fn cancel_on_call(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_on = Some((call, token));
        self
    }

    fn push(self, outcome: Outcome) -> Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(outcome);
        self
    }

    fn next_outcome(&self) -> Outcome {
        let scripted = self.script.lock().expect("script lock poisoned").pop_front();
        match scripted {
            Some(outcome) => outcome,
            None => self.fallback.clone().unwrap_or_else(|| {
                Err(GenerationError::Transport(
                    "scripted client has no more responses".to_string(),
                ))
            }),
        }
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let count = {
            let mut calls = self.calls.lock().expect("calls lock poisoned");
            calls.push(request.clone());
            calls.len()
        };
        if let Some((call, token)) = &self.cancel_on {
            if *call == count {
                token.cancel();
            }
        }
        self.next_outcome()
    }

    async fn stream_generate(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
    ) -> Result<TextStream, GenerationError> {
        let (system, user) = match messages.as_slice() {
            [system, user, ..] => (system.content.clone(), user.content.clone()),
            [only] => (String::new(), only.content.clone()),
            [] => (String::new(), String::new()),
        };
        let request = GenerationRequest::new(system, user, model);
        let text = self.generate(&request).await?;

        let chunks: Vec<Result<String, GenerationError>> = text
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        Ok(futures_util::stream::iter(chunks).boxed())
    }
}
