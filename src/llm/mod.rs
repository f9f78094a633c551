//! Generation collaborator: the text model the acquisition protocol calls
//!
//! Defines the client trait and request/error types. Two implementations:
//! - `OpenAiClient`: OpenAI-compatible chat completions over HTTP (production)
//! - `ScriptedClient`: replays a scripted sequence of outcomes (testing)
//!
//! The acquisition protocol only needs `generate`; `stream_generate` serves
//! long-form answers shown to the user.

mod mock;
mod openai;
mod streaming;

pub use mock::ScriptedClient;
pub use openai::{OpenAiClient, OpenAiClientBuilder, DEFAULT_BASE_URL};
pub use streaming::{parse_sse_line, SseEvent};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single non-streaming generation call: one system and one user instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// Ask the endpoint to constrain output to a JSON object
    pub json_object: bool,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: model.into(),
            temperature: None,
            top_p: None,
            json_object: false,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn json_object(mut self) -> Self {
        self.json_object = true;
        self
    }

    /// The request as a two-message conversation.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(&self.system), ChatMessage::user(&self.user)]
    }
}

/// Errors from generation calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response decode error: {0}")]
    Decode(String),
    #[error("client not configured: {0}")]
    Unconfigured(String),
}

impl GenerationError {
    /// HTTP status carried by the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GenerationError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transient failures: no status, a 5xx, or 429.
    ///
    /// A misconfigured client never succeeds on retry and is excluded.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Unconfigured(_) => false,
            _ => match self.status() {
                None => true,
                Some(status) => status >= 500 || status == 429,
            },
        }
    }
}

/// Incremental text chunks of a streamed answer
pub type TextStream = BoxStream<'static, Result<String, GenerationError>>;

/// Client trait for the text model.
///
/// Abstracts over transport (HTTP, scripted) so the acquisition protocol
/// doesn't depend on how the model is reached.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a complete response for a system + user instruction pair.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Stream a response for an arbitrary conversation.
    async fn stream_generate(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
    ) -> Result<TextStream, GenerationError>;
}
