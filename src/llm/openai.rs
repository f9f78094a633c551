//! OpenAI-compatible chat completions client
//!
//! Single-shot requests only: retries and backoff belong to the acquisition
//! protocol so that every sub-call shares one policy.

use super::streaming::{parse_sse_line, SseEvent};
use super::{ChatMessage, GenerationClient, GenerationError, GenerationRequest, TextStream};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for `POST {base_url}/chat/completions`
#[derive(Clone)]
pub struct OpenAiClient {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Builder for [`OpenAiClient`]
#[derive(Default)]
pub struct OpenAiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl OpenAiClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL (defaults to [`DEFAULT_BASE_URL`])
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<OpenAiClient, GenerationError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GenerationError::Unconfigured(
                    "API key is required (set OPENAI_API_KEY)".to_string(),
                )
            })?;

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(
                self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .map_err(|e| GenerationError::Unconfigured(e.to_string()))?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(OpenAiClient {
            http_client,
            api_key,
            base_url,
        })
    }
}

impl OpenAiClient {
    pub fn builder() -> OpenAiClientBuilder {
        OpenAiClientBuilder::new()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, GenerationError> {
        debug!(
            model = %body.model,
            messages = body.messages.len(),
            stream = body.stream.unwrap_or(false),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &request.model,
            messages: request.messages(),
            temperature: request.temperature,
            top_p: request.top_p,
            response_format: request
                .json_object
                .then_some(ResponseFormat { kind: "json_object" }),
            stream: None,
        };

        let response: ChatResponse = self
            .post(&body)
            .await?
            .json()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::Decode("response has no choices".to_string()))?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream_generate(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
    ) -> Result<TextStream, GenerationError> {
        let body = ChatRequest {
            model,
            messages,
            temperature: None,
            top_p: None,
            response_format: None,
            stream: Some(true),
        };
        let response = self.post(&body).await?;

        let stream = async_stream::stream! {
            let mut bytes_stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut done = false;

            'outer: while let Some(chunk) = bytes_stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        while let Some(newline) = buffer.find('\n') {
                            let line: String = buffer.drain(..=newline).collect();
                            match parse_sse_line(&line) {
                                Some(SseEvent::Delta(text)) => yield Ok(text),
                                Some(SseEvent::Done) => {
                                    done = true;
                                    break 'outer;
                                }
                                None => {}
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(GenerationError::Transport(e.to_string()));
                        done = true;
                        break;
                    }
                }
            }

            // A final event without a trailing newline.
            if !done {
                if let Some(SseEvent::Delta(text)) = parse_sse_line(&buffer) {
                    yield Ok(text);
                }
            }
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_api_key() {
        let err = OpenAiClient::builder().build().unwrap_err();
        assert!(matches!(err, GenerationError::Unconfigured(_)));

        let err = OpenAiClient::builder().api_key("  ").build().unwrap_err();
        assert!(matches!(err, GenerationError::Unconfigured(_)));
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let client = OpenAiClient::builder()
            .api_key("sk-test")
            .base_url("http://localhost:8080/v1/")
            .build()
            .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn json_request_body_shape() {
        let request = GenerationRequest::new("sys", "usr", "gpt-4o-mini")
            .temperature(0.4)
            .top_p(0.95)
            .json_object();
        let body = ChatRequest {
            model: &request.model,
            messages: request.messages(),
            temperature: request.temperature,
            top_p: request.top_p,
            response_format: Some(ResponseFormat { kind: "json_object" }),
            stream: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["response_format"]["type"], "json_object");
        assert!(value.get("stream").is_none());
    }
}
