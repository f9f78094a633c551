//! Server-Sent Events parsing for streamed chat completions

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Event parsed from one SSE line
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// A content fragment
    Delta(String),
    /// The `[DONE]` marker
    Done,
}

/// Parse a single SSE line.
///
/// Returns `None` for blank lines, comments, non-`data:` fields, chunks
/// without content, and malformed payloads (keep-alives are ignored rather
/// than failing the stream).
pub fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let line = line.trim();
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    let chunk: StreamChunk = serde_json::from_str(data).ok()?;
    let content = chunk.choices.into_iter().next()?.delta.content?;
    if content.is_empty() {
        None
    } else {
        Some(SseEvent::Delta(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"id":"x","choices":[{"index":0,"delta":{"content":"Hello"}}]}"#;
        assert_eq!(parse_sse_line(line), Some(SseEvent::Delta("Hello".into())));
    }

    #[test]
    fn parses_done_marker() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(SseEvent::Done));
        assert_eq!(parse_sse_line("data:[DONE]"), Some(SseEvent::Done));
    }

    #[test]
    fn ignores_noise() {
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("event: ping"), None);
        assert_eq!(parse_sse_line("data: {not json"), None);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            None
        );
    }
}
