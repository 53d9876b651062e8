use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing_error::SpanTrace;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl ConversationId {
    pub fn short(&self) -> &str {
        crate::str_utils::prefix_chars(&self.0, 12)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AnswerId(pub Uuid);

impl AnswerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnswerId {
    fn default() -> Self {
        Self::new()
    }
}

/// One user-submitted message; immutable once sent.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub conversation_id: ConversationId,
    pub user_text: String,
    pub hybrid: bool,
}

/// --- STREAM FRAMES ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Token,
    Sources,
    Done,
    Error,
    Message,
    Other(String),
}

impl FrameEvent {
    pub fn from_name(name: &str) -> Self {
        match name {
            "token" => Self::Token,
            "sources" => Self::Sources,
            "done" => Self::Done,
            "error" => Self::Error,
            "message" => Self::Message,
            other => Self::Other(other.to_string()),
        }
    }

    /// `done` and `error` end the stream; nothing is read past them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Token => "token",
            Self::Sources => "sources",
            Self::Done => "done",
            Self::Error => "error",
            Self::Message => "message",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for FrameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A decoded (event, payload) pair. Produced by the framing layer,
/// consumed once by the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub event: FrameEvent,
    pub data: String,
}

/// --- ANSWER STATE ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStatus {
    Streaming,
    Done,
    Errored,
    /// The transport dropped mid-answer; partial text is kept as-is.
    Interrupted,
}

impl AnswerStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Streaming)
    }
}

/// A retrieved document excerpt cited as evidence for an answer.
/// Built atomically from a `sources` frame; never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default, alias = "content")]
    pub preview: String,
}

impl SourceRef {
    pub fn page_label(&self) -> String {
        match self.page {
            Some(p) => p.to_string(),
            None => "Unknown".to_string(),
        }
    }
}

/// Visible state of one in-progress answer. `text` is append-only while
/// `Streaming`; the whole struct is immutable once the status is terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerState {
    pub id: AnswerId,
    pub text: String,
    pub sources: Option<Vec<SourceRef>>,
    pub status: AnswerStatus,
}

impl AnswerState {
    pub fn new() -> Self {
        Self {
            id: AnswerId::new(),
            text: String::new(),
            sources: None,
            status: AnswerStatus::Streaming,
        }
    }
}

impl Default for AnswerState {
    fn default() -> Self {
        Self::new()
    }
}

/// --- SESSION ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: String,
}

impl PublicUser {
    pub fn initial(&self) -> String {
        if !self.avatar.is_empty() {
            return self.avatar.clone();
        }
        match self.name.chars().next() {
            Some(c) => c.to_uppercase().to_string(),
            None => "U".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

/// --- WIRE TYPES ---

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub conversation_id: String,
    pub message: String,
    pub hybrid: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: PublicUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    pub filename: String,
    #[serde(default)]
    pub pages: Option<u64>,
    #[serde(default)]
    pub chunks: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiFailure {
    #[serde(default)]
    pub detail: Option<String>,
}

/// Extracts the backend's `{detail}` message from a failure body,
/// degrading to `default` when the body is not what we expect.
pub fn failure_detail(body: &str, default: &str) -> String {
    match serde_json::from_str::<ApiFailure>(body) {
        Ok(ApiFailure { detail: Some(d) }) => d,
        _ => default.to_string(),
    }
}

/// --- FRAME PAYLOAD PARSERS ---
///
/// All three degrade rather than fail: a malformed payload never aborts
/// the stream.

/// `{t: string}` payload of a `token` frame. Invalid JSON falls back to
/// the raw payload; valid JSON without a string `t` yields an empty delta.
pub fn parse_token_delta(data: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(v) => match v.get("t").and_then(|t| t.as_str()) {
            Some(t) => t.to_string(),
            None => String::new(),
        },
        Err(_) => data.to_string(),
    }
}

/// `{sources: [...]}` payload of a `sources` frame. Anything malformed
/// means "no sources available", not an error.
pub fn parse_sources(data: &str) -> Option<Vec<SourceRef>> {
    let v = serde_json::from_str::<serde_json::Value>(data).ok()?;
    serde_json::from_value(v.get("sources")?.clone()).ok()
}

/// `{detail: string}` payload of an `error` frame.
pub fn parse_error_detail(data: &str) -> Option<String> {
    let v = serde_json::from_str::<serde_json::Value>(data).ok()?;
    v.get("detail")?.as_str().map(str::to_string)
}

/// --- ERRORS ---

#[derive(Error, Debug)]
pub enum RaglineError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Auth failed: {0}")]
    Auth(String),

    #[error("Upload rejected: {0}")]
    Upload(String),

    #[error("Internal error: {0}")]
    Internal(String, SpanTrace),
}

#[derive(Debug)]
pub struct ObservedError {
    pub inner: RaglineError,
    pub span_trace: SpanTrace,
}

impl fmt::Display for ObservedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\nSpan Trace:\n{}", self.inner, self.span_trace)
    }
}

impl std::error::Error for ObservedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl<E> From<E> for ObservedError
where
    E: Into<RaglineError>,
{
    fn from(error: E) -> Self {
        Self {
            inner: error.into(),
            span_trace: SpanTrace::capture(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ObservedError>;

#[cfg(test)]
mod parsing_tests {
    use super::*;

    #[test]
    fn test_parse_token_delta_json() {
        assert_eq!(parse_token_delta(r#"{"t":"Hel"}"#), "Hel");
    }

    #[test]
    fn test_parse_token_delta_raw_fallback() {
        // Not JSON at all: the literal payload becomes the delta.
        assert_eq!(parse_token_delta("plain text"), "plain text");
    }

    #[test]
    fn test_parse_token_delta_missing_field() {
        // Valid JSON without `t` contributes nothing.
        assert_eq!(parse_token_delta(r#"{"x":1}"#), "");
    }

    #[test]
    fn test_parse_sources_lenient_entries() {
        let parsed = parse_sources(r#"{"sources":[{"page":3,"preview":"abc"},{"content":"def"}]}"#)
            .expect("sources");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].page, Some(3));
        assert_eq!(parsed[1].page, None);
        assert_eq!(parsed[1].preview, "def");
        assert_eq!(parsed[1].page_label(), "Unknown");
    }

    #[test]
    fn test_parse_sources_malformed() {
        assert!(parse_sources("{bad").is_none());
        assert!(parse_sources(r#"{"other":1}"#).is_none());
    }

    #[test]
    fn test_failure_detail() {
        assert_eq!(
            failure_detail(r#"{"detail":"index missing"}"#, "Chat failed"),
            "index missing"
        );
        assert_eq!(failure_detail("<html>", "Chat failed"), "Chat failed");
    }
}
