//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for interacting with multiple LLM
//! providers (Gemini, OpenAI, Ollama). The LlmProvider trait defines the
//! contract that all providers must implement: a free-text completion used to
//! phrase answers, and a structured completion that must yield a [`QueryPlan`]
//! (the SQL query the model wrote, plus a row-count hint).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::LlmConfig;

pub mod gemini;
pub mod ollama;
pub mod openai;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Default row-count hint when the model's response omits `top_k`
pub const DEFAULT_TOP_K: u32 = 10;

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

/// Structured output contract for query synthesis.
///
/// The model must produce a JSON object with a required `query` field and an
/// optional `top_k` field. A response that does not carry a non-empty `query`
/// is a parse failure, never a silent coercion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryPlan {
    /// The SQL query to run, targeting the configured dialect
    pub query: String,

    /// Number of top results to consider
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "gemini", "openai", "ollama")
    fn name(&self) -> &str;

    /// Returns true if this is a local provider (e.g., Ollama), false for
    /// cloud providers
    fn is_local(&self) -> bool;

    /// Generate a free-text completion for the given conversation.
    ///
    /// # Arguments
    /// * `messages` - System prompt, conversation history, and user message
    ///
    /// # Returns
    /// * `Ok(String)` - The model's text response
    /// * `Err(LlmError)` - If the request fails
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Generate a structured [`QueryPlan`] for the given conversation.
    ///
    /// Providers that support a native JSON output mode enable it here;
    /// the response is parsed and validated against the QueryPlan contract
    /// and fails with [`LlmError::ParseError`] if it does not conform.
    async fn generate_query(&self, messages: &[Message]) -> Result<QueryPlan>;
}

/// Build the provider selected by `config.default_provider`.
///
/// Cloud providers read their API keys from the environment at call time
/// (GEMINI_API_KEY, OPENAI_API_KEY); Ollama needs none.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.default_provider.as_str() {
        "gemini" => Ok(Arc::new(gemini::GeminiProvider::new(config.gemini.clone()))),
        "openai" => Ok(Arc::new(openai::OpenAIProvider::new(config.openai.clone()))),
        "ollama" => Ok(Arc::new(ollama::OllamaProvider::new(
            config.ollama.base_url.clone(),
            config.ollama.model.clone(),
        ))),
        other => Err(LlmError::UnknownProvider(other.to_string())),
    }
}

/// Parse a model response into a [`QueryPlan`].
///
/// Handles multiple LLM output formats:
/// 1. Raw JSON: `{"query": "...", "top_k": 5}`
/// 2. Fenced JSON (with or without trailing text): ` ```json\n{...}\n``` `
/// 3. JSON embedded in prose, found by scanning for `{"query"`
pub fn parse_query_plan(content: &str) -> Result<QueryPlan> {
    let trimmed = content.trim();

    // Pattern 1: Raw JSON (entire content is a valid plan object)
    if let Some(plan) = try_parse_plan_json(trimmed) {
        return Ok(plan);
    }

    // Pattern 2: Extract from markdown code fences (even with trailing text)
    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Some(plan) = try_parse_plan_json(inner.trim()) {
            return Ok(plan);
        }
    }

    // Pattern 3: Scan for {"query" anywhere in the content (model mixed
    // prose + JSON)
    if let Some(pos) = trimmed.find("{\"query\"") {
        let candidate = &trimmed[pos..];
        if let Some(json_str) = extract_balanced_json(candidate) {
            if let Some(plan) = try_parse_plan_json(json_str) {
                return Ok(plan);
            }
        }
    }

    Err(LlmError::ParseError(format!(
        "Structured output does not conform to the query contract: {}",
        truncate_for_error(trimmed)
    )))
}

/// Try to parse a string as a `{"query": "...", "top_k": ...}` plan.
/// Returns `None` if the JSON is invalid or `query` is missing or empty.
fn try_parse_plan_json(s: &str) -> Option<QueryPlan> {
    let plan: QueryPlan = serde_json::from_str(s).ok()?;
    if plan.query.trim().is_empty() {
        return None;
    }
    Some(plan)
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
fn extract_fenced_json(content: &str) -> Option<&str> {
    // Find opening fence
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    // Find closing fence after the body starts
    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn truncate_for_error(s: &str) -> &str {
    let limit = 200;
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
