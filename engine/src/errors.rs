//! Error types and handling
//!
//! This module provides the error type used at the engine's outer
//! boundary (configuration loading). Faults inside the query pipeline
//! itself are either normalized to strings at the executor boundary or
//! carried as `llm::LlmError` until the orchestrator converts them to a
//! user-facing message.

use thiserror::Error;

/// Main engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
