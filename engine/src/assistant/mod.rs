//! Conversational query pipeline
//!
//! The assistant module ties the LLM provider, the database, and the log
//! store together into the per-question pipeline.

pub mod conversation;
pub mod core;
pub mod synthesizer;

pub use conversation::{ConversationMemory, Turn, DEFAULT_WINDOW};
pub use core::Assistant;
