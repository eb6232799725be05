//! Assistant Core
//!
//! This module implements the per-question pipeline that orchestrates a
//! conversational SQL session:
//!
//! 1. Record the question in the question history (best-effort)
//! 2. Synthesize a SQL query from the question, the live schema, and the
//!    conversation window
//! 3. Execute the query; classify and log the outcome
//! 4. Rephrase the raw result as a natural-language answer
//! 5. Record the turn (answer or error text) into conversation memory
//!
//! Every path terminates in a returned string: model faults at either
//! synthesis stage are converted to a single user-facing error message,
//! and that message is what gets recorded into memory, so follow-up
//! questions see exactly what the user saw.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::{is_database_error, SqlDatabase, DATABASE_ERROR_MARKER};
use crate::history::{QueryLog, QueryStatus, QuestionHistory};
use crate::llm::LlmProvider;

use super::synthesizer::{AnswerSynthesizer, QuerySynthesizer};
use super::{ConversationMemory, Turn};

/// Orchestrates one conversation against one database.
///
/// Owns the conversation memory and the log-store handles for its session;
/// serve each concurrent conversation with its own instance.
pub struct Assistant {
    /// Database the questions are answered over
    db: Arc<SqlDatabase>,

    /// Conversation window grounding follow-up questions
    memory: ConversationMemory,

    /// Append-only record of asked questions
    questions: QuestionHistory,

    /// Append-only audit log of executed queries
    query_log: QueryLog,

    /// Question → SQL synthesis stage
    query_synth: QuerySynthesizer,

    /// Raw result → prose stage
    answer_synth: AnswerSynthesizer,
}

impl Assistant {
    /// Create an assistant session.
    ///
    /// `data_dir` holds the history and log files; `window` is the number
    /// of turns kept for context; `top_k` is the result-row hint embedded
    /// into the query prompt.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        db: Arc<SqlDatabase>,
        data_dir: &Path,
        window: usize,
        top_k: u32,
    ) -> Self {
        Self {
            db,
            memory: ConversationMemory::with_window(window),
            questions: QuestionHistory::new(data_dir),
            query_log: QueryLog::new(data_dir),
            query_synth: QuerySynthesizer::new(Arc::clone(&provider), top_k),
            answer_synth: AnswerSynthesizer::new(provider),
        }
    }

    /// Process one question to completion and return the answer text.
    ///
    /// Never fails: any fault inside the pipeline is converted to a
    /// user-facing error string, and the turn is recorded into memory on
    /// both arms.
    pub async fn handle_query(&mut self, question: &str) -> String {
        info!("Handling question: {}", question);

        if let Err(e) = self.questions.append(question).await {
            warn!("Failed to save question: {:#}", e);
        }

        let answer = match self.answer_question(question).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Pipeline failed: {:#}", e);
                format!(
                    "Error processing your question: {:#}. Please try rephrasing your question.",
                    e
                )
            }
        };

        self.memory.record(question, &answer);

        answer
    }

    /// The fallible stages of the pipeline: synthesize, execute, rephrase.
    async fn answer_question(&mut self, question: &str) -> Result<String> {
        // Fetched fresh per question so the model always sees the live schema
        let table_info = self
            .db
            .table_info()
            .await
            .context("Failed to read database schema")?;

        let plan = self
            .query_synth
            .synthesize(question, self.db.dialect(), &table_info, &self.memory)
            .await
            .context("Query synthesis failed")?;

        debug!("Synthesized query: {}", plan.query);

        let result = self.execute_and_log(question, &plan.query).await;

        let answer = self
            .answer_synth
            .rephrase(question, &plan.query, &result)
            .await
            .context("Answer synthesis failed")?;

        Ok(answer)
    }

    /// Execute the query and log the outcome.
    ///
    /// Execution faults are already normalized inside the executor; a
    /// fault in the surrounding call (result rendering) is logged as
    /// EXCEPTION and normalized here, so this stage always yields a
    /// result string for the answer synthesizer.
    async fn execute_and_log(&self, question: &str, query: &str) -> String {
        match self.db.run_query(query).await {
            Ok(result) => {
                let status = if is_database_error(&result) {
                    QueryStatus::Error
                } else {
                    QueryStatus::Success
                };
                if let Err(e) = self.query_log.append(question, query, &status).await {
                    warn!("Failed to write query log: {:#}", e);
                }
                result
            }
            Err(e) => {
                let status = QueryStatus::Exception(format!("{:#}", e));
                if let Err(log_err) = self.query_log.append(question, query, &status).await {
                    warn!("Failed to write query log: {:#}", log_err);
                }
                format!("{} {:#}", DATABASE_ERROR_MARKER, e)
            }
        }
    }

    /// The most recent questions ever asked, oldest first, capped at 10.
    ///
    /// A read failure is reported to the log and reads as empty; history
    /// display must never break the session.
    pub async fn saved_questions(&self) -> Vec<String> {
        match self.questions.recent().await {
            Ok(questions) => questions,
            Err(e) => {
                warn!("Failed to read question history: {:#}", e);
                Vec::new()
            }
        }
    }

    /// The current conversation window rendered as display lines,
    /// oldest first.
    pub fn conversation_history(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.memory.len() * 2);
        for Turn { question, answer } in self.memory.snapshot() {
            lines.push(format!("Q: {}", question));
            lines.push(format!("A: {}", answer));
        }
        lines
    }

    /// Seed one side of a turn from an external transcript.
    pub fn sync_turn(&mut self, question: Option<&str>, answer: Option<&str>) {
        self.memory.record_partial(question, answer);
    }

    /// Clear the conversation window and report it.
    pub fn clear_memory(&mut self) -> String {
        self.memory.clear();
        "Conversation memory cleared.".to_string()
    }
}
