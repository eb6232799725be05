//! Question history and query log persistence
//!
//! Two independent append-only text files under the data directory:
//!
//! - `question_history.txt`: one question per line; read back for the
//!   "past questions" display, capped at the 10 most recent.
//! - `query_log.txt`: a human-readable block per executed query
//!   (timestamp, question, SQL, status) for auditing. Write-only; no read
//!   API is defined.
//!
//! Both writers are best-effort from the pipeline's point of view: the
//! orchestrator logs a warning on failure and carries on.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Maximum number of past questions exposed to callers
pub const MAX_SAVED_QUESTIONS: usize = 10;

/// Separator line between query log blocks
const LOG_SEPARATOR_WIDTH: usize = 50;

/// Outcome of one executor call, as recorded in the query log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    /// The query executed and returned a result
    Success,

    /// The executor returned a normalized database error
    Error,

    /// The executor call itself failed outside query execution
    Exception(String),
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStatus::Success => write!(f, "SUCCESS"),
            QueryStatus::Error => write!(f, "ERROR"),
            QueryStatus::Exception(detail) => write!(f, "EXCEPTION: {}", detail),
        }
    }
}

/// Append-only file of asked questions
pub struct QuestionHistory {
    path: PathBuf,
}

impl QuestionHistory {
    /// Create a question history stored under the given data directory
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("question_history.txt"),
        }
    }

    /// Append one question as a single line.
    ///
    /// Embedded newlines are flattened so the one-question-per-line
    /// invariant holds for read-back.
    pub async fn append(&self, question: &str) -> Result<()> {
        let line = format!("{}\n", question.replace(['\n', '\r'], " "));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;

        Ok(())
    }

    /// Read back the most recent questions, oldest first, capped at
    /// [`MAX_SAVED_QUESTIONS`]. A missing file reads as empty.
    pub async fn recent(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let questions: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        let start = questions.len().saturating_sub(MAX_SAVED_QUESTIONS);
        Ok(questions[start..].to_vec())
    }
}

/// Append-only audit log of executed queries
pub struct QueryLog {
    path: PathBuf,
}

impl QueryLog {
    /// Create a query log stored under the given data directory
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("query_log.txt"),
        }
    }

    /// Append one block recording a completed executor call.
    pub async fn append(&self, question: &str, query: &str, status: &QueryStatus) -> Result<()> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

        let block = format!(
            "[{}] Question: {}\nSQL Query: {}\nStatus: {}\n{}\n",
            timestamp,
            question,
            query,
            status,
            "-".repeat(LOG_SEPARATOR_WIDTH)
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        file.write_all(block.as_bytes())
            .await
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;

        Ok(())
    }
}
