//! Conversation Memory
//!
//! Maintains the ordered window of recent question/answer turns that grounds
//! follow-up questions. The window holds at most K turns (default 3); the
//! oldest turn is evicted when a new one pushes the window past K. Turns can
//! also be recorded one side at a time, for seeding the window from an
//! external transcript where questions and answers arrive as separate calls.

use std::collections::VecDeque;

use crate::llm::Message;

/// Default number of turns kept for follow-up context
pub const DEFAULT_WINDOW: usize = 3;

/// One completed question/answer exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// What the user asked
    pub question: String,

    /// What the user was shown, including error messages
    pub answer: String,
}

/// Bounded, ordered window of recent turns
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    /// Completed turns, oldest first
    turns: VecDeque<Turn>,

    /// Maximum number of turns retained
    window: usize,

    /// Question half of a partially recorded turn, waiting for its answer
    pending_question: Option<String>,
}

impl ConversationMemory {
    /// Create a memory with the default window size
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Create a memory retaining at most `window` turns
    pub fn with_window(window: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            window: window.max(1),
            pending_question: None,
        }
    }

    /// Record a completed turn, evicting the oldest if the window is full
    pub fn record(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push_back(Turn {
            question: question.into(),
            answer: answer.into(),
        });

        while self.turns.len() > self.window {
            self.turns.pop_front();
        }
    }

    /// Record one side of a turn.
    ///
    /// An adjacent question-then-answer pair of calls composes into a
    /// single turn; an unanswered pending question is completed with an
    /// empty answer when the next question arrives, and an answer with no
    /// pending question becomes an answer-only turn.
    pub fn record_partial(&mut self, question: Option<&str>, answer: Option<&str>) {
        match (question, answer) {
            (Some(q), Some(a)) => self.record(q, a),
            (Some(q), None) => {
                if let Some(pending) = self.pending_question.take() {
                    self.record(pending, "");
                }
                self.pending_question = Some(q.to_string());
            }
            (None, Some(a)) => {
                let question = self.pending_question.take().unwrap_or_default();
                self.record(question, a);
            }
            (None, None) => {}
        }
    }

    /// The retained turns, oldest first
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Number of completed turns currently retained
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True if no completed turns are retained
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Maximum number of turns retained
    pub fn window(&self) -> usize {
        self.window
    }

    /// Reset to an empty window, discarding any pending half-turn
    pub fn clear(&mut self) {
        self.turns.clear();
        self.pending_question = None;
    }

    /// Render the window as alternating user/assistant messages for
    /// embedding into a prompt. Empty sides of a turn are skipped.
    pub fn as_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() * 2);
        for turn in &self.turns {
            if !turn.question.is_empty() {
                messages.push(Message::user(&turn.question));
            }
            if !turn.answer.is_empty() {
                messages.push(Message::assistant(&turn.answer));
            }
        }
        messages
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}
