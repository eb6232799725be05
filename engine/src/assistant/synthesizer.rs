//! Query and Answer Synthesizers
//!
//! Both halves of the two model calls the pipeline makes: turning a
//! question (plus schema and recent turns) into a SQL query plan, and
//! turning a raw query result back into prose. Neither synthesizer
//! retries or catches model faults; failures propagate to the
//! orchestrator, which owns the user-facing error mapping.

use std::sync::Arc;

use crate::llm::{LlmProvider, Message, QueryPlan, Result};

use super::ConversationMemory;

/// System instruction for query synthesis. Placeholders: `{dialect}`,
/// `{top_k}`, `{table_info}`.
const QUERY_SYSTEM_TEMPLATE: &str = "\
Given an input question, create a syntactically correct {dialect} query to
run to help find the answer. Unless the user specifies in his question a
specific number of examples they wish to obtain, always limit your query to
at most {top_k} results. You can order the results by a relevant column to
return the most interesting examples in the database.

Never query for all the columns from a specific table, only ask for the
few relevant columns given the question.

Pay attention to use only the column names that you can see in the schema
description. Be careful to not query for columns that do not exist. Also,
pay attention to which column is in which table.

IMPORTANT {dialect} syntax requirements:
- Every derived table (subquery in FROM clause) MUST have an alias
- Use proper {dialect} syntax for subqueries
- Example: SELECT count(*) FROM (SELECT DISTINCT customer_id FROM orders) AS customer_counts;

Only use the following tables:
{table_info}

Consider the chat history below for context when answering follow up questions.";

/// Template for the answer-rephrasing call. Placeholders: `{question}`,
/// `{query}`, `{result}`.
const ANSWER_TEMPLATE: &str = "\
You are an assistant that transforms SQL query outputs into natural language answers.

Question: {question}
SQL Query: {query}
SQL Result: {result}

Provide a user-friendly, helpful answer:";

/// Builds the message list for query synthesis and delegates to the model's
/// structured-output mode.
pub struct QuerySynthesizer {
    provider: Arc<dyn LlmProvider>,
    top_k: u32,
}

impl QuerySynthesizer {
    /// Create a synthesizer with the given result-row hint
    pub fn new(provider: Arc<dyn LlmProvider>, top_k: u32) -> Self {
        Self { provider, top_k }
    }

    /// Produce a query plan for the question.
    ///
    /// `table_info` must be the live schema description, fetched fresh by
    /// the caller. Model faults and non-conforming structured output
    /// propagate uncaught.
    pub async fn synthesize(
        &self,
        question: &str,
        dialect: &str,
        table_info: &str,
        memory: &ConversationMemory,
    ) -> Result<QueryPlan> {
        let messages = build_query_messages(question, dialect, self.top_k, table_info, memory);
        self.provider.generate_query(&messages).await
    }
}

/// Rephrases a raw query result as a natural-language answer.
pub struct AnswerSynthesizer {
    provider: Arc<dyn LlmProvider>,
}

impl AnswerSynthesizer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// One free-text model call with the fixed rephrasing template.
    /// Model faults propagate uncaught.
    pub async fn rephrase(&self, question: &str, query: &str, result: &str) -> Result<String> {
        let prompt = build_answer_prompt(question, query, result);
        self.provider.complete(&[Message::user(prompt)]).await
    }
}

/// Assemble the query-synthesis message list: system instruction with
/// schema embedded, the conversation window, then the question.
fn build_query_messages(
    question: &str,
    dialect: &str,
    top_k: u32,
    table_info: &str,
    memory: &ConversationMemory,
) -> Vec<Message> {
    let system = QUERY_SYSTEM_TEMPLATE
        .replace("{dialect}", dialect)
        .replace("{top_k}", &top_k.to_string())
        .replace("{table_info}", table_info);

    let mut messages = vec![Message::system(system)];
    messages.extend(memory.as_messages());
    messages.push(Message::user(format!("Question: {}", question)));

    messages
}

/// Fill the answer-rephrasing template.
fn build_answer_prompt(question: &str, query: &str, result: &str) -> String {
    ANSWER_TEMPLATE
        .replace("{question}", question)
        .replace("{query}", query)
        .replace("{result}", result)
}
