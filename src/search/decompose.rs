use std::collections::HashSet;
use std::time::Duration;

use tracing::debug;

use super::parse::{json_string_array, line_items};
use super::prompts::{self, Task};
use crate::llm::{Reasoner, ReasoningError, complete_within};

#[derive(Debug, thiserror::Error)]
pub enum DecompositionError {
    #[error("decomposition call failed: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("decomposition produced no usable queries")]
    NoQueries,
}

/// Splits `prompt` into at most `max_queries` distinct search queries.
pub async fn decompose<R: Reasoner>(
    reasoner: &R,
    timeout: Duration,
    prompt: &str,
    max_queries: usize,
) -> Result<Vec<String>, DecompositionError> {
    let reply = complete_within(
        reasoner,
        timeout,
        Task::Decompose.system(),
        &prompts::decompose_user(prompt, max_queries),
    )
    .await?;

    let queries = parse_queries(&reply, max_queries);
    debug!(count = queries.len(), "prompt decomposed");
    if queries.is_empty() {
        return Err(DecompositionError::NoQueries);
    }
    Ok(queries)
}

/// JSON array first, one-per-line otherwise. Case-insensitive dedup keeps
/// the first spelling.
pub fn parse_queries(reply: &str, max_queries: usize) -> Vec<String> {
    let candidates = json_string_array(reply).unwrap_or_else(|| line_items(reply));

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
        .take(max_queries)
        .collect()
}
