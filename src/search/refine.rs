use std::time::Duration;

use super::model::{Evidence, SearchQuery};
use super::parse::first_line;
use super::prompts::{self, Task};
use crate::llm::{Reasoner, ReasoningError, complete_within};

#[derive(Debug, thiserror::Error)]
pub enum RefinementError {
    #[error("refinement call failed: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("refiner returned no query")]
    Empty,
}

/// Proposes the next query for an insufficient one. Whether the proposal
/// repeats an earlier attempt is for the caller to decide.
pub async fn refine<R: Reasoner>(
    reasoner: &R,
    timeout: Duration,
    query: &SearchQuery,
    evidence: &[Evidence],
    reasoning: &str,
    hints: &[String],
) -> Result<String, RefinementError> {
    let mut tried: Vec<&str> = query.lineage().map(|q| q.text.as_str()).collect();
    tried.reverse();

    let reply = complete_within(
        reasoner,
        timeout,
        Task::Refine.system(),
        &prompts::refine_user(&tried, evidence, reasoning, hints),
    )
    .await?;

    first_line(&reply).ok_or(RefinementError::Empty)
}
