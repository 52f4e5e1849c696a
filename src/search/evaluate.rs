use std::time::Duration;

use serde::Deserialize;

use super::model::Evidence;
use super::parse::json_object;
use super::prompts::{self, Task};
use crate::llm::{Reasoner, ReasoningError, complete_within};

const NO_EVIDENCE: &str = "No evidence has been gathered for this query yet.";

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("evaluation call failed: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("unparseable evaluation verdict: {0}")]
    Unparseable(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Verdict {
    pub sufficient: bool,
    #[serde(default)]
    pub reasoning: String,
    /// Follow-up queries the evaluator proposes; passed to the refiner.
    #[serde(default, rename = "additional_queries", alias = "suggested_queries")]
    pub suggested_queries: Vec<String>,
}

/// Judges whether the cumulative `evidence` answers `query`.
///
/// With no evidence at all the answer is known without a call.
pub async fn evaluate<R: Reasoner>(
    reasoner: &R,
    timeout: Duration,
    query: &str,
    evidence: &[Evidence],
) -> Result<Verdict, EvaluationError> {
    if evidence.is_empty() {
        return Ok(Verdict {
            sufficient: false,
            reasoning: NO_EVIDENCE.to_string(),
            suggested_queries: Vec::new(),
        });
    }

    let reply = complete_within(
        reasoner,
        timeout,
        Task::Evaluate.system(),
        &prompts::evaluate_user(query, evidence),
    )
    .await?;

    parse_verdict(&reply)
}

fn parse_verdict(reply: &str) -> Result<Verdict, EvaluationError> {
    let mut verdict: Verdict = json_object(reply)
        .ok_or_else(|| EvaluationError::Unparseable(crate::truncate_chars(reply.trim(), 200).to_string()))?;
    verdict.reasoning = verdict.reasoning.trim().to_string();
    verdict.suggested_queries.retain(|q| !q.trim().is_empty());
    Ok(verdict)
}
