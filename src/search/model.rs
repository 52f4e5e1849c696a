//! Session data: queries, results, evidence and the per-sub-query state
//! machine. Only the orchestrator mutates these.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::provider::Source;

/// Position of a sub-query in the decomposed list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubQueryId(pub usize);

impl fmt::Display for SubQueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// One issued query. Refinement links a new query to the one it replaces
/// instead of mutating it.
#[derive(Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub origin: SubQueryId,
    /// 1-based.
    pub attempt: u32,
    pub previous: Option<Arc<SearchQuery>>,
}

impl SearchQuery {
    pub fn first(origin: SubQueryId, text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            text: text.into(),
            origin,
            attempt: 1,
            previous: None,
        })
    }

    pub fn refine(self: &Arc<Self>, text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            text: text.into(),
            origin: self.origin,
            attempt: self.attempt + 1,
            previous: Some(Arc::clone(self)),
        })
    }

    /// This query followed by every query it replaced, newest first.
    pub fn lineage(&self) -> impl Iterator<Item = &SearchQuery> {
        std::iter::successors(Some(self), |q| q.previous.as_deref())
    }

    /// The decomposed sub-query this lineage started from.
    pub fn root(&self) -> &SearchQuery {
        self.lineage().last().unwrap_or(self)
    }

    /// Whether `text` matches this query or any earlier one, ignoring case
    /// and surrounding whitespace.
    pub fn repeats(&self, text: &str) -> bool {
        let wanted = text.trim().to_lowercase();
        self.lineage().any(|q| q.text.trim().to_lowercase() == wanted)
    }
}

/// A provider hit tagged with the query that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub source: Source,
    pub query: Arc<SearchQuery>,
}

/// Summarized content from exactly one search result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evidence {
    pub text: String,
    pub result: SearchResult,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubQueryStatus {
    Pending,
    Searching,
    Summarizing,
    Evaluating,
    Refining,
    Resolved,
    Exhausted,
    Failed,
}

impl SubQueryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubQueryStatus::Resolved | SubQueryStatus::Exhausted | SubQueryStatus::Failed
        )
    }

    pub fn can_transition_to(self, next: SubQueryStatus) -> bool {
        use SubQueryStatus::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, Searching)
            | (Searching, Summarizing)
            | (Summarizing, Evaluating)
            | (Evaluating, Resolved | Refining | Exhausted)
            | (Refining, Searching | Exhausted) => true,
            _ => false,
        }
    }
}

/// One evaluator verdict, as reported in the aggregate result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStep {
    pub query: String,
    pub sufficient: bool,
    pub reasoning: String,
}

#[derive(Debug)]
pub struct SubQueryState {
    pub id: SubQueryId,
    current: Arc<SearchQuery>,
    evidence: Vec<Evidence>,
    attempts_used: u32,
    sufficient: bool,
    reasoning: String,
    status: SubQueryStatus,
    steps: Vec<SearchStep>,
    evaluation_failures: u32,
}

impl SubQueryState {
    pub fn new(id: SubQueryId, text: impl Into<String>) -> Self {
        Self {
            id,
            current: SearchQuery::first(id, text),
            evidence: Vec::new(),
            attempts_used: 0,
            sufficient: false,
            reasoning: String::new(),
            status: SubQueryStatus::Pending,
            steps: Vec::new(),
            evaluation_failures: 0,
        }
    }

    /// The sub-query being answered, independent of refinement.
    pub fn text(&self) -> &str {
        &self.current.root().text
    }

    pub fn current_query(&self) -> &Arc<SearchQuery> {
        &self.current
    }

    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    /// Evidence gathered by the current attempt only.
    pub fn latest_evidence(&self) -> &[Evidence] {
        let attempt = self.current.attempt;
        let start = self
            .evidence
            .iter()
            .position(|e| e.result.query.attempt == attempt)
            .unwrap_or(self.evidence.len());
        &self.evidence[start..]
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    pub fn sufficient(&self) -> bool {
        self.sufficient
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn status(&self) -> SubQueryStatus {
        self.status
    }

    pub fn steps(&self) -> &[SearchStep] {
        &self.steps
    }

    pub(crate) fn transition(&mut self, next: SubQueryStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "illegal sub-query transition {:?} -> {next:?}",
            self.status
        );
        if next == SubQueryStatus::Searching {
            self.attempts_used += 1;
        }
        self.status = next;
    }

    pub(crate) fn add_evidence(&mut self, evidence: impl IntoIterator<Item = Evidence>) {
        self.evidence.extend(evidence);
    }

    /// Records an evaluator verdict. Only evaluator output may set
    /// `sufficient`.
    pub(crate) fn record_verdict(&mut self, sufficient: bool, reasoning: String) {
        self.evaluation_failures = 0;
        self.push_step(sufficient, reasoning);
    }

    /// Records a failed evaluation as an insufficient step and returns the
    /// number of consecutive failures.
    pub(crate) fn record_evaluation_failure(&mut self, reasoning: String) -> u32 {
        self.evaluation_failures += 1;
        self.push_step(false, reasoning);
        self.evaluation_failures
    }

    fn push_step(&mut self, sufficient: bool, reasoning: String) {
        self.sufficient = sufficient;
        self.steps.push(SearchStep {
            query: self.current.text.clone(),
            sufficient,
            reasoning: reasoning.clone(),
        });
        self.reasoning = reasoning;
    }

    pub(crate) fn set_reasoning(&mut self, reasoning: String) {
        self.reasoning = reasoning;
    }

    pub(crate) fn advance_query(&mut self, text: String) {
        self.current = self.current.refine(text);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Decomposing,
    Running,
    Synthesizing,
    Complete,
    Failed,
}

/// Root aggregate for one run; dropped once the report is delivered.
#[derive(Debug)]
pub struct SearchSession {
    pub prompt: String,
    pub sub_queries: Vec<SubQueryState>,
    pub started_at: SystemTime,
    status: SessionStatus,
}

impl SearchSession {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            sub_queries: Vec::new(),
            started_at: SystemTime::now(),
            status: SessionStatus::Decomposing,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn all_terminal(&self) -> bool {
        self.sub_queries.iter().all(|s| s.status().is_terminal())
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        debug_assert!(
            status != SessionStatus::Complete || self.all_terminal(),
            "session completed with non-terminal sub-queries"
        );
        self.status = status;
    }

    /// Moves every unfinished sub-query to `Failed`.
    pub(crate) fn fail_unfinished(&mut self) {
        for state in &mut self.sub_queries {
            if !state.status().is_terminal() {
                state.transition(SubQueryStatus::Failed);
            }
        }
        self.status = SessionStatus::Failed;
    }

    pub fn search_steps(&self) -> Vec<SearchStep> {
        self.sub_queries
            .iter()
            .flat_map(|s| s.steps().iter().cloned())
            .collect()
    }
}

/// Non-streaming result of one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub original_prompt: String,
    pub final_report: String,
    pub search_steps: Vec<SearchStep>,
    pub sources: Vec<Source>,
}
