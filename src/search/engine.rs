//! The orchestrator: decompose, drive every sub-query to a terminal state,
//! then synthesize.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::decompose::decompose;
use super::evaluate::evaluate;
use super::events::{self, EventSink, EventStream, ReportEvent};
use super::model::{
    ResearchOutcome, SearchQuery, SearchResult, SearchSession, SessionStatus, SubQueryId,
    SubQueryState, SubQueryStatus,
};
use super::refine::refine;
use super::sources::SourceList;
use super::summarize::summarize;
use super::synthesize::{SynthesisError, synthesize};
use crate::config::{Config, ConfigError, EngineConfig, EvidencePolicy};
use crate::llm::{Reasoner, ReasoningBackend};
use crate::provider::{ProviderChain, ProviderError, SearchBackend, SearchProvider};
use crate::retry;

/// Consecutive evaluation failures that end a sub-query.
const MAX_EVALUATION_FAILURES: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("search session was cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Runs search sessions. Reasoner and provider are shared across sessions;
/// each session's state lives only inside its own `run`.
pub struct Orchestrator<R, P> {
    reasoner: Arc<R>,
    provider: Arc<P>,
    config: EngineConfig,
}

impl<R, P> Clone for Orchestrator<R, P> {
    fn clone(&self) -> Self {
        Self {
            reasoner: Arc::clone(&self.reasoner),
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
        }
    }
}

/// The orchestrator wired to real backends.
pub type Agent = Orchestrator<ReasoningBackend, ProviderChain<SearchBackend>>;

impl Agent {
    pub fn from_config(config: &Config) -> Result<Self, InitError> {
        config.validate()?;
        let http = crate::http_client()?;
        Ok(Self::from_config_with_client(config, http)?)
    }

    pub fn from_config_with_client(config: &Config, http: Client) -> Result<Self, ConfigError> {
        let reasoner = ReasoningBackend::from_config(
            config.reasoner,
            config.model().map(str::to_string),
            &config.credentials,
            http.clone(),
        )?;
        let primary = SearchBackend::from_config(
            config.provider,
            &config.credentials,
            http.clone(),
            config.engine.search_timeout,
        )?;
        let provider = ProviderChain::from_backend(primary, http, config.engine.duckduckgo_fallback);
        Self::new(Arc::new(reasoner), Arc::new(provider), config.engine.clone())
    }
}

impl<R: Reasoner, P: SearchProvider> Orchestrator<R, P> {
    pub fn new(reasoner: Arc<R>, provider: Arc<P>, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            reasoner,
            provider,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one session without streaming.
    pub async fn research(&self, prompt: &str) -> Result<ResearchOutcome, SessionError> {
        self.run(prompt, &EventSink::discard(), &CancellationToken::new())
            .await
    }

    /// Runs one session, reporting progress to `events`.
    ///
    /// The sink is sealed on return: after `search_complete` on success, or
    /// after a single fatal `error` event on failure or cancellation.
    pub async fn run(
        &self,
        prompt: &str,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<ResearchOutcome, SessionError> {
        let mut session = SearchSession::new(prompt.trim());
        let result = cancel
            .run_until_cancelled(self.run_session(&mut session, events))
            .await
            .unwrap_or(Err(SessionError::Cancelled));

        match &result {
            Ok(outcome) => info!(
                steps = outcome.search_steps.len(),
                sources = outcome.sources.len(),
                "search session complete"
            ),
            Err(e) => {
                session.fail_unfinished();
                warn!(error = %e, "search session aborted");
                events.emit_last(ReportEvent::Error {
                    message: e.to_string(),
                    fatal: true,
                });
            }
        }
        result
    }

    async fn run_session(
        &self,
        session: &mut SearchSession,
        events: &EventSink,
    ) -> Result<ResearchOutcome, SessionError> {
        if session.prompt.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }
        info!(prompt = %session.prompt, "search session started");
        events.emit(ReportEvent::SearchStart {
            prompt: session.prompt.clone(),
        });

        let queries = match decompose(
            &*self.reasoner,
            self.config.reasoning_timeout,
            &session.prompt,
            self.config.max_sub_queries,
        )
        .await
        {
            Ok(queries) => queries,
            Err(e) => {
                warn!(error = %e, "decomposition failed, searching the prompt directly");
                events.emit(ReportEvent::Error {
                    message: format!("{e}; searching the original prompt instead"),
                    fatal: false,
                });
                vec![session.prompt.clone()]
            }
        };
        events.emit(ReportEvent::DecomposedQueries {
            queries: queries.clone(),
        });

        session.sub_queries = queries
            .into_iter()
            .enumerate()
            .map(|(i, text)| SubQueryState::new(SubQueryId(i), text))
            .collect();
        session.set_status(SessionStatus::Running);

        let width = match self.config.concurrency {
            0 => session.sub_queries.len(),
            n => n,
        }
        .max(1);
        let drives: Vec<_> = session
            .sub_queries
            .iter_mut()
            .map(|state| self.drive(state, events))
            .collect();
        stream::iter(drives)
            .buffer_unordered(width)
            .collect::<Vec<()>>()
            .await;

        session.set_status(SessionStatus::Synthesizing);
        let sources = SourceList::from_states(&session.sub_queries);
        let report = synthesize(
            &*self.reasoner,
            self.config.reasoning_timeout,
            &session.prompt,
            &session.sub_queries,
            &sources,
        )
        .await?;

        for chunk in report.chunks() {
            events.emit(ReportEvent::ReportChunk {
                content: chunk.to_string(),
            });
        }
        events.emit(ReportEvent::Sources {
            sources: sources.as_slice().to_vec(),
        });
        session.set_status(SessionStatus::Complete);
        events.emit_last(ReportEvent::SearchComplete);

        Ok(ResearchOutcome {
            original_prompt: session.prompt.clone(),
            final_report: report.into_text(),
            search_steps: session.search_steps(),
            sources: sources.into_vec(),
        })
    }

    /// Runs one sub-query's attempts strictly in sequence until it reaches
    /// `Resolved`, `Exhausted` or `Failed`.
    async fn drive(&self, state: &mut SubQueryState, events: &EventSink) {
        let max_attempts = self.config.max_attempts;
        state.transition(SubQueryStatus::Searching);

        loop {
            let query = Arc::clone(state.current_query());
            info!(sub_query = %state.id, query = %query.text, attempt = query.attempt, "search attempt");
            events.emit(ReportEvent::SearchQuery {
                query: query.text.clone(),
            });

            let results = match self.search(&query).await {
                Ok(results) => results,
                Err(e) if e.is_transient() => {
                    warn!(error = %e, query = %query.text, "search retries exhausted, continuing without results");
                    events.emit(ReportEvent::Error {
                        message: format!("search for '{}' failed: {e}", query.text),
                        fatal: false,
                    });
                    Vec::new()
                }
                Err(e) => {
                    warn!(error = %e, query = %query.text, "permanent search failure");
                    events.emit(ReportEvent::Error {
                        message: format!("search for '{}' failed: {e}", query.text),
                        fatal: false,
                    });
                    state.set_reasoning(format!("search failed: {e}"));
                    state.transition(SubQueryStatus::Failed);
                    return;
                }
            };

            events.emit(ReportEvent::SearchResults {
                query: query.text.clone(),
                count: results.len(),
            });
            if results.is_empty() {
                events.emit(ReportEvent::NoResults {
                    query: query.text.clone(),
                });
            }

            state.transition(SubQueryStatus::Summarizing);
            let summary = summarize(
                &*self.reasoner,
                self.config.reasoning_timeout,
                &query.text,
                &results,
                |current, total| {
                    events.emit(ReportEvent::SummarizeProgress {
                        query: query.text.clone(),
                        current,
                        total,
                    });
                },
            )
            .await;
            for skipped in &summary.skipped {
                events.emit(ReportEvent::Error {
                    message: skipped.to_string(),
                    fatal: false,
                });
            }
            events.emit(ReportEvent::SummarizeComplete {
                query: query.text.clone(),
                count: summary.evidence.len(),
            });
            state.add_evidence(summary.evidence);

            state.transition(SubQueryStatus::Evaluating);
            let verdict = evaluate(
                &*self.reasoner,
                self.config.reasoning_timeout,
                state.text(),
                state.evidence(),
            )
            .await;
            let (hints, evaluation_failures) = match verdict {
                Ok(verdict) => {
                    state.record_verdict(verdict.sufficient, verdict.reasoning);
                    (verdict.suggested_queries, 0)
                }
                Err(e) => {
                    warn!(error = %e, query = %query.text, "evaluation failed, treating as insufficient");
                    events.emit(ReportEvent::Error {
                        message: e.to_string(),
                        fatal: false,
                    });
                    let failures = state.record_evaluation_failure(format!("evaluation failed: {e}"));
                    (Vec::new(), failures)
                }
            };
            events.emit(ReportEvent::Evaluation {
                query: query.text.clone(),
                sufficient: state.sufficient(),
                reasoning: state.reasoning().to_string(),
            });

            if state.sufficient() {
                debug!(sub_query = %state.id, attempts = state.attempts_used(), "sub-query resolved");
                state.transition(SubQueryStatus::Resolved);
                return;
            }
            if state.attempts_used() >= max_attempts || evaluation_failures >= MAX_EVALUATION_FAILURES {
                debug!(sub_query = %state.id, attempts = state.attempts_used(), "sub-query exhausted");
                state.transition(SubQueryStatus::Exhausted);
                return;
            }

            state.transition(SubQueryStatus::Refining);
            let evidence = match self.config.refine_evidence {
                EvidencePolicy::Cumulative => state.evidence(),
                EvidencePolicy::LatestAttempt => state.latest_evidence(),
            };
            let next = refine(
                &*self.reasoner,
                self.config.reasoning_timeout,
                &query,
                evidence,
                state.reasoning(),
                &hints,
            )
            .await;

            match next {
                Ok(text) if query.repeats(&text) => {
                    info!(sub_query = %state.id, %text, "refiner repeated an earlier query");
                    state.transition(SubQueryStatus::Exhausted);
                    return;
                }
                Ok(text) => {
                    debug!(sub_query = %state.id, from = %query.text, to = %text, "query refined");
                    state.advance_query(text);
                    state.transition(SubQueryStatus::Searching);
                }
                Err(e) => {
                    warn!(error = %e, query = %query.text, "refinement failed");
                    events.emit(ReportEvent::Error {
                        message: e.to_string(),
                        fatal: false,
                    });
                    state.transition(SubQueryStatus::Exhausted);
                    return;
                }
            }
        }
    }

    /// One search with per-call timeout and transient-error retries.
    async fn search(&self, query: &Arc<SearchQuery>) -> Result<Vec<SearchResult>, ProviderError> {
        let provider = &*self.provider;
        let text = query.text.as_str();
        let limit = self.config.result_limit;
        let budget = provider.timeout();

        let sources = retry::with_backoff(
            self.config.search_retries,
            self.config.backoff_base,
            ProviderError::is_transient,
            move || async move {
                tokio::time::timeout(budget, provider.search(text, limit))
                    .await
                    .unwrap_or(Err(ProviderError::Timeout(budget)))
            },
        )
        .await?;

        debug!(query = %text, count = sources.len(), "search results");
        Ok(sources
            .into_iter()
            .take(limit)
            .map(|source| SearchResult {
                source,
                query: Arc::clone(query),
            })
            .collect())
    }
}

impl<R, P> Orchestrator<R, P>
where
    R: Reasoner + 'static,
    P: SearchProvider + 'static,
{
    /// Starts a session on the runtime and returns its event stream.
    /// Dropping or cancelling the stream cancels the session.
    pub fn stream(&self, prompt: impl Into<String>) -> EventStream {
        let cancel = CancellationToken::new();
        let (sink, stream) = events::channel(cancel.clone());
        let this = self.clone();
        let prompt = prompt.into();
        tokio::spawn(async move {
            // The outcome reaches the caller as events.
            let _ = this.run(&prompt, &sink, &cancel).await;
        });
        stream
    }
}
