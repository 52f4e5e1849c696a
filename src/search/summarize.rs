use std::time::Duration;

use tracing::{debug, warn};

use super::model::{Evidence, SearchResult};
use super::prompts::{self, Task};
use crate::llm::{Reasoner, ReasoningError, complete_within};

/// A result that could not be summarized after one retry. The batch goes on
/// without it.
#[derive(Debug, thiserror::Error)]
#[error("could not summarize {link}: {source}")]
pub struct SummarizationError {
    pub link: String,
    #[source]
    pub source: ReasoningError,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub evidence: Vec<Evidence>,
    pub skipped: Vec<SummarizationError>,
}

/// Summarizes each result of one attempt into evidence, in result order.
/// `on_progress(current, total)` fires after every result.
pub async fn summarize<R: Reasoner>(
    reasoner: &R,
    timeout: Duration,
    query: &str,
    results: &[SearchResult],
    mut on_progress: impl FnMut(usize, usize),
) -> Summary {
    let total = results.len();
    let mut summary = Summary::default();

    for (i, result) in results.iter().enumerate() {
        let source = &result.source;
        if source.title.trim().is_empty() && source.snippet.trim().is_empty() {
            debug!(link = %source.link, "skipping empty result");
            on_progress(i + 1, total);
            continue;
        }

        let user = prompts::summarize_user(query, &source.title, &source.link, &source.snippet);
        let system = Task::Summarize.system();
        let reply = match complete_within(reasoner, timeout, system, &user).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                debug!(error = %e, link = %source.link, "summarization failed, retrying once");
                complete_within(reasoner, timeout, system, &user).await
            }
        };

        match reply {
            Ok(reply) => {
                if let Some(text) = evidence_text(&reply) {
                    summary.evidence.push(Evidence {
                        text,
                        result: result.clone(),
                    });
                } else {
                    debug!(link = %source.link, "result judged irrelevant");
                }
            }
            Err(source_err) => {
                warn!(error = %source_err, link = %source.link, "skipping result");
                summary.skipped.push(SummarizationError {
                    link: source.link.clone(),
                    source: source_err,
                });
            }
        }
        on_progress(i + 1, total);
    }

    summary
}

/// `None` for blank replies and the `NONE` marker.
fn evidence_text(reply: &str) -> Option<String> {
    let text = reply.trim();
    let marker = text.trim_end_matches(['.', '!']).trim_matches(['"', '\'', '`']);
    if text.is_empty() || marker.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Source;
    use crate::search::model::{SearchQuery, SubQueryId};
    use crate::testing::ScriptedReasoner;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn results(query: &Arc<SearchQuery>, hits: &[(&str, &str, &str)]) -> Vec<SearchResult> {
        hits.iter()
            .map(|(title, link, snippet)| SearchResult {
                source: Source {
                    title: title.to_string(),
                    link: link.to_string(),
                    snippet: snippet.to_string(),
                },
                query: Arc::clone(query),
            })
            .collect()
    }

    #[test]
    fn none_marker_variants() {
        assert_eq!(evidence_text("NONE"), None);
        assert_eq!(evidence_text(" none. "), None);
        assert_eq!(evidence_text("\"None\""), None);
        assert_eq!(evidence_text(""), None);
        assert_eq!(
            evidence_text("None of the sources disagree: Paris.").as_deref(),
            Some("None of the sources disagree: Paris.")
        );
    }

    #[tokio::test]
    async fn evidence_traces_back_to_returned_results() {
        let query = SearchQuery::first(SubQueryId(0), "capital of France");
        let batch = results(
            &query,
            &[
                ("Paris", "https://ex.com/a", "Paris is the capital of France."),
                ("Cooking", "https://ex.com/cook", "Croissant recipes."),
                ("Paris facts", "https://ex.com/b", "Paris has 2.1 million residents."),
            ],
        );
        let reasoner = ScriptedReasoner::new(|_, user| {
            if user.contains("Croissant") {
                Ok("NONE".into())
            } else {
                Ok(format!("Evidence from: {}", user.lines().nth(3).unwrap_or_default()))
            }
        });
        let mut progress = Vec::new();

        let summary = summarize(&reasoner, TIMEOUT, &query.text, &batch, |current, total| {
            progress.push((current, total));
        })
        .await;

        assert_eq!(summary.evidence.len(), 2);
        assert!(summary.skipped.is_empty());
        for evidence in &summary.evidence {
            assert!(batch.contains(&evidence.result));
            assert!(Arc::ptr_eq(&evidence.result.query, &query));
        }
        assert_eq!(summary.evidence[1].result.source.link, "https://ex.com/b");
        assert_eq!(progress, [(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn failed_call_is_retried_once() {
        let query = SearchQuery::first(SubQueryId(0), "q");
        let batch = results(&query, &[("t", "https://ex.com/a", "s")]);
        let counter = Arc::new(AtomicU32::new(0));
        let calls = Arc::clone(&counter);
        let reasoner = ScriptedReasoner::new(move |_, _| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ReasoningError::RateLimited)
            } else {
                Ok("recovered".into())
            }
        });

        let summary = summarize(&reasoner, TIMEOUT, "q", &batch, |_, _| {}).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(summary.evidence[0].text, "recovered");
    }

    #[tokio::test]
    async fn second_failure_skips_the_result() {
        let query = SearchQuery::first(SubQueryId(0), "q");
        let batch = results(
            &query,
            &[("bad", "https://ex.com/bad", "s"), ("good", "https://ex.com/good", "s")],
        );
        let reasoner = ScriptedReasoner::new(|_, user| {
            if user.contains("ex.com/bad") {
                Err(ReasoningError::EmptyResponse)
            } else {
                Ok("fine".into())
            }
        });

        let summary = summarize(&reasoner, TIMEOUT, "q", &batch, |_, _| {}).await;

        assert_eq!(summary.evidence.len(), 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].link, "https://ex.com/bad");
        assert_eq!(reasoner.calls(Task::Summarize).len(), 3);
    }

    #[tokio::test]
    async fn empty_results_are_dropped_without_a_call() {
        let query = SearchQuery::first(SubQueryId(0), "q");
        let batch = results(&query, &[("", "https://ex.com/a", "  ")]);
        let reasoner = ScriptedReasoner::new(|_, _| Ok("should not be called".into()));

        let summary = summarize(&reasoner, TIMEOUT, "q", &batch, |_, _| {}).await;

        assert!(summary.evidence.is_empty());
        assert!(reasoner.calls(Task::Summarize).is_empty());
    }
}
