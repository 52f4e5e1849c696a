use std::time::Duration;

use super::model::{SubQueryState, SubQueryStatus};
use super::prompts::{self, SynthesisSection, Task};
use super::sources::SourceList;
use crate::llm::{Reasoner, ReasoningError, complete_within};

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("report synthesis failed: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("report synthesis returned an empty report")]
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    text: String,
}

impl Report {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Paragraph-sized pieces whose concatenation is the full report.
    pub fn chunks(&self) -> impl Iterator<Item = &str> {
        self.text.split_inclusive("\n\n").filter(|c| !c.trim().is_empty())
    }
}

/// Writes the final report from summarized evidence only. Citation markers
/// that point outside `sources` are removed.
pub async fn synthesize<R: Reasoner>(
    reasoner: &R,
    timeout: Duration,
    prompt: &str,
    states: &[SubQueryState],
    sources: &SourceList,
) -> Result<Report, SynthesisError> {
    let sections: Vec<SynthesisSection<'_>> = states
        .iter()
        .map(|state| SynthesisSection {
            query: state.text(),
            status: status_label(state.status()),
            reasoning: state.reasoning(),
            evidence: state
                .evidence()
                .iter()
                .filter_map(|e| Some((sources.number_of(&e.result.source.link)?, e.text.as_str())))
                .collect(),
        })
        .collect();
    let numbered: Vec<(usize, &str, &str)> = sources
        .as_slice()
        .iter()
        .enumerate()
        .map(|(i, s)| (i + 1, s.title.as_str(), s.link.as_str()))
        .collect();

    let reply = complete_within(
        reasoner,
        timeout,
        Task::Synthesize.system(),
        &prompts::synthesize_user(prompt, &sections, &numbered),
    )
    .await?;

    let text = strip_unknown_citations(reply.trim(), sources.len());
    if text.trim().is_empty() {
        return Err(SynthesisError::Empty);
    }
    Ok(Report { text })
}

fn status_label(status: SubQueryStatus) -> &'static str {
    match status {
        SubQueryStatus::Resolved => "answered",
        SubQueryStatus::Exhausted => "partially answered (search budget exhausted)",
        SubQueryStatus::Failed => "failed (no evidence)",
        _ => "in progress",
    }
}

/// Drops `[n]` markers with `n` of 0 or beyond `count`.
fn strip_unknown_citations(text: &str, count: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if (1..=3).contains(&digits) && after[digits..].starts_with(']') {
            let n: usize = after[..digits].parse().unwrap_or(0);
            if (1..=count).contains(&n) {
                out.push_str(&rest[open..open + digits + 2]);
            } else if out.ends_with(' ') {
                out.pop();
            }
            rest = &after[digits + 1..];
        } else {
            out.push('[');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Source;
    use crate::search::model::{Evidence, SearchResult, SubQueryId};
    use crate::testing::ScriptedReasoner;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn resolved_state(link: &str, text: &str) -> SubQueryState {
        let mut state = SubQueryState::new(SubQueryId(0), "capital of France");
        let query = Arc::clone(state.current_query());
        state.transition(SubQueryStatus::Searching);
        state.transition(SubQueryStatus::Summarizing);
        state.add_evidence([Evidence {
            text: text.into(),
            result: SearchResult {
                source: Source {
                    title: "Paris".into(),
                    link: link.into(),
                    snippet: "raw snippet never shown".into(),
                },
                query,
            },
        }]);
        state.transition(SubQueryStatus::Evaluating);
        state.record_verdict(true, "named explicitly".into());
        state.transition(SubQueryStatus::Resolved);
        state
    }

    #[test]
    fn chunks_split_on_paragraphs() {
        let report = Report {
            text: "First [1].\n\nSecond.\n\n\n\nThird.".into(),
        };
        let chunks: Vec<_> = report.chunks().collect();
        assert_eq!(chunks, ["First [1].\n\n", "Second.\n\n", "Third."]);
    }

    #[test]
    fn strips_out_of_range_citations_only() {
        assert_eq!(
            strip_unknown_citations("Paris [1] has 2.1M people [3]. See [0] and [note].", 2),
            "Paris [1] has 2.1M people. See and [note]."
        );
        assert_eq!(strip_unknown_citations("Year [2024] and [", 2), "Year [2024] and [");
        assert_eq!(strip_unknown_citations("No sources [1].", 0), "No sources.");
    }

    #[tokio::test]
    async fn sees_evidence_not_raw_results() {
        let states = vec![resolved_state("https://ex.com/a", "Paris is the capital of France.")];
        let sources = SourceList::from_states(&states);
        let reasoner = ScriptedReasoner::new(|_, _| Ok("Paris is the capital [1].\n\nDone [7].".into()));

        let report = synthesize(&reasoner, TIMEOUT, "capital?", &states, &sources)
            .await
            .unwrap();

        assert_eq!(report.text(), "Paris is the capital [1].\n\nDone.");
        let call = &reasoner.calls(Task::Synthesize)[0];
        assert!(call.contains("- [1] Paris is the capital of France."));
        assert!(call.contains("Status: answered"));
        assert!(!call.contains("raw snippet never shown"));
    }

    #[tokio::test]
    async fn runs_with_zero_evidence() {
        let states = vec![SubQueryState::new(SubQueryId(0), "q")];
        let sources = SourceList::from_states(&states);
        let reasoner = ScriptedReasoner::new(|_, _| Ok("No information could be found.".into()));

        let report = synthesize(&reasoner, TIMEOUT, "p", &states, &sources).await.unwrap();

        assert_eq!(report.chunks().count(), 1);
        assert!(reasoner.calls(Task::Synthesize)[0].contains("No evidence found."));
    }

    #[tokio::test]
    async fn blank_report_is_an_error() {
        let reasoner = ScriptedReasoner::new(|_, _| Ok("   ".into()));
        let err = synthesize(&reasoner, TIMEOUT, "p", &[], &SourceList::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Empty));
    }
}
