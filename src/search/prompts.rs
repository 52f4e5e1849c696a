//! System instructions and user-content builders for each reasoning task.

use std::fmt::Write;

use super::model::Evidence;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Task {
    Decompose,
    Summarize,
    Evaluate,
    Refine,
    Synthesize,
}

impl Task {
    pub const ALL: [Task; 5] = [
        Task::Decompose,
        Task::Summarize,
        Task::Evaluate,
        Task::Refine,
        Task::Synthesize,
    ];

    pub fn system(self) -> &'static str {
        match self {
            Task::Decompose => DECOMPOSE_SYSTEM,
            Task::Summarize => SUMMARIZE_SYSTEM,
            Task::Evaluate => EVALUATE_SYSTEM,
            Task::Refine => REFINE_SYSTEM,
            Task::Synthesize => SYNTHESIZE_SYSTEM,
        }
    }

    /// Identifies the task from its system instruction.
    pub fn from_system(system: &str) -> Option<Task> {
        Self::ALL.into_iter().find(|t| t.system() == system)
    }
}

const DECOMPOSE_SYSTEM: &str = "You break complex questions into simple, independent web search queries. \
Each query must target one distinct piece of information needed to answer the question. \
Reply with a JSON array of strings and nothing else.";

const SUMMARIZE_SYSTEM: &str = "You extract evidence from a single web search result. \
Write two or three sentences containing only facts from the result that help answer the query. \
If the result contains nothing relevant, reply with exactly NONE.";

const EVALUATE_SYSTEM: &str = "You judge whether collected evidence is sufficient to answer a search query. \
Reply with a JSON object: {\"sufficient\": boolean, \"reasoning\": \"short justification\", \
\"additional_queries\": [\"follow-up query\", ...]}.";

const REFINE_SYSTEM: &str = "You rewrite web search queries that did not find enough information. \
Propose one new query that is likely to find what is missing. \
It must differ from every query already tried. Reply with the query text only.";

const SYNTHESIZE_SYSTEM: &str = "You write comprehensive research reports from collected evidence. \
Use only the evidence provided. Cite sources inline as [n] using the numbered source list. \
If the evidence does not answer part of the question, say so explicitly. \
Separate paragraphs with blank lines.";

pub fn decompose_user(prompt: &str, max_queries: usize) -> String {
    format!("Break this question into at most {max_queries} search queries:\n\n{prompt}")
}

pub fn summarize_user(query: &str, title: &str, link: &str, snippet: &str) -> String {
    format!("Query: {query}\n\nResult:\nTitle: {title}\nLink: {link}\nSnippet: {snippet}")
}

pub fn evaluate_user(query: &str, evidence: &[Evidence]) -> String {
    let mut out = format!("Query: {query}\n\nEvidence:\n");
    push_evidence(&mut out, evidence);
    out.push_str("\nIs this evidence sufficient to answer the query?");
    out
}

pub fn refine_user(tried: &[&str], evidence: &[Evidence], reasoning: &str, hints: &[String]) -> String {
    let mut out = String::from("Queries already tried:\n");
    for query in tried {
        let _ = writeln!(out, "- {query}");
    }
    let _ = write!(out, "\nWhy the evidence was insufficient: {reasoning}\n\nEvidence so far:\n");
    push_evidence(&mut out, evidence);
    if !hints.is_empty() {
        out.push_str("\nSuggested follow-ups:\n");
        for hint in hints {
            let _ = writeln!(out, "- {hint}");
        }
    }
    out.push_str("\nNew query:");
    out
}

/// One section per sub-query with its verdict and evidence, followed by the
/// numbered source list the `[n]` citations refer to.
pub fn synthesize_user(prompt: &str, sections: &[SynthesisSection<'_>], sources: &[(usize, &str, &str)]) -> String {
    let mut out = format!("Question: {prompt}\n\n");
    for section in sections {
        let _ = writeln!(out, "## {}", section.query);
        let _ = writeln!(out, "Status: {}", section.status);
        if !section.reasoning.is_empty() {
            let _ = writeln!(out, "Assessment: {}", section.reasoning);
        }
        if section.evidence.is_empty() {
            out.push_str("No evidence found.\n");
        }
        for (number, text) in &section.evidence {
            let _ = writeln!(out, "- [{number}] {text}");
        }
        out.push('\n');
    }

    out.push_str("Sources:\n");
    if sources.is_empty() {
        out.push_str("(none)\n");
    }
    for (number, title, link) in sources {
        let _ = writeln!(out, "[{number}] {title} <{link}>");
    }
    out.push_str("\nWrite the report.");
    out
}

pub struct SynthesisSection<'a> {
    pub query: &'a str,
    pub status: &'a str,
    pub reasoning: &'a str,
    /// `(source number, evidence text)`.
    pub evidence: Vec<(usize, &'a str)>,
}

fn push_evidence(out: &mut String, evidence: &[Evidence]) {
    if evidence.is_empty() {
        out.push_str("(none)\n");
    }
    for (i, e) in evidence.iter().enumerate() {
        let _ = writeln!(out, "{}. {} (source: {})", i + 1, e.text, e.result.source.link);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_task_round_trips_through_system_text() {
        for task in Task::ALL {
            assert_eq!(Task::from_system(task.system()), Some(task));
        }
        assert_eq!(Task::from_system("something else"), None);
    }

    #[test]
    fn refine_user_lists_tried_queries_and_hints() {
        let text = refine_user(
            &["capital of France", "France capital"],
            &[],
            "no population figure",
            &["Paris population 2024".to_string()],
        );
        assert!(text.contains("- capital of France\n- France capital"));
        assert!(text.contains("no population figure"));
        assert!(text.contains("- Paris population 2024"));
        assert!(text.contains("(none)"));
    }

    #[test]
    fn synthesize_user_numbers_sources() {
        let sections = [SynthesisSection {
            query: "capital of France",
            status: "resolved",
            reasoning: "clear answer",
            evidence: vec![(1, "Paris is the capital.")],
        }];
        let text = synthesize_user(
            "What is the capital of France?",
            &sections,
            &[(1, "Paris", "https://ex.com/a")],
        );
        assert!(text.contains("- [1] Paris is the capital."));
        assert!(text.contains("[1] Paris <https://ex.com/a>"));
    }
}
