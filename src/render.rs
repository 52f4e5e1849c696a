//! Markdown rendering of a finished session.

use std::fmt::Write;

use crate::search::ResearchOutcome;

/// Report text, then the search-step table, then the numbered source list
/// the report's `[n]` citations refer to.
pub fn markdown(outcome: &ResearchOutcome) -> String {
    let mut out = format!("# Research: {}\n\n", sanitize_heading(&outcome.original_prompt));
    out.push_str(outcome.final_report.trim());
    out.push_str("\n\n");

    if !outcome.search_steps.is_empty() {
        out.push_str("## Search Steps\n\n");
        out.push_str("| # | Query | Sufficient | Reasoning |\n|---|---|---|---|\n");
        for (i, step) in outcome.search_steps.iter().enumerate() {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                i + 1,
                table_cell(&step.query),
                if step.sufficient { "yes" } else { "no" },
                table_cell(&step.reasoning),
            );
        }
        out.push('\n');
    }

    if !outcome.sources.is_empty() {
        out.push_str("## Sources\n\n");
        for (i, source) in outcome.sources.iter().enumerate() {
            let title = if source.title.trim().is_empty() {
                &source.link
            } else {
                &source.title
            };
            let _ = writeln!(
                out,
                "{}. [{}]({})",
                i + 1,
                escape_md_link(title),
                escape_md_link(&source.link)
            );
        }
    }

    out
}

/// Escapes `[`, `]`, `(` and `)`, which break link syntax.
fn escape_md_link(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '[' | ']' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn sanitize_heading(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Single-line cell text with pipes escaped.
fn table_cell(s: &str) -> String {
    sanitize_heading(s.trim()).replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Source;
    use crate::search::SearchStep;

    fn outcome() -> ResearchOutcome {
        ResearchOutcome {
            original_prompt: "What is the capital of France\nand its population?".into(),
            final_report: "Paris is the capital [1].\n\nAbout 2.1 million people live there [2].\n".into(),
            search_steps: vec![
                SearchStep {
                    query: "capital of France".into(),
                    sufficient: true,
                    reasoning: "named explicitly".into(),
                },
                SearchStep {
                    query: "population | Paris".into(),
                    sufficient: false,
                    reasoning: "no figure\nyet".into(),
                },
            ],
            sources: vec![
                Source {
                    title: "Paris (city)".into(),
                    link: "https://ex.com/a".into(),
                    snippet: "s".into(),
                },
                Source {
                    title: " ".into(),
                    link: "https://ex.com/b".into(),
                    snippet: "s".into(),
                },
            ],
        }
    }

    #[test]
    fn renders_heading_report_steps_and_sources() {
        let text = markdown(&outcome());

        assert!(text.starts_with("# Research: What is the capital of France and its population?\n\n"));
        assert!(text.contains("Paris is the capital [1]."));
        assert!(text.contains("| 1 | capital of France | yes | named explicitly |"));
        assert!(text.contains(r"| 2 | population \| Paris | no | no figure yet |"));
        assert!(text.contains(r"1. [Paris \(city\)](https://ex.com/a)"));
        assert!(text.contains("2. [https://ex.com/b](https://ex.com/b)"));
    }

    #[test]
    fn omits_empty_sections() {
        let text = markdown(&ResearchOutcome {
            search_steps: Vec::new(),
            sources: Vec::new(),
            ..outcome()
        });
        assert!(!text.contains("## Search Steps"));
        assert!(!text.contains("## Sources"));
    }

    #[test]
    fn escapes_special_chars() {
        assert_eq!(escape_md_link("normal text"), "normal text");
        assert_eq!(escape_md_link("a[b]c(d)e"), r"a\[b\]c\(d\)e");
    }
}
