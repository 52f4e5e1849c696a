//! Lenient extraction of structured data from model replies.

use serde::de::DeserializeOwned;

/// Parses the outermost `[...]` in `text` as a list of strings. Non-string
/// elements are skipped.
pub fn json_string_array(text: &str) -> Option<Vec<String>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    let values: Vec<serde_json::Value> = serde_json::from_str(&text[start..=end]).ok()?;
    Some(
        values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
    )
}

/// Parses the outermost `{...}` in `text`.
pub fn json_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// One item per line with bullets, enumerators and quotes removed. Preamble
/// lines ("Here are...", headings, lines ending in ':') and code fences are
/// skipped.
pub fn line_items(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```"))
        .filter(|line| !is_preamble(line))
        .map(clean_line)
        .filter(|item| !item.is_empty())
        .collect()
}

/// First usable line of a single-answer reply, e.g. a refined query.
pub fn first_line(text: &str) -> Option<String> {
    line_items(text).into_iter().next()
}

fn is_preamble(line: &str) -> bool {
    line.starts_with('#') || line.ends_with(':') || line.starts_with("Here ") || line.starts_with("Here's")
}

fn clean_line(line: &str) -> String {
    let mut rest = line.trim_start_matches(['-', '*', '•']).trim_start();

    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 && rest[digits..].starts_with(['.', ')']) {
        rest = rest[digits + 1..].trim_start();
    }

    for label in ["New query:", "Refined query:", "Query:"] {
        if let Some(stripped) = strip_prefix_ignore_case(rest, label) {
            rest = stripped.trim_start();
            break;
        }
    }

    rest.trim()
        .trim_matches(['"', '\'', '`', '“', '”'])
        .trim()
        .to_string()
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn array_inside_prose_and_fence() {
        let reply = "Sure:\n```json\n[\"capital of France\", \"population of Paris\", 3]\n```";
        assert_eq!(
            json_string_array(reply).unwrap(),
            ["capital of France", "population of Paris"]
        );
    }

    #[test]
    fn array_missing_or_broken() {
        assert!(json_string_array("no brackets here").is_none());
        assert!(json_string_array("] backwards [").is_none());
        assert!(json_string_array("[\"unterminated]").is_none());
    }

    #[test]
    fn object_inside_prose() {
        #[derive(Deserialize)]
        struct Verdict {
            sufficient: bool,
        }
        let reply = "Here is my verdict: {\"sufficient\": true, \"reasoning\": \"ok\"} Thanks.";
        assert!(json_object::<Verdict>(reply).unwrap().sufficient);
        assert!(json_object::<Verdict>("{\"reasoning\": \"missing\"}").is_none());
    }

    #[test]
    fn line_items_strip_bullets_and_numbers() {
        let reply = "Here are some queries:\n1. capital of France\n2) \"population of Paris\"\n- Paris area km2\n* Query: Paris mayor\n\n## Notes";
        assert_eq!(
            line_items(reply),
            [
                "capital of France",
                "population of Paris",
                "Paris area km2",
                "Paris mayor"
            ]
        );
    }

    #[test]
    fn numbers_inside_queries_survive() {
        assert_eq!(line_items("2024 Paris population"), ["2024 Paris population"]);
    }

    #[test]
    fn first_line_strips_label_and_quotes() {
        assert_eq!(
            first_line("New query: \"Paris population 2024\"\nbecause...").as_deref(),
            Some("Paris population 2024")
        );
        assert_eq!(first_line("   \n\n"), None);
    }

    #[test]
    fn non_ascii_lines_are_safe() {
        assert_eq!(line_items("• 서울 인구"), ["서울 인구"]);
        assert_eq!(first_line("é").as_deref(), Some("é"));
    }
}
