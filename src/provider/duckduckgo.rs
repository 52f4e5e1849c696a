//! DuckDuckGo needs no key. The Instant Answer API is tried first; when it has
//! nothing (common for long or non-encyclopedic queries) the HTML endpoint is
//! scraped instead.

use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{ProviderError, SearchProvider, Source, check_status, collapse_whitespace, finish, read_json};

const API_URL: &str = "https://api.duckduckgo.com/";
const HTML_URL: &str = "https://html.duckduckgo.com/html/";
const BROWSER_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const KOREAN_REGION: &str = "kr-kr";

#[derive(Clone, Debug)]
pub struct DuckDuckGo {
    http: Client,
    api_url: String,
    html_url: String,
    timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
    /// An object when present, but the API sends `""` when there is none.
    #[serde(rename = "Infobox", default)]
    infobox: serde_json::Value,
}

/// Either a plain topic or a named group holding more topics.
#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
    #[serde(rename = "Topics", default)]
    topics: Vec<RelatedTopic>,
}

impl DuckDuckGo {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self {
            http,
            api_url: API_URL.to_string(),
            html_url: HTML_URL.to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_urls(http: Client, api_url: &str, html_url: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            html_url: html_url.to_string(),
            ..Self::new(http, Duration::from_secs(5))
        }
    }

    async fn search_api(&self, query: &str, limit: usize) -> Result<Vec<Source>, ProviderError> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("no_redirect", "1"),
                ("t", "open-search-agent"),
            ])
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;

        let answer: InstantAnswer = read_json(response).await?;
        Ok(instant_answer_sources(answer, limit))
    }

    async fn search_html(
        &self,
        query: &str,
        limit: usize,
        region: Option<&str>,
    ) -> Result<Vec<Source>, ProviderError> {
        let mut request = self
            .http
            .get(&self.html_url)
            .query(&[("q", query)])
            .header("User-Agent", BROWSER_UA);
        if let Some(region) = region {
            request = request
                .query(&[("kl", region)])
                .header("Accept-Language", "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7");
        }

        let response = check_status(request.send().await?).await?;
        let html = response.text().await?;
        let results = parse_html_results(&html, limit);
        debug!(%query, count = results.len(), "duckduckgo html results");
        Ok(results)
    }
}

impl SearchProvider for DuckDuckGo {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Source>, ProviderError> {
        if contains_hangul(query) {
            debug!(%query, "hangul query, using html endpoint");
            return self.search_html(query, limit, Some(KOREAN_REGION)).await;
        }

        match self.search_api(query, limit).await {
            Ok(results) if !results.is_empty() => {
                debug!(%query, count = results.len(), "duckduckgo instant answer results");
                Ok(results)
            }
            Ok(_) => self.search_html(query, limit, None).await,
            Err(e) => {
                warn!(error = %e, "instant answer API failed, trying html endpoint");
                self.search_html(query, limit, None).await
            }
        }
    }
}

pub(crate) fn contains_hangul(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{1100}'..='\u{11FF}' |
            '\u{3131}'..='\u{318F}' |
            '\u{AC00}'..='\u{D7A3}'
        )
    })
}

fn instant_answer_sources(answer: InstantAnswer, limit: usize) -> Vec<Source> {
    let mut hits = Vec::new();

    if !answer.abstract_text.is_empty() && !answer.abstract_url.is_empty() {
        hits.push(Source {
            title: answer.heading,
            link: answer.abstract_url,
            snippet: answer.abstract_text,
        });
    }

    let mut topics = Vec::new();
    flatten_topics(answer.related_topics, &mut topics);
    for topic in topics {
        if topic.text.is_empty() || topic.first_url.is_empty() {
            continue;
        }
        let title = topic
            .text
            .split_once(" - ")
            .map_or(topic.text.as_str(), |(head, _)| head)
            .to_string();
        hits.push(Source {
            title,
            link: topic.first_url,
            snippet: topic.text,
        });
    }

    if hits.len() < limit
        && let Some(content) = answer.infobox.get("content").and_then(|c| c.as_array())
    {
        for entry in content {
            let field = |name: &str| entry.get(name).and_then(|v| v.as_str()).unwrap_or_default();
            if field("data_type") != "link" || field("value").is_empty() || field("label").is_empty() {
                continue;
            }
            hits.push(Source {
                title: field("label").to_string(),
                link: field("value").to_string(),
                snippet: field("label").to_string(),
            });
        }
    }

    finish(hits, limit)
}

fn flatten_topics(topics: Vec<RelatedTopic>, out: &mut Vec<RelatedTopic>) {
    for mut topic in topics {
        let nested = std::mem::take(&mut topic.topics);
        if nested.is_empty() {
            out.push(topic);
        } else {
            flatten_topics(nested, out);
        }
    }
}

fn parse_html_results(html: &str, limit: usize) -> Vec<Source> {
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let hits = document
        .select(&result_sel)
        .filter(|block| !block.value().classes().any(|c| c == "result--ad"))
        .filter_map(|block| {
            let anchor = block.select(&title_sel).next()?;
            let link = resolve_link(anchor.value().attr("href")?)?;
            let snippet = block
                .select(&snippet_sel)
                .next()
                .map(element_text)
                .unwrap_or_default();
            Some(Source {
                title: element_text(anchor),
                link,
                snippet,
            })
        })
        .filter(|s| !s.title.is_empty());

    finish(hits, limit)
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Turns a result href into the target URL, unwrapping `/l/?uddg=` redirects.
/// Other DuckDuckGo-internal links (ads, tracking) yield `None`.
fn resolve_link(href: &str) -> Option<String> {
    let href = href.trim();
    let absolute = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };

    let url = Url::parse(&absolute).ok()?;
    if url.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) {
        if !url.path().starts_with("/l/") {
            return None;
        }
        return url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }

    matches!(url.scheme(), "http" | "https").then_some(absolute)
}
