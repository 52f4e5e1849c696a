use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{ProviderError, SearchProvider, Source, finish, read_json};

/// Self-hosted SearXNG instance queried through its JSON output format.
#[derive(Clone, Debug)]
pub struct Searxng {
    http: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    results: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl Searxng {
    pub fn new(http: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

impl SearchProvider for Searxng {
    fn name(&self) -> &'static str {
        "searxng"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Source>, ProviderError> {
        let url = format!("{}/search", self.base_url);
        let count = limit.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("categories", "general"),
                ("language", "en-US"),
                ("count", count.as_str()),
            ])
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;

        let body: Response = read_json(response).await?;
        debug!(%query, count = body.results.len(), "searxng results");

        // SearXNG ignores `count`, so the cap is applied here.
        Ok(finish(
            body.results.into_iter().map(|hit| Source {
                title: hit.title,
                link: hit.url,
                snippet: hit.content,
            }),
            limit,
        ))
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_requests_json_and_truncates() {
        let server = MockServer::start().await;
        let hits: Vec<_> = (0..8)
            .map(|i| serde_json::json!({"title": format!("r{i}"), "url": format!("https://r{i}.example"), "content": "c"}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("format", "json"))
            .and(query_param("q", "rust async"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": hits})))
            .mount(&server)
            .await;

        let searxng = Searxng::new(Client::new(), &format!("{}/", server.uri()), Duration::from_secs(5));
        let results = searxng.search("rust async", 3).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].link, "https://r0.example");
        assert_eq!(results[2].title, "r2");
    }

    #[tokio::test]
    async fn search_502_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let searxng = Searxng::new(Client::new(), &server.uri(), Duration::from_secs(5));
        let err = searxng.search("q", 3).await.unwrap_err();
        assert!(err.is_transient(), "got: {err:?}");
    }

    #[tokio::test]
    async fn search_html_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>format disabled</html>"))
            .mount(&server)
            .await;

        let searxng = Searxng::new(Client::new(), &server.uri(), Duration::from_secs(5));
        let err = searxng.search("q", 3).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)), "got: {err:?}");
    }
}
