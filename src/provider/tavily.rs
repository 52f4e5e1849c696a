use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ProviderError, SearchProvider, Source, finish, read_json};
use crate::config::ApiKey;

const API_URL: &str = "https://api.tavily.com/search";

#[derive(Clone, Debug)]
pub struct Tavily {
    http: Client,
    api_key: ApiKey,
    url: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
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

impl Tavily {
    pub fn new(http: Client, api_key: ApiKey, timeout: Duration) -> Self {
        Self {
            http,
            api_key,
            url: API_URL.to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::new(http, ApiKey::new("test-key"), Duration::from_secs(5))
        }
    }
}

impl SearchProvider for Tavily {
    fn name(&self) -> &'static str {
        "tavily"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Source>, ProviderError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&Request {
                query,
                max_results: limit,
                search_depth: "basic",
            })
            .send()
            .await?;

        let body: Response = read_json(response).await?;
        debug!(%query, count = body.results.len(), "tavily results");

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
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_posts_query_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "query": "tokio runtime",
                "max_results": 4,
                "search_depth": "basic"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "tokio runtime",
                "results": [
                    {"title": "Tokio", "url": "https://tokio.rs", "content": "An asynchronous runtime", "score": 0.9}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tavily = Tavily::with_base_url(Client::new(), &server.uri());
        let results = tavily.search("tokio runtime", 4).await.unwrap();

        assert_eq!(
            results,
            vec![Source {
                title: "Tokio".into(),
                link: "https://tokio.rs".into(),
                snippet: "An asynchronous runtime".into(),
            }]
        );
    }

    #[tokio::test]
    async fn search_429_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let tavily = Tavily::with_base_url(Client::new(), &server.uri());
        let err = tavily.search("q", 4).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited));
    }
}
