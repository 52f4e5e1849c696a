use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{ProviderError, SearchProvider, Source, finish, read_json};
use crate::config::ApiKey;

const API_URL: &str = "https://www.googleapis.com/customsearch/v1";
/// Custom Search refuses `num` above 10.
const MAX_NUM: usize = 10;

/// Google Programmable Search (Custom Search JSON API).
#[derive(Clone, Debug)]
pub struct Google {
    http: Client,
    api_key: ApiKey,
    engine_id: String,
    url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl Google {
    pub fn new(http: Client, api_key: ApiKey, engine_id: String, timeout: Duration) -> Self {
        Self {
            http,
            api_key,
            engine_id,
            url: API_URL.to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::new(http, ApiKey::new("test-key"), "test-cx".into(), Duration::from_secs(5))
        }
    }
}

impl SearchProvider for Google {
    fn name(&self) -> &'static str {
        "google"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Source>, ProviderError> {
        let num = limit.clamp(1, MAX_NUM).to_string();
        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("key", self.api_key.expose()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;

        let body: Response = read_json(response).await?;
        debug!(%query, count = body.items.len(), "google results");

        Ok(finish(
            body.items.into_iter().map(|item| Source {
                title: item.title,
                link: item.link,
                snippet: item.snippet,
            }),
            limit,
        ))
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_sends_engine_and_caps_num() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("key", "test-key"))
            .and(query_param("cx", "test-cx"))
            .and(query_param("q", "capital of France"))
            .and(query_param("num", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"title": "Paris - Wikipedia", "link": "https://en.wikipedia.org/wiki/Paris", "snippet": "Paris is the capital of France."},
                    {"title": "no link"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let google = Google::with_base_url(Client::new(), &server.uri());
        let results = google.search("capital of France", 25).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Paris - Wikipedia");
        assert_eq!(results[0].link, "https://en.wikipedia.org/wiki/Paris");
    }

    #[tokio::test]
    async fn search_without_items_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "searchInformation": {"totalResults": "0"}
            })))
            .mount(&server)
            .await;

        let google = Google::with_base_url(Client::new(), &server.uri());
        assert!(google.search("zzqx", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_403_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let google = Google::with_base_url(Client::new(), &server.uri());
        let err = google.search("q", 5).await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { code: 403, .. }), "got: {err:?}");
        assert!(!err.is_transient());
    }
}
