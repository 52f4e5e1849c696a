use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{ProviderError, SearchProvider, Source, finish, read_json};
use crate::config::ApiKey;

const API_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const MAX_COUNT: usize = 20;

#[derive(Clone, Debug)]
pub struct Brave {
    http: Client,
    api_key: ApiKey,
    url: String,
    timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct Response {
    #[serde(default)]
    web: Web,
}

#[derive(Debug, Default, Deserialize)]
struct Web {
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
    description: String,
}

impl Brave {
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

impl SearchProvider for Brave {
    fn name(&self) -> &'static str {
        "brave"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Source>, ProviderError> {
        let count = limit.clamp(1, MAX_COUNT).to_string();
        let response = self
            .http
            .get(&self.url)
            .query(&[("q", query), ("count", count.as_str())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .send()
            .await?;

        let body: Response = read_json(response).await?;
        debug!(%query, count = body.web.results.len(), "brave results");

        Ok(finish(
            body.web.results.into_iter().map(|hit| Source {
                title: hit.title,
                link: hit.url,
                snippet: hit.description,
            }),
            limit,
        ))
    }
}
