use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ProviderError, SearchProvider, Source, finish, read_json};
use crate::config::ApiKey;

const API_URL: &str = "https://google.serper.dev/search";

/// serper.dev Google results proxy.
#[derive(Clone, Debug)]
pub struct Serper {
    http: Client,
    api_key: ApiKey,
    url: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    organic: Vec<Organic>,
}

#[derive(Debug, Deserialize)]
struct Organic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl Serper {
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

impl SearchProvider for Serper {
    fn name(&self) -> &'static str {
        "serper"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Source>, ProviderError> {
        let response = self
            .http
            .post(&self.url)
            .header("X-API-KEY", self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&Request { q: query, num: limit })
            .send()
            .await?;

        let body: Response = read_json(response).await?;
        debug!(%query, count = body.organic.len(), "serper results");

        Ok(finish(
            body.organic.into_iter().map(|hit| Source {
                title: hit.title,
                link: hit.link,
                snippet: hit.snippet,
            }),
            limit,
        ))
    }
}
