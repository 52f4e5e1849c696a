//! Search backends. Each variant runs one text query and returns ranked
//! `(title, link, snippet)` triples; the engine never sees vendor formats.

pub mod brave;
pub mod duckduckgo;
pub mod google;
pub mod searxng;
pub mod serper;
pub mod tavily;

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ConfigError, Credentials, ProviderKind};

pub use brave::Brave;
pub use duckduckgo::DuckDuckGo;
pub use google::Google;
pub use searxng::Searxng;
pub use serper::Serper;
pub use tavily::Tavily;

/// One ranked hit as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("search timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("search API rate limit exceeded")]
    RateLimited,

    #[error("search API error ({code}): {message}")]
    Status { code: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected search response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Timeouts, 408/429, 5xx and connection failures are worth another try.
    /// Other 4xx and undecodable bodies are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout(_) | ProviderError::RateLimited => true,
            ProviderError::Status { code, .. } => *code == 408 || (500..=599).contains(code),
            ProviderError::Network(e) => !(e.is_decode() || e.is_builder() || e.is_redirect()),
            ProviderError::Decode(_) => false,
        }
    }
}

/// Executes one query against one search backend.
///
/// Contract: at most `limit` results, provider-ranked order, and an empty
/// vector (not an error) when nothing matched.
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Budget for one `search` call, enforced by the caller.
    fn timeout(&self) -> Duration;

    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Source>, ProviderError>> + Send;
}

/// Runtime-selected provider variant.
#[derive(Clone, Debug)]
pub enum SearchBackend {
    DuckDuckGo(DuckDuckGo),
    Google(Google),
    Searxng(Searxng),
    Tavily(Tavily),
    Serper(Serper),
    Brave(Brave),
}

impl SearchBackend {
    pub fn from_config(
        kind: ProviderKind,
        creds: &Credentials,
        http: Client,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let missing = |var: &'static str| ConfigError::Missing {
            var,
            needed_for: kind.to_string(),
        };
        Ok(match kind {
            ProviderKind::DuckDuckGo => SearchBackend::DuckDuckGo(DuckDuckGo::new(http, timeout)),
            ProviderKind::Google => SearchBackend::Google(Google::new(
                http,
                creds.google_api_key.clone().ok_or_else(|| missing("GOOGLE_SEARCH_API_KEY"))?,
                creds.google_engine_id.clone().ok_or_else(|| missing("GOOGLE_SEARCH_ENGINE_ID"))?,
                timeout,
            )),
            ProviderKind::Searxng => SearchBackend::Searxng(Searxng::new(
                http,
                creds.searxng_url.as_deref().ok_or_else(|| missing("SEARXNG_URL"))?,
                timeout,
            )),
            ProviderKind::Tavily => SearchBackend::Tavily(Tavily::new(
                http,
                creds.tavily_api_key.clone().ok_or_else(|| missing("TAVILY_API_KEY"))?,
                timeout,
            )),
            ProviderKind::Serper => SearchBackend::Serper(Serper::new(
                http,
                creds.serper_api_key.clone().ok_or_else(|| missing("SERPER_API_KEY"))?,
                timeout,
            )),
            ProviderKind::Brave => SearchBackend::Brave(Brave::new(
                http,
                creds.brave_api_key.clone().ok_or_else(|| missing("BRAVE_API_KEY"))?,
                timeout,
            )),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            SearchBackend::DuckDuckGo(_) => ProviderKind::DuckDuckGo,
            SearchBackend::Google(_) => ProviderKind::Google,
            SearchBackend::Searxng(_) => ProviderKind::Searxng,
            SearchBackend::Tavily(_) => ProviderKind::Tavily,
            SearchBackend::Serper(_) => ProviderKind::Serper,
            SearchBackend::Brave(_) => ProviderKind::Brave,
        }
    }
}

impl SearchProvider for SearchBackend {
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn timeout(&self) -> Duration {
        match self {
            SearchBackend::DuckDuckGo(p) => p.timeout(),
            SearchBackend::Google(p) => p.timeout(),
            SearchBackend::Searxng(p) => p.timeout(),
            SearchBackend::Tavily(p) => p.timeout(),
            SearchBackend::Serper(p) => p.timeout(),
            SearchBackend::Brave(p) => p.timeout(),
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Source>, ProviderError> {
        match self {
            SearchBackend::DuckDuckGo(p) => p.search(query, limit).await,
            SearchBackend::Google(p) => p.search(query, limit).await,
            SearchBackend::Searxng(p) => p.search(query, limit).await,
            SearchBackend::Tavily(p) => p.search(query, limit).await,
            SearchBackend::Serper(p) => p.search(query, limit).await,
            SearchBackend::Brave(p) => p.search(query, limit).await,
        }
    }
}

/// Primary provider with an optional DuckDuckGo retry when the primary
/// finds nothing.
#[derive(Clone, Debug)]
pub struct ProviderChain<P> {
    primary: P,
    fallback: Option<DuckDuckGo>,
}

impl<P: SearchProvider> ProviderChain<P> {
    pub fn new(primary: P, fallback: Option<DuckDuckGo>) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }
}

impl ProviderChain<SearchBackend> {
    /// Wires the DuckDuckGo fallback only when enabled and the primary is not
    /// DuckDuckGo already.
    pub fn from_backend(primary: SearchBackend, http: Client, fallback_enabled: bool) -> Self {
        let fallback = (fallback_enabled && primary.kind() != ProviderKind::DuckDuckGo)
            .then(|| DuckDuckGo::new(http, primary.timeout()));
        Self::new(primary, fallback)
    }
}

impl<P: SearchProvider> SearchProvider for ProviderChain<P> {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    fn timeout(&self) -> Duration {
        self.primary.timeout() + self.fallback.as_ref().map_or(Duration::ZERO, |f| f.timeout())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Source>, ProviderError> {
        let results = self.primary.search(query, limit).await?;
        if !results.is_empty() {
            return Ok(results);
        }
        let Some(fallback) = &self.fallback else {
            return Ok(results);
        };

        info!(provider = self.primary.name(), %query, "no results, trying duckduckgo");
        match fallback.search(query, limit).await {
            Ok(results) => Ok(results),
            Err(e) => {
                warn!(error = %e, "duckduckgo fallback failed");
                Ok(Vec::new())
            }
        }
    }
}

/// Maps non-2xx responses onto `ProviderError`.
pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!(url = %response.url(), "search API rate limited");
        return Err(ProviderError::RateLimited);
    }
    let text = response.text().await.unwrap_or_default();
    warn!(status = %status, "search API error");
    Err(ProviderError::Status {
        code: status.as_u16(),
        message: crate::truncate_chars(text.trim(), 200).to_string(),
    })
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Drops hits without a link, normalizes whitespace, and caps at `limit`.
pub(crate) fn finish(hits: impl IntoIterator<Item = Source>, limit: usize) -> Vec<Source> {
    hits.into_iter()
        .map(|s| Source {
            title: collapse_whitespace(&s.title),
            link: s.link.trim().to_string(),
            snippet: collapse_whitespace(&s.snippet),
        })
        .filter(|s| !s.link.is_empty())
        .take(limit)
        .collect()
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
