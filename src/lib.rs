//! Iterative web search agent: splits a question into sub-queries, searches
//! and refines each until the evidence is sufficient, then writes a cited
//! report.

pub mod config;
pub mod llm;
pub mod provider;
pub mod render;
pub mod retry;
pub mod search;

#[cfg(test)]
mod testing;

use std::time::Duration;

use reqwest::Client;

pub use config::{Config, ConfigError, EngineConfig};
pub use search::{Agent, Orchestrator, ReportEvent, ResearchOutcome, SessionError};

pub const USER_AGENT: &str = concat!("open-search-agent/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 5;

/// The shared HTTP client every backend and provider clones.
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
}

/// Longest prefix of `s` with at most `max` chars.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("서울 날씨", 2), "서울");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
