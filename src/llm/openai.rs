use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::types::{ChatMessage, ChatRequest, ChatResponse, chat_text};
use super::{Reasoner, ReasoningError};
use crate::config::ApiKey;
use crate::retry;

pub const API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "o4-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// Chat-completions client for OpenAI and API-compatible servers.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
    backoff: Duration,
}

impl OpenAiClient {
    pub fn new(http: Client, api_key: ApiKey, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| API_BASE.to_string()),
            backoff: INITIAL_BACKOFF,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            backoff: Duration::ZERO,
            ..Self::new(
                http,
                ApiKey::new("test-key"),
                Some("test-model".into()),
                Some(base_url.to_string()),
            )
        }
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, ReasoningError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ChatResponse>(&text)
                .ok()
                .and_then(|body| body.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {status}: {}", crate::truncate_chars(&text, 200)));
            let classified = classify_status(status.as_u16(), message);
            warn!(error = %classified, "OpenAI API error");
            return Err(classified);
        }

        let body: ChatResponse = response.json().await?;
        if let Some(err) = body.error {
            let message = err.message.unwrap_or_else(|| "Unknown error".into());
            warn!(kind = ?err.kind, "OpenAI API error in 200 response");
            return Err(ReasoningError::Api { code: 0, message });
        }

        debug!(model = %self.model, "openai completion received");
        chat_text(&body).ok_or(ReasoningError::EmptyResponse)
    }
}

impl Reasoner for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ReasoningError> {
        retry::with_backoff(MAX_RETRIES, self.backoff, ReasoningError::is_transient, move || {
            self.chat(system, user)
        })
        .await
    }
}

fn classify_status(code: u16, message: String) -> ReasoningError {
    match code {
        429 if message.contains("quota") => ReasoningError::QuotaExhausted(message),
        429 => ReasoningError::RateLimited,
        _ => ReasoningError::Api { code, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_quota_is_not_rate_limit() {
        let err = classify_status(429, "You exceeded your current quota".into());
        assert!(matches!(err, ReasoningError::QuotaExhausted(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn plain_429_is_rate_limited() {
        assert!(matches!(
            classify_status(429, "slow down".into()),
            ReasoningError::RateLimited
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OpenAiClient::new(
            Client::new(),
            ApiKey::new("k"),
            None,
            Some("http://localhost:8080/v1/".into()),
        );
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert_eq!(client.model, DEFAULT_MODEL);
    }
}
