use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::types::{ApiError, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, gemini_text};
use super::{Reasoner, ReasoningError};
use crate::config::ApiKey;
use crate::retry;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);
const TEMPERATURE: f32 = 0.3;

#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
    backoff: Duration,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: ApiKey, model: Option<String>) -> Self {
        Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: API_BASE.to_string(),
            backoff: INITIAL_BACKOFF,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url.to_string(),
            backoff: Duration::ZERO,
        }
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String, ReasoningError> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let request = GenerateContentRequest {
            system_instruction: Content::text(None, system),
            contents: vec![Content::text(Some("user"), user)],
            generation_config: Some(GenerationConfig {
                temperature: TEMPERATURE,
            }),
        };

        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Gemini API rate limited");
            return Err(ReasoningError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_str::<GenerateContentResponse>(&text)
                && let Some(err) = &body.error
            {
                let classified = classify_api_error(err);
                warn!(error = %classified, "Gemini API error");
                return Err(classified);
            }
            warn!(status = %status, "Gemini API error (no structured body)");
            return Err(ReasoningError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {}", crate::truncate_chars(&text, 200)),
            });
        }

        let body: GenerateContentResponse = response.json().await?;
        if let Some(err) = &body.error {
            let classified = classify_api_error(err);
            warn!(error = %classified, "Gemini API error in 200 response");
            return Err(classified);
        }

        debug!(model = %self.model, "gemini completion received");
        gemini_text(&body).ok_or_else(|| {
            warn!("Gemini returned empty answer (safety filter or empty response)");
            ReasoningError::EmptyResponse
        })
    }
}

impl Reasoner for GeminiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ReasoningError> {
        retry::with_backoff(MAX_RETRIES, self.backoff, ReasoningError::is_transient, move || {
            self.generate(system, user)
        })
        .await
    }
}

fn classify_api_error(err: &ApiError) -> ReasoningError {
    let message = err
        .message
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string());

    match err.code {
        Some(429) => ReasoningError::RateLimited,
        Some(403) => ReasoningError::QuotaExhausted(message),
        Some(code) => ReasoningError::Api { code, message },
        None => ReasoningError::Api {
            code: 0,
            message: format!("Unknown error (no status code): {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_429_as_rate_limited() {
        let err = ApiError {
            code: Some(429),
            message: Some("Resource exhausted".into()),
        };
        assert!(matches!(classify_api_error(&err), ReasoningError::RateLimited));
    }

    #[test]
    fn classify_403_as_quota_exhausted() {
        let err = ApiError {
            code: Some(403),
            message: Some("Quota exceeded".into()),
        };
        assert!(matches!(
            classify_api_error(&err),
            ReasoningError::QuotaExhausted(_)
        ));
    }

    #[test]
    fn classify_missing_code_keeps_message() {
        let err = ApiError {
            code: None,
            message: Some("odd".into()),
        };
        match classify_api_error(&err) {
            ReasoningError::Api { code, message } => {
                assert_eq!(code, 0);
                assert!(message.contains("odd"));
            }
            other => panic!("expected Api error, got: {other:?}"),
        }
    }
}
