//! Reasoning backends: the opaque `complete(system, user) -> text` capability.

pub mod gemini;
pub mod openai;
pub mod types;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;

use crate::config::{ConfigError, Credentials, ReasonerKind};

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("API quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("reasoning call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("model returned an empty response")]
    EmptyResponse,
}

impl ReasoningError {
    /// Rate limits, 5xx and connection-level failures. A call-level timeout is terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            ReasoningError::RateLimited => true,
            ReasoningError::Api { code, .. } => (500..=599).contains(code),
            ReasoningError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// A language model reached through one system instruction and one user message.
/// Implemented by the HTTP clients in this module; scripted fakes are used in tests.
pub trait Reasoner: Send + Sync {
    fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = Result<String, ReasoningError>> + Send;
}

/// Runs one reasoning call under `timeout`.
pub async fn complete_within<R: Reasoner>(
    reasoner: &R,
    timeout: Duration,
    system: &str,
    user: &str,
) -> Result<String, ReasoningError> {
    tokio::time::timeout(timeout, reasoner.complete(system, user))
        .await
        .unwrap_or(Err(ReasoningError::Timeout(timeout)))
}

/// Runtime-selected reasoning backend.
#[derive(Clone, Debug)]
pub enum ReasoningBackend {
    OpenAi(OpenAiClient),
    Gemini(GeminiClient),
}

impl ReasoningBackend {
    pub fn from_config(
        kind: ReasonerKind,
        model: Option<String>,
        creds: &Credentials,
        http: Client,
    ) -> Result<Self, ConfigError> {
        let missing = |var| ConfigError::Missing {
            var,
            needed_for: format!("the {kind} backend"),
        };
        match kind {
            ReasonerKind::OpenAi => {
                let key = creds.openai_api_key.clone().ok_or_else(|| missing("OPENAI_API_KEY"))?;
                Ok(ReasoningBackend::OpenAi(OpenAiClient::new(
                    http,
                    key,
                    model,
                    creds.openai_base_url.clone(),
                )))
            }
            ReasonerKind::Gemini => {
                let key = creds.gemini_api_key.clone().ok_or_else(|| missing("GEMINI_API_KEY"))?;
                Ok(ReasoningBackend::Gemini(GeminiClient::new(http, key, model)))
            }
        }
    }

    pub fn kind(&self) -> ReasonerKind {
        match self {
            ReasoningBackend::OpenAi(_) => ReasonerKind::OpenAi,
            ReasoningBackend::Gemini(_) => ReasonerKind::Gemini,
        }
    }
}

impl Reasoner for ReasoningBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ReasoningError> {
        match self {
            ReasoningBackend::OpenAi(client) => client.complete(system, user).await,
            ReasoningBackend::Gemini(client) => client.complete(system, user).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    impl Reasoner for Stalled {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ReasoningError> {
            std::future::pending().await
        }
    }

    #[test]
    fn transient_classification() {
        assert!(ReasoningError::RateLimited.is_transient());
        assert!(
            ReasoningError::Api {
                code: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !ReasoningError::Api {
                code: 400,
                message: "bad request".into()
            }
            .is_transient()
        );
        assert!(!ReasoningError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!ReasoningError::EmptyResponse.is_transient());
    }

    #[test]
    fn backend_requires_its_own_key() {
        let http = Client::new();
        let creds = Credentials {
            gemini_api_key: Some(crate::config::ApiKey::new("g")),
            ..Credentials::default()
        };

        let err = ReasoningBackend::from_config(ReasonerKind::OpenAi, None, &creds, http.clone()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { var: "OPENAI_API_KEY", .. }));

        let backend = ReasoningBackend::from_config(ReasonerKind::Gemini, None, &creds, http).unwrap();
        assert_eq!(backend.kind(), ReasonerKind::Gemini);
    }

    #[tokio::test(start_paused = true)]
    async fn complete_within_times_out() {
        let result = complete_within(&Stalled, Duration::from_secs(5), "s", "u").await;
        assert!(matches!(result, Err(ReasoningError::Timeout(d)) if d == Duration::from_secs(5)));
    }
}
