//! Explicit configuration passed into the engine at construction.
//!
//! `Config::from_env` reads the same variables the hosted agent used
//! (`SEARCH_PROVIDER`, `OPENAI_API_KEY`, `BRAVE_API_KEY`, ...) plus
//! `AGENT_*` knobs for the iteration limits.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be set when using {needed_for}")]
    Missing {
        var: &'static str,
        needed_for: String,
    },

    #[error("invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },

    #[error("unknown search provider '{0}' (expected duckduckgo, google, searxng, tavily, serper or brave)")]
    UnknownProvider(String),

    #[error("unknown reasoning backend '{0}' (expected openai or gemini)")]
    UnknownBackend(String),

    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

/// Secret string that never shows up in `Debug` output or logs.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    #[default]
    DuckDuckGo,
    Google,
    Searxng,
    Tavily,
    Serper,
    Brave,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::DuckDuckGo,
        ProviderKind::Google,
        ProviderKind::Searxng,
        ProviderKind::Tavily,
        ProviderKind::Serper,
        ProviderKind::Brave,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::DuckDuckGo => "duckduckgo",
            ProviderKind::Google => "google",
            ProviderKind::Searxng => "searxng",
            ProviderKind::Tavily => "tavily",
            ProviderKind::Serper => "serper",
            ProviderKind::Brave => "brave",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownProvider(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReasonerKind {
    #[default]
    OpenAi,
    Gemini,
}

impl fmt::Display for ReasonerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReasonerKind::OpenAi => "openai",
            ReasonerKind::Gemini => "gemini",
        })
    }
}

impl FromStr for ReasonerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ReasonerKind::OpenAi),
            "gemini" => Ok(ReasonerKind::Gemini),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

/// Which evidence the refiner sees when proposing the next query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvidencePolicy {
    /// Evidence from every attempt of the sub-query so far.
    #[default]
    Cumulative,
    /// Only the evidence produced by the attempt just evaluated.
    LatestAttempt,
}

impl FromStr for EvidencePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cumulative" | "all" => Ok(EvidencePolicy::Cumulative),
            "latest" | "latest_attempt" => Ok(EvidencePolicy::LatestAttempt),
            _ => Err(ConfigError::Invalid {
                var: "AGENT_REFINE_EVIDENCE",
                value: s.to_string(),
            }),
        }
    }
}

/// Iteration limits and per-call budgets for one orchestrator.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub max_sub_queries: usize,
    pub max_attempts: u32,
    pub result_limit: usize,
    pub search_timeout: Duration,
    pub reasoning_timeout: Duration,
    pub search_retries: u32,
    pub backoff_base: Duration,
    /// Sub-queries driven at once; 0 drives all of them together.
    pub concurrency: usize,
    pub refine_evidence: EvidencePolicy,
    pub duckduckgo_fallback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_sub_queries: 5,
            max_attempts: 3,
            result_limit: 5,
            search_timeout: Duration::from_secs(20),
            reasoning_timeout: Duration::from_secs(60),
            search_retries: 2,
            backoff_base: Duration::from_millis(500),
            concurrency: 0,
            refine_evidence: EvidencePolicy::Cumulative,
            duckduckgo_fallback: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sub_queries == 0 {
            return Err(ConfigError::Zero("max_sub_queries"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Zero("max_attempts"));
        }
        if self.result_limit == 0 {
            return Err(ConfigError::Zero("result_limit"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub openai_api_key: Option<ApiKey>,
    pub openai_base_url: Option<String>,
    pub gemini_api_key: Option<ApiKey>,
    pub google_api_key: Option<ApiKey>,
    pub google_engine_id: Option<String>,
    pub searxng_url: Option<String>,
    pub tavily_api_key: Option<ApiKey>,
    pub serper_api_key: Option<ApiKey>,
    pub brave_api_key: Option<ApiKey>,
}

/// Model identifiers from `OPENAI_MODEL` and `GEMINI_MODEL`.
#[derive(Clone, Debug, Default)]
pub struct ModelNames {
    pub openai: Option<String>,
    pub gemini: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub provider: ProviderKind,
    pub reasoner: ReasonerKind,
    /// Overrides the selected backend's model variable.
    pub model: Option<String>,
    pub models: ModelNames,
    pub credentials: Credentials,
    pub engine: EngineConfig,
}

impl Config {
    /// Model for the selected backend; `None` means the backend default.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref().or(match self.reasoner {
            ReasonerKind::OpenAi => self.models.openai.as_deref(),
            ReasonerKind::Gemini => self.models.gemini.as_deref(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let key = |name: &str| get(name).map(ApiKey::new);

        let defaults = EngineConfig::default();
        let secs = |name: &'static str, fallback: Duration| -> Result<Duration, ConfigError> {
            Ok(parse_var::<u64>(get(name), name)?
                .map(Duration::from_secs)
                .unwrap_or(fallback))
        };

        let engine = EngineConfig {
            max_sub_queries: parse_var(get("AGENT_MAX_SUB_QUERIES"), "AGENT_MAX_SUB_QUERIES")?
                .unwrap_or(defaults.max_sub_queries),
            max_attempts: parse_var(get("AGENT_MAX_ATTEMPTS"), "AGENT_MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
            result_limit: parse_var(get("AGENT_RESULT_LIMIT"), "AGENT_RESULT_LIMIT")?
                .unwrap_or(defaults.result_limit),
            search_timeout: secs("AGENT_SEARCH_TIMEOUT_SECS", defaults.search_timeout)?,
            reasoning_timeout: secs("AGENT_REASONING_TIMEOUT_SECS", defaults.reasoning_timeout)?,
            search_retries: parse_var(get("AGENT_SEARCH_RETRIES"), "AGENT_SEARCH_RETRIES")?
                .unwrap_or(defaults.search_retries),
            backoff_base: defaults.backoff_base,
            concurrency: parse_var(get("AGENT_CONCURRENCY"), "AGENT_CONCURRENCY")?
                .unwrap_or(defaults.concurrency),
            refine_evidence: get("AGENT_REFINE_EVIDENCE")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            duckduckgo_fallback: parse_bool(get("AGENT_DUCKDUCKGO_FALLBACK"), "AGENT_DUCKDUCKGO_FALLBACK")?
                .unwrap_or(defaults.duckduckgo_fallback),
        };

        let reasoner: ReasonerKind = get("REASONING_BACKEND")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();
        let config = Config {
            provider: get("SEARCH_PROVIDER")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            reasoner,
            model: None,
            models: ModelNames {
                openai: get("OPENAI_MODEL"),
                gemini: get("GEMINI_MODEL"),
            },
            credentials: Credentials {
                openai_api_key: key("OPENAI_API_KEY"),
                openai_base_url: get("OPENAI_BASE_URL"),
                gemini_api_key: key("GEMINI_API_KEY"),
                google_api_key: key("GOOGLE_SEARCH_API_KEY"),
                google_engine_id: get("GOOGLE_SEARCH_ENGINE_ID"),
                searxng_url: get("SEARXNG_URL"),
                tavily_api_key: key("TAVILY_API_KEY"),
                serper_api_key: key("SERPER_API_KEY"),
                brave_api_key: key("BRAVE_API_KEY"),
            },
            engine,
        };

        Ok(config)
    }

    /// Checks that the selected provider and backend have their credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;

        let creds = &self.credentials;
        let provider = self.provider.to_string();
        let missing = |var: &'static str, needed_for: &str| ConfigError::Missing {
            var,
            needed_for: needed_for.to_string(),
        };

        match self.provider {
            ProviderKind::DuckDuckGo => {}
            ProviderKind::Google => {
                if creds.google_api_key.is_none() {
                    return Err(missing("GOOGLE_SEARCH_API_KEY", &provider));
                }
                if creds.google_engine_id.is_none() {
                    return Err(missing("GOOGLE_SEARCH_ENGINE_ID", &provider));
                }
            }
            ProviderKind::Searxng if creds.searxng_url.is_none() => {
                return Err(missing("SEARXNG_URL", &provider));
            }
            ProviderKind::Tavily if creds.tavily_api_key.is_none() => {
                return Err(missing("TAVILY_API_KEY", &provider));
            }
            ProviderKind::Serper if creds.serper_api_key.is_none() => {
                return Err(missing("SERPER_API_KEY", &provider));
            }
            ProviderKind::Brave if creds.brave_api_key.is_none() => {
                return Err(missing("BRAVE_API_KEY", &provider));
            }
            _ => {}
        }

        match self.reasoner {
            ReasonerKind::OpenAi if creds.openai_api_key.is_none() => {
                Err(missing("OPENAI_API_KEY", "the openai backend"))
            }
            ReasonerKind::Gemini if creds.gemini_api_key.is_none() => {
                Err(missing("GEMINI_API_KEY", "the gemini backend"))
            }
            _ => Ok(()),
        }
    }
}

fn parse_var<T: FromStr>(raw: Option<String>, var: &'static str) -> Result<Option<T>, ConfigError> {
    raw.map(|value| {
        value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value })
    })
    .transpose()
}

fn parse_bool(raw: Option<String>, var: &'static str) -> Result<Option<bool>, ConfigError> {
    raw.map(|value| match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { var, value }),
    })
    .transpose()
}
