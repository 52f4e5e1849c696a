use std::error::Error;
use std::io::Write;

use clap::{Parser, ValueEnum};
use open_search_agent::config::{ProviderKind, ReasonerKind};
use open_search_agent::search::EventSink;
use open_search_agent::{Agent, Config, ReportEvent, render};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "open-search-agent", version)]
#[command(about = "Answer a question by iterative web search and write a cited report")]
struct Cli {
    /// The question to research
    prompt: String,

    /// Search provider (duckduckgo, google, searxng, tavily, serper, brave)
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Reasoning backend (openai, gemini)
    #[arg(long)]
    backend: Option<ReasonerKind>,

    /// Model identifier for the reasoning backend
    #[arg(long)]
    model: Option<String>,

    /// Maximum number of sub-queries
    #[arg(long)]
    max_queries: Option<usize>,

    /// Maximum search attempts per sub-query
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Results requested per search
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long, value_enum, default_value_t = Format::Markdown)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Rendered report with search steps and sources
    Markdown,
    /// The aggregate result as one JSON document
    Json,
    /// Progress events, one JSON object per line, as they happen
    Ndjson,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(backend) = self.backend {
            config.reasoner = backend;
        }
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(n) = self.max_queries {
            config.engine.max_sub_queries = n;
        }
        if let Some(n) = self.max_attempts {
            config.engine.max_attempts = n;
        }
        if let Some(n) = self.limit {
            config.engine.result_limit = n;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_search_agent=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    cli.apply(&mut config);

    let agent = Agent::from_config(&config)
        .inspect_err(|e| error!("failed to start: {e}"))?;
    info!(provider = %config.provider, backend = %config.reasoner, "agent ready");

    match cli.format {
        Format::Ndjson => stream_events(&agent, cli.prompt).await,
        Format::Json | Format::Markdown => {
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());
            let outcome = agent.run(&cli.prompt, &EventSink::discard(), &cancel).await?;

            let text = match cli.format {
                Format::Json => serde_json::to_string_pretty(&outcome)? + "\n",
                _ => render::markdown(&outcome),
            };
            std::io::stdout().write_all(text.as_bytes())?;
            Ok(())
        }
    }
}

async fn stream_events(agent: &Agent, prompt: String) -> Result<(), Box<dyn Error>> {
    let mut events = agent.stream(prompt);
    cancel_on_ctrl_c(events.cancellation_token());

    let mut stdout = std::io::stdout();
    let mut fatal = None;
    while let Some(event) = events.next_event().await {
        stdout.write_all(event.to_ndjson()?.as_bytes())?;
        stdout.flush()?;
        if let ReportEvent::Error {
            message,
            fatal: true,
        } = event
        {
            fatal = Some(message);
        }
    }

    match fatal {
        Some(message) => Err(message.into()),
        None => Ok(()),
    }
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, cancelling search session");
            cancel.cancel();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_lookup(|name| match name {
            "OPENAI_MODEL" => Some("gpt-4.1".into()),
            "GEMINI_MODEL" => Some("gemini-2.5-pro".into()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn backend_flag_picks_that_backends_model() {
        let mut config = config();
        Cli::parse_from(["open-search-agent", "q", "--backend", "gemini"]).apply(&mut config);

        assert_eq!(config.reasoner, ReasonerKind::Gemini);
        assert_eq!(config.model(), Some("gemini-2.5-pro"));
    }

    #[test]
    fn flags_override_engine_knobs_and_model() {
        let mut config = config();
        Cli::parse_from([
            "open-search-agent",
            "q",
            "--model",
            "o3",
            "--max-attempts",
            "5",
            "--limit",
            "8",
            "--provider",
            "brave",
        ])
        .apply(&mut config);

        assert_eq!(config.model(), Some("o3"));
        assert_eq!(config.engine.max_attempts, 5);
        assert_eq!(config.engine.result_limit, 8);
        assert_eq!(config.provider, ProviderKind::Brave);
    }
}
