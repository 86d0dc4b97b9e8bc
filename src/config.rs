//! # Configuration Module
//!
//! Loads run configuration from environment variables (and a `.env` file when
//! present). Command-line flags override these values in `main.rs`.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::graph::{DEFAULT_MAX_ITERATIONS, DEFAULT_SEARCH_CONCURRENCY};

/// Inference service backing the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    #[value(name = "openai")]
    OpenAI,
    Ollama,
}

impl Provider {
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4-turbo-preview",
            Provider::Ollama => "llama3.2",
        }
    }
}

/// Search engine used by the tool-execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchBackend {
    Tavily,
    #[value(name = "duckduckgo")]
    DuckDuckGo,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,

    /// Explicit model; `None` means the provider's default.
    pub model: Option<String>,

    /// Ollama server URL
    pub ollama_host: String,

    /// Presence is checked here; Rig's OpenAI client reads the variable itself.
    pub openai_api_key: Option<String>,

    /// Sampling temperature, provider default when unset
    pub temperature: Option<f64>,

    /// Loop bound: revise-triggered search rounds after the first one
    pub max_iterations: usize,

    pub search_backend: SearchBackend,
    pub tavily_api_key: Option<String>,

    /// Hits kept per query
    pub max_search_results: usize,

    /// Searches in flight within one batch
    pub search_concurrency: usize,

    /// Timeout for a whole run
    pub run_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAI,
            model: None,
            ollama_host: "http://localhost:11434".to_string(),
            openai_api_key: None,
            temperature: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            search_backend: SearchBackend::Tavily,
            tavily_api_key: None,
            max_search_results: 5,
            search_concurrency: DEFAULT_SEARCH_CONCURRENCY,
            run_timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Unset variables keep their defaults; set but unparsable ones are errors.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(val) = env::var("REFLEXION_PROVIDER") {
            config.provider = Provider::from_str(&val, true)
                .map_err(|e| anyhow::anyhow!("REFLEXION_PROVIDER: {}", e))?;
        }

        if let Ok(val) = env::var("REFLEXION_MODEL") {
            config.model = Some(val);
        }

        if let Ok(val) = env::var("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        config.openai_api_key = env::var("OPENAI_API_KEY").ok();
        config.tavily_api_key = env::var("TAVILY_API_KEY").ok();

        if let Ok(val) = env::var("TEMPERATURE") {
            config.temperature = Some(
                val.parse()
                    .context("TEMPERATURE must be a valid floating-point number (e.g., 0.7)")?,
            );
        }

        if let Ok(val) = env::var("MAX_ITERATIONS") {
            config.max_iterations = val
                .parse()
                .context("MAX_ITERATIONS must be a non-negative integer")?;
        }

        if let Ok(val) = env::var("SEARCH_BACKEND") {
            config.search_backend = SearchBackend::from_str(&val, true)
                .map_err(|e| anyhow::anyhow!("SEARCH_BACKEND: {}", e))?;
        }

        if let Ok(val) = env::var("MAX_SEARCH_RESULTS") {
            config.max_search_results = val
                .parse()
                .context("MAX_SEARCH_RESULTS must be a valid positive integer")?;
        }

        if let Ok(val) = env::var("SEARCH_CONCURRENCY") {
            config.search_concurrency = val
                .parse()
                .context("SEARCH_CONCURRENCY must be a valid positive integer")?;
        }

        if let Ok(val) = env::var("RUN_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("RUN_TIMEOUT_SECS must be a whole number of seconds")?;
            config.run_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Check ranges and credentials before any request is made.
    pub fn validate(&self) -> Result<()> {
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                anyhow::bail!(
                    "Temperature must be between 0.0 and 2.0, got: {}",
                    temperature
                );
            }
        }

        if self.model().trim().is_empty() {
            anyhow::bail!("REFLEXION_MODEL cannot be empty");
        }

        if self.max_search_results == 0 {
            anyhow::bail!("MAX_SEARCH_RESULTS must be at least 1");
        }

        if self.search_concurrency == 0 {
            anyhow::bail!("SEARCH_CONCURRENCY must be at least 1");
        }

        if self.run_timeout == Some(Duration::ZERO) {
            anyhow::bail!("RUN_TIMEOUT_SECS must be at least 1");
        }

        if self.provider == Provider::OpenAI && self.openai_api_key.is_none() {
            anyhow::bail!("OPENAI_API_KEY must be set for the openai provider");
        }

        if self.search_backend == SearchBackend::Tavily && self.tavily_api_key.is_none() {
            anyhow::bail!("TAVILY_API_KEY must be set for the tavily search backend");
        }

        Ok(())
    }
}
