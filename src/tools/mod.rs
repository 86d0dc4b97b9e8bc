//! # Tools Module
//!
//! The web-search boundary used by the tool-execution step.
//!
//! Two backends implement [`WebSearch`]:
//! - [`TavilySearch`]: Tavily Search API (needs `TAVILY_API_KEY`)
//! - [`DuckDuckGoSearch`]: DuckDuckGo HTML endpoint, no key required

mod duckduckgo;
mod tavily;

pub use duckduckgo::DuckDuckGoSearch;
pub use tavily::TavilySearch;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, SearchBackend};

/// One hit returned for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    /// Relevance score in 0..=1, when the engine provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Failure of a single search invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check API key")]
    Unauthorized,

    #[error("Rate limited by search provider")]
    RateLimited,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    #[error("HTTP error ({0}): {1}")]
    Http(u16, String),

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl SearchError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Timeout
                | SearchError::Connection(_)
                | SearchError::RateLimited
                | SearchError::Server(_, _)
        )
    }

    fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => SearchError::Unauthorized,
            429 => SearchError::RateLimited,
            400 => SearchError::BadRequest(body),
            500..=599 => SearchError::Server(status, body),
            _ => SearchError::Http(status, body),
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_connect() {
            SearchError::Connection(e.to_string())
        } else if e.is_decode() {
            SearchError::Parse(e.to_string())
        } else {
            SearchError::Network(e.to_string())
        }
    }
}

/// A web search engine.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Build the configured search backend.
pub fn build_search(config: &Config) -> anyhow::Result<Arc<dyn WebSearch>> {
    let search: Arc<dyn WebSearch> = match config.search_backend {
        SearchBackend::Tavily => {
            let api_key = config
                .tavily_api_key
                .clone()
                .context("TAVILY_API_KEY is required for the tavily search backend")?;
            Arc::new(TavilySearch::new(api_key).with_max_results(config.max_search_results))
        }
        SearchBackend::DuckDuckGo => {
            Arc::new(DuckDuckGoSearch::new(config.max_search_results)?)
        }
    };
    Ok(search)
}
