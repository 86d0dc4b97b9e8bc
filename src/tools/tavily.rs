//! Tavily Search API backend.
//!
//! Transient failures (timeouts, connection errors, 429, 5xx) are retried with
//! exponential backoff. Anything else fails the query immediately.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{SearchError, SearchResult, WebSearch};

const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";

/// Default timeout for Tavily API requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum retry attempts for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Query length limit enforced by the API
const MAX_QUERY_CHARS: usize = 400;

pub struct TavilySearch {
    api_key: String,
    client: Client,
    endpoint: String,
    max_results: usize,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_results: 5,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Point at a different API endpoint (mock servers, proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    async fn execute_with_retry(
        &self,
        request: &TavilyRequest<'_>,
    ) -> Result<TavilyResponse, SearchError> {
        let mut attempt = 0;
        loop {
            match self.execute_single_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.retry_base_delay * 2u32.pow(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Tavily request failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_single_request(
        &self,
        request: &TavilyRequest<'_>,
    ) -> Result<TavilyResponse, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TavilyResponse>()
                .await
                .map_err(|e| SearchError::Parse(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(SearchError::from_status(status.as_u16(), body))
    }
}

impl std::fmt::Debug for TavilySearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilySearch")
            .field("endpoint", &self.endpoint)
            .field("max_results", &self.max_results)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    topic: &'static str,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    score: Option<f64>,
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(SearchError::BadRequest(format!(
                "query too long (max {} characters)",
                MAX_QUERY_CHARS
            )));
        }

        let request = TavilyRequest {
            query,
            max_results: self.max_results,
            search_depth: "basic",
            topic: "general",
            include_answer: false,
            include_raw_content: false,
        };

        let response = self.execute_with_retry(&request).await?;
        debug!(query = %query, count = response.results.len(), "Tavily search completed");

        Ok(response
            .results
            .into_iter()
            .take(self.max_results)
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                content: r.content,
                score: r.score,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "tavily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool_for(server: &MockServer) -> TavilySearch {
        TavilySearch::new("test-key")
            .with_endpoint(format!("{}/search", server.uri()))
            .with_retries(2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_search_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"query": "rust async", "max_results": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "rust async",
                "results": [
                    {"title": "Async Book", "url": "https://rust-lang.github.io/async-book/", "content": "Async in Rust", "score": 0.92},
                    {"title": "Tokio", "url": "https://tokio.rs", "content": "Runtime", "score": 0.81},
                    {"title": "Extra", "url": "https://extra.example", "content": "", "score": 0.1}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = tool_for(&server)
            .with_max_results(2)
            .search("rust async")
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Async Book");
        assert_eq!(results[1].url, "https://tokio.rs");
        assert_eq!(results[0].score, Some(0.92));
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = tool_for(&server).search("q").await.unwrap_err();
        assert_eq!(err, SearchError::Unauthorized);
    }

    #[tokio::test]
    async fn test_server_error_retried_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(3)
            .mount(&server)
            .await;

        let err = tool_for(&server).search("q").await.unwrap_err();
        assert!(matches!(err, SearchError::Server(503, _)));
    }

    #[tokio::test]
    async fn test_overlong_query_rejected_locally() {
        let tool = TavilySearch::new("key");
        let query = "x".repeat(MAX_QUERY_CHARS + 1);
        assert!(matches!(
            tool.search(&query).await,
            Err(SearchError::BadRequest(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires TAVILY_API_KEY environment variable
    async fn test_live_search() {
        let key = std::env::var("TAVILY_API_KEY").unwrap();
        let results = TavilySearch::new(key).search("Rust programming language").await.unwrap();
        assert!(!results.is_empty());
    }
}
