//! DuckDuckGo HTML backend.
//!
//! DuckDuckGo has no free web search API, so results are scraped from the
//! HTML endpoint. Titles and snippets are best-effort; URLs are what the
//! revise step needs for its References section.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{SearchError, SearchResult, WebSearch};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    max_results: usize,
}

impl DuckDuckGoSearch {
    pub fn new(max_results: usize) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            max_results,
        })
    }

    fn parse_html(&self, html: &str) -> Vec<SearchResult> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        // Result links go through a redirect carrying the target in `uddg=`.
        for segment in html.split("uddg=").skip(1) {
            if results.len() >= self.max_results {
                break;
            }
            let Some(end) = segment.find(['&', '"', '\'']) else {
                continue;
            };
            let Ok(url) = urlencoding::decode(&segment[..end]) else {
                continue;
            };
            let url = url.into_owned();
            if url.starts_with("http") && !url.contains("duckduckgo.com") && seen.insert(url.clone()) {
                results.push(SearchResult {
                    title: extract_domain(&url).unwrap_or_else(|| "Result".to_string()),
                    content: extract_snippet(segment).unwrap_or_default(),
                    url,
                    score: None,
                });
            }
        }

        results
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query)
        );
        debug!(url = %url, "Fetching search results");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::from_status(status.as_u16(), String::new()));
        }

        let body = response.text().await?;
        let results = self.parse_html(&body);
        if results.is_empty() {
            warn!(query = %query, "No search results found");
        }
        Ok(results)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

fn extract_domain(url: &str) -> Option<String> {
    url.split("//")
        .nth(1)?
        .split('/')
        .next()
        .map(|s| s.to_string())
}

/// Text of the first `result__snippet` element after a result link.
fn extract_snippet(segment: &str) -> Option<String> {
    let start = segment.find("result__snippet")?;
    let after = &segment[start..];
    let open = after.find('>')? + 1;
    let close = after[open..].find("</a>")?;
    let text = strip_tags(&after[open..open + close]);
    (!text.is_empty()).then_some(text)
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
