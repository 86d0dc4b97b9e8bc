//! # Correlator Module
//!
//! The tool-execution step: turns the search queries of the latest model
//! message into one tool result per tool-call id.
//!
//! Every search invocation carries its `(tool_call_id, query)` key from
//! dispatch to completion, so results are grouped by key and never by
//! position. Invocations of one batch run concurrently (bounded), and the
//! step returns only after all of them have finished.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conversation::{Conversation, Message};
use crate::error::ReflexionError;
use crate::schema;
use crate::tools::{SearchResult, WebSearch};

/// What one query produced. A failed search is recorded, not raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Ok { results: Vec<SearchResult> },
    SearchFailed { query: String, reason: String },
}

impl QueryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, QueryOutcome::SearchFailed { .. })
    }
}

/// Content of one tool result: query to outcome, ordered by query.
pub type ResultMapping = BTreeMap<String, QueryOutcome>;

struct Invocation {
    call_index: usize,
    query: String,
}

/// Executes the searches requested by a model turn.
pub struct Correlator {
    search: Arc<dyn WebSearch>,
    concurrency: usize,
}

impl Correlator {
    pub fn new(search: Arc<dyn WebSearch>, concurrency: usize) -> Self {
        Self {
            search,
            concurrency: concurrency.max(1),
        }
    }

    /// Maximum number of searches in flight within one batch.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run the searches for the conversation's last message.
    ///
    /// The last message must be a model message. One tool result is returned
    /// per tool call, in tool-call order, with the call id as correlation id;
    /// a call that requested no queries gets an empty mapping. A model message
    /// without tool calls yields no results.
    ///
    /// Queries are normalized before searching: surrounding whitespace is
    /// trimmed, blank queries are dropped and repeats within one call are
    /// searched once. Mapping keys are the trimmed queries, so `" tides "`
    /// comes back under `"tides"`.
    pub async fn execute(
        &self,
        conversation: &Conversation,
    ) -> Result<Vec<Message>, ReflexionError> {
        let calls = match conversation.last() {
            Some(message @ Message::Model { .. }) => message.tool_calls(),
            Some(_) => {
                return Err(ReflexionError::InvalidState(
                    "tool execution requires the conversation to end with a model message"
                        .to_string(),
                ))
            }
            None => {
                return Err(ReflexionError::InvalidState(
                    "tool execution invoked on an empty conversation".to_string(),
                ))
            }
        };

        if calls.is_empty() {
            debug!("Last model message has no tool calls, nothing to execute");
            return Ok(Vec::new());
        }

        let mut seen_ids = HashSet::new();
        let mut invocations = Vec::new();
        for (call_index, call) in calls.iter().enumerate() {
            if !seen_ids.insert(call.id.as_str()) {
                return Err(ReflexionError::InvalidState(format!(
                    "duplicate tool call id `{}` in one model turn",
                    call.id
                )));
            }

            let mut queries = HashSet::new();
            for query in schema::search_queries(call)? {
                let query = query.trim().to_string();
                if !query.is_empty() && queries.insert(query.clone()) {
                    invocations.push(Invocation { call_index, query });
                }
            }
        }

        info!(
            tool_calls = calls.len(),
            searches = invocations.len(),
            backend = self.search.name(),
            "Executing search batch"
        );

        let completed: Vec<(Invocation, QueryOutcome)> = stream::iter(invocations)
            .map(|invocation| self.run(invocation))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut mappings: Vec<ResultMapping> = vec![ResultMapping::new(); calls.len()];
        let mut failed = 0;
        for (invocation, outcome) in completed {
            if outcome.is_failure() {
                failed += 1;
            }
            mappings[invocation.call_index].insert(invocation.query, outcome);
        }

        info!(failed, "Search batch complete");

        calls
            .iter()
            .zip(mappings)
            .map(|(call, mapping)| {
                let content = serde_json::to_string(&mapping).map_err(|e| {
                    ReflexionError::InvalidState(format!("unserializable search results: {}", e))
                })?;
                Ok(Message::tool_result(call.id.clone(), content))
            })
            .collect()
    }

    async fn run(&self, invocation: Invocation) -> (Invocation, QueryOutcome) {
        let outcome = match self.search.search(&invocation.query).await {
            Ok(results) => {
                debug!(query = %invocation.query, count = results.len(), "Search succeeded");
                QueryOutcome::Ok { results }
            }
            Err(e) => {
                warn!(query = %invocation.query, error = %e, "Search failed");
                QueryOutcome::SearchFailed {
                    query: invocation.query.clone(),
                    reason: e.to_string(),
                }
            }
        };
        (invocation, outcome)
    }
}

/// Decode the content of a tool result produced by [`Correlator::execute`].
pub fn parse_result_content(content: &str) -> Result<ResultMapping, serde_json::Error> {
    serde_json::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolCall;
    use crate::tools::SearchError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers every query with one hit; queries containing "fail" error out.
    /// Earlier queries sleep longer so completion order is reversed.
    #[derive(Default)]
    struct FakeSearch {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WebSearch for FakeSearch {
        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
            let position = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(query.to_string());
                calls.len() as u64
            };
            tokio::time::sleep(Duration::from_millis(20u64.saturating_sub(position * 5))).await;

            if query.contains("fail") {
                return Err(SearchError::RateLimited);
            }
            Ok(vec![SearchResult {
                title: format!("About {}", query),
                url: format!("https://example.com/{}", query.replace(' ', "-")),
                content: String::new(),
                score: Some(0.5),
            }])
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn answer_call(id: &str, queries: &[&str]) -> ToolCall {
        ToolCall::new(
            id,
            "AnswerQuestion",
            json!({
                "answer": "",
                "reflection": {"missing": "", "superfluous": ""},
                "search_queries": queries,
            }),
        )
    }

    fn conversation_with(calls: Vec<ToolCall>) -> Conversation {
        let mut conversation = Conversation::seeded("question");
        conversation.push(Message::model("", calls));
        conversation
    }

    fn correlator() -> (Correlator, Arc<FakeSearch>) {
        let search = Arc::new(FakeSearch::default());
        (Correlator::new(search.clone(), 4), search)
    }

    #[tokio::test]
    async fn test_one_result_per_call_in_call_order() {
        let (correlator, search) = correlator();
        let conversation = conversation_with(vec![
            answer_call("call_b", &["alpha", "beta"]),
            answer_call("call_a", &["gamma"]),
        ]);

        let results = correlator.execute(&conversation).await.unwrap();

        let ids: Vec<&str> = results
            .iter()
            .map(|m| match m {
                Message::ToolResult { correlation_id, .. } => correlation_id.as_str(),
                _ => panic!("Expected tool result"),
            })
            .collect();
        assert_eq!(ids, vec!["call_b", "call_a"]);
        assert_eq!(search.calls.lock().unwrap().len(), 3);

        let Message::ToolResult { content, .. } = &results[0] else {
            panic!("Expected tool result");
        };
        let mapping = parse_result_content(content).unwrap();
        let keys: Vec<&str> = mapping.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["alpha", "beta"]);
        match &mapping["beta"] {
            QueryOutcome::Ok { results } => assert_eq!(results[0].title, "About beta"),
            other => panic!("Expected results, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_query_recorded_as_marker() {
        let (correlator, _) = correlator();
        let conversation = conversation_with(vec![answer_call("call_1", &["works", "will fail"])]);

        let results = correlator.execute(&conversation).await.unwrap();
        assert_eq!(results.len(), 1);

        let Message::ToolResult { content, .. } = &results[0] else {
            panic!("Expected tool result");
        };
        let mapping = parse_result_content(content).unwrap();
        assert!(matches!(mapping["works"], QueryOutcome::Ok { .. }));
        assert_eq!(
            mapping["will fail"],
            QueryOutcome::SearchFailed {
                query: "will fail".to_string(),
                reason: SearchError::RateLimited.to_string(),
            }
        );
        assert!(content.contains(r#""status":"search_failed""#));
    }

    #[tokio::test]
    async fn test_grouping_is_repeatable() {
        let (correlator, _) = correlator();
        let conversation = conversation_with(vec![
            answer_call("call_1", &["one", "two", "three"]),
            answer_call("call_2", &["four"]),
        ]);

        let first = correlator.execute(&conversation).await.unwrap();
        let second = correlator.execute(&conversation).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_duplicate_queries_searched_once() {
        let (correlator, search) = correlator();
        let conversation = conversation_with(vec![answer_call("call_1", &["same", " same "])]);

        let results = correlator.execute(&conversation).await.unwrap();
        assert_eq!(*search.calls.lock().unwrap(), vec!["same".to_string()]);

        let Message::ToolResult { content, .. } = &results[0] else {
            panic!("Expected tool result");
        };
        let mapping = parse_result_content(content).unwrap();
        let keys: Vec<&str> = mapping.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["same"]);
    }

    #[tokio::test]
    async fn test_call_without_queries_gets_empty_mapping() {
        let (correlator, _) = correlator();
        let conversation = conversation_with(vec![answer_call("call_1", &[])]);

        let results = correlator.execute(&conversation).await.unwrap();
        assert_eq!(results, vec![Message::tool_result("call_1", "{}")]);
    }

    #[tokio::test]
    async fn test_no_tool_calls_is_noop() {
        let (correlator, search) = correlator();
        let results = correlator
            .execute(&conversation_with(vec![]))
            .await
            .unwrap();
        assert!(results.is_empty());
        assert!(search.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_message_must_be_model_message() {
        let (correlator, _) = correlator();
        let err = correlator
            .execute(&Conversation::seeded("question"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReflexionError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_duplicate_call_ids_rejected() {
        let (correlator, _) = correlator();
        let conversation = conversation_with(vec![
            answer_call("call_1", &["a"]),
            answer_call("call_1", &["b"]),
        ]);
        let err = correlator.execute(&conversation).await.unwrap_err();
        assert!(matches!(err, ReflexionError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_undecodable_arguments_abort_before_searching() {
        let (correlator, search) = correlator();
        let call = ToolCall::new("call_1", "AnswerQuestion", json!({"answer": "x"}));

        let err = correlator
            .execute(&conversation_with(vec![call]))
            .await
            .unwrap_err();
        assert!(matches!(err, ReflexionError::SchemaValidation { .. }));
        assert!(search.calls.lock().unwrap().is_empty());
    }
}
