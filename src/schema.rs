//! # Answer Schema
//!
//! The two structured outputs the model is forced to produce, and the codec
//! that turns a tool call into one of them.
//!
//! The set of accepted tools is closed: [`AnswerKind`] has exactly two
//! variants, each with a static decoder. A tool call whose name does not match
//! the currently expected kind is rejected rather than dispatched.

use serde::{Deserialize, Serialize};

use crate::conversation::ToolCall;
use crate::error::ReflexionError;
use crate::llm::ToolDefinition;

/// Self-critique attached to every drafted or revised answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    /// Critique of what is missing.
    pub missing: String,
    /// Critique of what is superfluous.
    pub superfluous: String,
}

/// Output of the draft step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerQuestion {
    pub answer: String,
    pub reflection: Reflection,
    pub search_queries: Vec<String>,
}

/// Output of every revise step: a draft plus its citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseAnswer {
    #[serde(flatten)]
    pub draft: AnswerQuestion,
    pub references: Vec<String>,
}

/// Which forced tool a model turn must call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerKind {
    Draft,
    Revise,
}

impl AnswerKind {
    pub const fn tool_name(self) -> &'static str {
        match self {
            AnswerKind::Draft => "AnswerQuestion",
            AnswerKind::Revise => "ReviseAnswer",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        match name {
            "AnswerQuestion" => Some(AnswerKind::Draft),
            "ReviseAnswer" => Some(AnswerKind::Revise),
            _ => None,
        }
    }

    /// JSON Schema definition sent to the model as the only available tool.
    pub fn tool_definition(self) -> ToolDefinition {
        let mut properties = serde_json::json!({
            "answer": {
                "type": "string",
                "description": "~250 word detailed answer to the question."
            },
            "reflection": {
                "type": "object",
                "description": "Your reflection on the initial answer.",
                "properties": {
                    "missing": {
                        "type": "string",
                        "description": "Critique of what is missing."
                    },
                    "superfluous": {
                        "type": "string",
                        "description": "Critique of what is superfluous."
                    }
                },
                "required": ["missing", "superfluous"]
            },
            "search_queries": {
                "type": "array",
                "items": { "type": "string" },
                "description": "1-3 search queries for researching improvements to address the critique of your current answer."
            }
        });
        let mut required = vec!["answer", "reflection", "search_queries"];

        let description = match self {
            AnswerKind::Draft => "Answer the question.",
            AnswerKind::Revise => {
                properties["references"] = serde_json::json!({
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Citations motivating your updated answer."
                });
                required.push("references");
                "Revise your original answer to your question."
            }
        };

        ToolDefinition {
            name: self.tool_name().to_string(),
            description: description.to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

impl std::fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// A decoded model answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Draft(AnswerQuestion),
    Revision(ReviseAnswer),
}

impl Answer {
    pub fn kind(&self) -> AnswerKind {
        match self {
            Answer::Draft(_) => AnswerKind::Draft,
            Answer::Revision(_) => AnswerKind::Revise,
        }
    }

    fn draft(&self) -> &AnswerQuestion {
        match self {
            Answer::Draft(draft) => draft,
            Answer::Revision(revision) => &revision.draft,
        }
    }

    pub fn text(&self) -> &str {
        &self.draft().answer
    }

    pub fn reflection(&self) -> &Reflection {
        &self.draft().reflection
    }

    pub fn search_queries(&self) -> &[String] {
        &self.draft().search_queries
    }

    pub fn references(&self) -> &[String] {
        match self {
            Answer::Draft(_) => &[],
            Answer::Revision(revision) => &revision.references,
        }
    }

    /// Encode as tool-call arguments.
    pub fn encode(&self) -> serde_json::Value {
        let encoded = match self {
            Answer::Draft(draft) => serde_json::to_value(draft),
            Answer::Revision(revision) => serde_json::to_value(revision),
        };
        // Plain structs of strings always serialize.
        encoded.unwrap_or(serde_json::Value::Null)
    }

    /// Answer text followed by a References section.
    ///
    /// The model is asked to write the section itself; it is appended from
    /// `references` only when the body has no line that is a References
    /// heading. The word inside ordinary prose does not count.
    pub fn render(&self) -> String {
        let body = self.text().trim_end();
        let references = self.references();
        if references.is_empty() || has_references_heading(body) {
            return body.to_string();
        }

        let listed: Vec<String> = references
            .iter()
            .enumerate()
            .map(|(i, reference)| {
                if reference.trim_start().starts_with('[') {
                    reference.clone()
                } else {
                    format!("[{}] {}", i + 1, reference)
                }
            })
            .collect();
        format!("{}\n\nReferences:\n{}", body, listed.join("\n"))
    }
}

/// Matches `References`, `References:`, `## References` and `**References:**`.
fn has_references_heading(body: &str) -> bool {
    body.lines().any(|line| {
        line.trim()
            .trim_start_matches('#')
            .trim_matches('*')
            .trim()
            .trim_end_matches(':')
            .eq_ignore_ascii_case("references")
    })
}

/// Decode a tool call into the expected answer shape.
///
/// Fails with `SchemaValidation` when the call names a different tool, when a
/// required field is absent or mistyped, or when `require_queries` is set and
/// the answer carries no usable search query.
pub fn decode(
    call: &ToolCall,
    expected: AnswerKind,
    require_queries: bool,
) -> Result<Answer, ReflexionError> {
    let tool = expected.tool_name();
    if call.name != tool {
        return Err(ReflexionError::schema(
            tool,
            format!("model called `{}` instead of the forced tool", call.name),
        ));
    }

    let invalid = |e: serde_json::Error| ReflexionError::schema(tool, e.to_string());
    let answer = match expected {
        AnswerKind::Draft => {
            Answer::Draft(serde_json::from_value(call.arguments.clone()).map_err(invalid)?)
        }
        AnswerKind::Revise => {
            Answer::Revision(serde_json::from_value(call.arguments.clone()).map_err(invalid)?)
        }
    };

    if require_queries && !answer.search_queries().iter().any(|q| !q.trim().is_empty()) {
        return Err(ReflexionError::schema(
            tool,
            "search_queries must contain at least one query",
        ));
    }

    Ok(answer)
}

/// Search queries requested by a tool call of either accepted kind.
pub fn search_queries(call: &ToolCall) -> Result<Vec<String>, ReflexionError> {
    let kind = AnswerKind::from_tool_name(&call.name).ok_or_else(|| {
        ReflexionError::schema(
            call.name.clone(),
            "not one of AnswerQuestion, ReviseAnswer",
        )
    })?;
    let answer = decode(call, kind, false)?;
    Ok(answer.search_queries().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft_args() -> serde_json::Value {
        json!({
            "answer": "4",
            "reflection": {"missing": "no proof", "superfluous": "nothing"},
            "search_queries": ["basic arithmetic verification"]
        })
    }

    #[test]
    fn test_decode_draft() {
        let call = ToolCall::new("call_1", "AnswerQuestion", draft_args());
        let answer = decode(&call, AnswerKind::Draft, true).unwrap();

        assert_eq!(answer.kind(), AnswerKind::Draft);
        assert_eq!(answer.text(), "4");
        assert_eq!(answer.reflection().missing, "no proof");
        assert_eq!(answer.search_queries(), ["basic arithmetic verification"]);
        assert!(answer.references().is_empty());
    }

    #[test]
    fn test_decode_revision_with_references() {
        let mut args = draft_args();
        args["references"] = json!(["https://example.com/math"]);
        let call = ToolCall::new("call_2", "ReviseAnswer", args);

        let answer = decode(&call, AnswerKind::Revise, true).unwrap();
        assert_eq!(answer.references(), ["https://example.com/math"]);
    }

    #[test]
    fn test_missing_search_queries_is_schema_error() {
        let mut args = draft_args();
        args.as_object_mut().unwrap().remove("search_queries");
        let call = ToolCall::new("call_1", "AnswerQuestion", args);

        let err = decode(&call, AnswerKind::Draft, true).unwrap_err();
        assert!(matches!(err, ReflexionError::SchemaValidation { .. }));
        assert!(err.to_string().contains("search_queries"));
    }

    #[test]
    fn test_missing_answer_is_schema_error() {
        let mut args = draft_args();
        args.as_object_mut().unwrap().remove("answer");
        let call = ToolCall::new("call_1", "AnswerQuestion", args);

        assert!(decode(&call, AnswerKind::Draft, false).is_err());
    }

    #[test]
    fn test_empty_queries_rejected_only_when_required() {
        let mut args = draft_args();
        args["search_queries"] = json!(["  "]);
        args["references"] = json!([]);
        let call = ToolCall::new("call_3", "ReviseAnswer", args);

        assert!(decode(&call, AnswerKind::Revise, true).is_err());
        assert!(decode(&call, AnswerKind::Revise, false).is_ok());
    }

    #[test]
    fn test_revision_requires_references() {
        let call = ToolCall::new("call_3", "ReviseAnswer", draft_args());
        assert!(decode(&call, AnswerKind::Revise, false).is_err());
    }

    #[test]
    fn test_wrong_tool_rejected() {
        let call = ToolCall::new("call_1", "tavily_search", draft_args());
        let err = decode(&call, AnswerKind::Draft, true).unwrap_err();
        assert!(err.to_string().contains("tavily_search"));
    }

    #[test]
    fn test_encode_then_decode_revision() {
        let original = Answer::Revision(ReviseAnswer {
            draft: AnswerQuestion {
                answer: "Body [1]".to_string(),
                reflection: Reflection {
                    missing: "dates".to_string(),
                    superfluous: "intro".to_string(),
                },
                search_queries: vec!["a".to_string(), "b".to_string()],
            },
            references: vec!["https://a.example".to_string()],
        });

        let call = ToolCall::new("call_1", "ReviseAnswer", original.encode());
        assert_eq!(decode(&call, AnswerKind::Revise, true).unwrap(), original);
    }

    #[test]
    fn test_encode_then_decode_draft() {
        let original = Answer::Draft(AnswerQuestion {
            answer: "Four".to_string(),
            reflection: Reflection {
                missing: "a source".to_string(),
                superfluous: String::new(),
            },
            search_queries: vec!["peano arithmetic".to_string()],
        });

        let encoded = original.encode();
        assert!(encoded.get("references").is_none());

        let call = ToolCall::new("call_1", "AnswerQuestion", encoded);
        assert_eq!(decode(&call, AnswerKind::Draft, true).unwrap(), original);
    }

    #[test]
    fn test_search_queries_from_either_tool() {
        let call = ToolCall::new("call_1", "AnswerQuestion", draft_args());
        assert_eq!(
            search_queries(&call).unwrap(),
            vec!["basic arithmetic verification".to_string()]
        );

        let unknown = ToolCall::new("call_2", "web_search", json!({"query": "x"}));
        assert!(search_queries(&unknown).is_err());
    }

    #[test]
    fn test_tool_definitions() {
        let draft = AnswerKind::Draft.tool_definition();
        assert_eq!(draft.name, "AnswerQuestion");
        assert!(draft.parameters["properties"].get("references").is_none());

        let revise = AnswerKind::Revise.tool_definition();
        assert_eq!(revise.name, "ReviseAnswer");
        assert_eq!(revise.parameters["required"][3], "references");
    }

    #[test]
    fn test_render_appends_references_when_missing() {
        let answer = Answer::Revision(ReviseAnswer {
            draft: AnswerQuestion {
                answer: "Two plus two is four [1].".to_string(),
                reflection: Reflection::default(),
                search_queries: vec![],
            },
            references: vec!["https://example.com".to_string()],
        });
        assert_eq!(
            answer.render(),
            "Two plus two is four [1].\n\nReferences:\n[1] https://example.com"
        );
    }

    #[test]
    fn test_render_keeps_model_written_references() {
        let text = "Four [1].\n\nReferences:\n- [1] https://example.com";
        let answer = Answer::Revision(ReviseAnswer {
            draft: AnswerQuestion {
                answer: text.to_string(),
                reflection: Reflection::default(),
                search_queries: vec![],
            },
            references: vec!["https://example.com".to_string()],
        });
        assert_eq!(answer.render(), text);
    }

    fn revision_with_body(body: &str) -> Answer {
        Answer::Revision(ReviseAnswer {
            draft: AnswerQuestion {
                answer: body.to_string(),
                reflection: Reflection::default(),
                search_queries: vec![],
            },
            references: vec!["https://doc.rust-lang.org/book".to_string()],
        })
    }

    #[test]
    fn test_render_word_references_in_prose_still_appends() {
        let answer = revision_with_body(
            "Rust references borrow a value without owning it [1]. See the references below.",
        );
        assert!(answer
            .render()
            .ends_with("\n\nReferences:\n[1] https://doc.rust-lang.org/book"));
    }

    #[test]
    fn test_render_recognizes_heading_variants() {
        for heading in ["References", "references:", "## References", "**References:**"] {
            let body = format!(
                "Borrowing [1].\n\n{}\n[1] https://doc.rust-lang.org/book",
                heading
            );
            assert_eq!(revision_with_body(&body).render(), body, "heading {:?}", heading);
        }
    }
}
