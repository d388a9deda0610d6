#![deny(missing_docs)]
//! Thin interface to a chat-capable LLM that supports tool calling: a
//! single-shot `generate`, a multi-turn tool-loop `chat_with_tools`, and a
//! tolerant structured-JSON extractor.
//!
//! The trait boundary exists so the Agent Runtime and Orchestrator are
//! gateway-agnostic: this repository ships [`fake::FakeGateway`], a
//! deterministic in-process implementation, and nothing else — adding a
//! live HTTP-backed gateway later is additive (a new [`ModelGateway`] impl),
//! not a rewrite.

pub mod config;
pub mod error;
pub mod fake;

pub use config::GatewayConfig;
pub use error::{GatewayError, ReasoningError};
pub use fake::{FakeGateway, Scenario, ScenarioStep, ToolCall};

use async_trait::async_trait;
use pulse_tool::ToolRegistry;
use tokio_util::sync::CancellationToken;

/// Contract for a chat-capable, tool-using model backend.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Single-shot text generation; fails with [`ReasoningError::EmptyCandidates`]
    /// if the backend produces no usable candidate.
    async fn generate(
        &self,
        agent_name: &str,
        prompt: &str,
        config: &GatewayConfig,
    ) -> Result<String, GatewayError>;

    /// Drive a tool-using reasoning loop, seeded with `system_instruction`
    /// and `prompt`, bounded by `max_turns`. Tool calls are dispatched
    /// through `tools`, restricted in spirit to `tool_set` (the declarations
    /// the caller exposed to the model). Returns the final text once the
    /// backend stops requesting tool calls; fails with
    /// [`ReasoningError::ToolLoopExceeded`] if `max_turns` is exhausted
    /// first.
    ///
    /// `cancel` is checked between turns so a caller-side deadline can stop
    /// the loop at a suspension point rather than only at the outer future
    /// boundary.
    #[allow(clippy::too_many_arguments)]
    async fn chat_with_tools(
        &self,
        agent_name: &str,
        system_instruction: &str,
        prompt: &str,
        tools: &ToolRegistry,
        tool_set: &[&str],
        config: &GatewayConfig,
        max_turns: usize,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError>;
}

/// Maximum length, in characters, of the raw-text prefix embedded in a
/// [`ReasoningError`] for diagnostics.
const TRUNCATION_LIMIT: usize = 200;

fn truncate(text: &str) -> String {
    if text.chars().count() > TRUNCATION_LIMIT {
        let prefix: String = text.chars().take(TRUNCATION_LIMIT).collect();
        format!("{prefix}...")
    } else {
        text.to_string()
    }
}

/// Strip a leading code-fence marker (e.g. ` ```json `) and trailing fence
/// from `text`, if present. Tolerates a language tag immediately after the
/// opening triple-backtick.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let after_lang = after_open.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let after_lang = after_lang.trim_start_matches('\n').trim_start();
    match after_lang.strip_suffix("```") {
        Some(body) => body.trim(),
        None => after_lang.trim(),
    }
}

/// Tolerant JSON extractor: strips a leading/trailing code-fence marker,
/// parses the remainder as JSON, and validates that it is an object
/// containing every name in `required_fields`.
///
/// Fails with [`ReasoningError::ParseFailed`] on unparsable text or
/// [`ReasoningError::SchemaViolation`] when parsed JSON doesn't satisfy the
/// shape check; both include a truncated prefix of the raw text.
pub fn parse_structured(text: &str, required_fields: &[&str]) -> Result<serde_json::Value, GatewayError> {
    let candidate = strip_code_fence(text);
    let value: serde_json::Value = serde_json::from_str(candidate).map_err(|_| ReasoningError::ParseFailed {
        prefix: truncate(text),
    })?;

    let Some(obj) = value.as_object() else {
        return Err(ReasoningError::SchemaViolation {
            reason: "expected a JSON object".to_string(),
            prefix: truncate(text),
        }
        .into());
    };

    for field in required_fields {
        if !obj.contains_key(*field) {
            return Err(ReasoningError::SchemaViolation {
                reason: format!("missing field `{field}`"),
                prefix: truncate(text),
            }
            .into());
        }
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_json() {
        let v = parse_structured(r#"{"a": 1}"#, &["a"]).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn strips_fenced_json_with_language_tag() {
        let text = "```json\n{\"a\": 1}\n```";
        let v = parse_structured(text, &["a"]).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn strips_fenced_json_without_language_tag() {
        let text = "```\n{\"a\": 1}\n```";
        let v = parse_structured(text, &[]).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn unparsable_text_is_parse_failed() {
        let err = parse_structured("not json at all", &[]).unwrap_err();
        assert!(matches!(err, GatewayError::Reasoning(ReasoningError::ParseFailed { .. })));
    }

    #[test]
    fn missing_required_field_is_schema_violation() {
        let err = parse_structured(r#"{"a": 1}"#, &["b"]).unwrap_err();
        assert!(matches!(err, GatewayError::Reasoning(ReasoningError::SchemaViolation { .. })));
    }

    #[test]
    fn non_object_is_schema_violation() {
        let err = parse_structured("[1, 2, 3]", &[]).unwrap_err();
        assert!(matches!(err, GatewayError::Reasoning(ReasoningError::SchemaViolation { .. })));
    }

    #[test]
    fn long_raw_text_is_truncated_in_error() {
        let long = "x".repeat(500);
        let err = parse_structured(&long, &[]).unwrap_err();
        if let GatewayError::Reasoning(ReasoningError::ParseFailed { prefix }) = err {
            assert!(prefix.ends_with("..."));
            assert!(prefix.len() < long.len());
        } else {
            panic!("expected ParseFailed");
        }
    }
}
