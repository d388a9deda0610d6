#![deny(missing_docs)]
//! Tool registry: maps tool names to deterministic handlers and dispatches
//! model-requested calls against them.
//!
//! A handler is either synchronous or asynchronous underneath — [`ToolDyn`]
//! only exposes the async boundary the runtime drives through. The registry
//! never lets a handler's failure escape as a Rust error once inside
//! [`ToolRegistry::invoke`]: callers always get back a JSON value shaped
//! `{"result": ...}` or `{"error": "..."}`, matching what gets sent back to
//! the model as a function-response part.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Errors from tool registration and lookup. Handler failures are captured
/// as `{"error": ...}` values by [`ToolRegistry::invoke`] and never surface
/// as this type — `Other` exists for handlers that want to report structured
/// failures distinct from a plain string message.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// `register` was called with a name already present in the registry.
    #[error("tool already registered: {0}")]
    AlreadyRegistered(String),

    /// The handler itself failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Supplied arguments did not satisfy the tool's declared schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The JSON-Schema-like declaration a tool exposes to the model:
/// `{name, description, parameters: {type: "object", properties, required}}`.
#[derive(Debug, Clone)]
pub struct ToolDeclaration {
    /// Tool name as the model will reference it in function calls.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON-Schema-shaped parameter object: `{type, properties, required}`.
    pub parameters: serde_json::Value,
}

/// Object-safe trait every tool handler implements, whether it wraps a
/// synchronous closure or drives its own async I/O.
pub trait ToolDyn: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// JSON-Schema-like parameter object for this tool's arguments.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool against validated arguments.
    fn call(
        &self,
        args: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>>;
}

/// Shallow structural check of `args` against a `{type, properties, required}`
/// schema object: confirms `args` is a JSON object and that every name in
/// `required` is present as a key. Property *types* are not checked — tool
/// handlers are expected to validate their own value shapes, mirroring how
/// loosely model-supplied JSON tool args are typically schema-checked.
fn validate_args(schema: &serde_json::Value, args: &serde_json::Value) -> Result<(), String> {
    let Some(obj) = args.as_object() else {
        return Err("arguments must be a JSON object".to_string());
    };
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };
    for field in required {
        let Some(name) = field.as_str() else { continue };
        if !obj.contains_key(name) {
            return Err(format!("missing required argument: {name}"));
        }
    }
    Ok(())
}

/// Maps tool names to handlers; validates arguments and dispatches calls,
/// never letting a handler failure escape as a Rust error.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool under its own name. Fails if the name is already taken.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry holds no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations for the named subset of tools, in the order requested.
    /// Unknown names are silently skipped — an agent's static tool-set list
    /// drifting ahead of registration is a startup bug, not a per-call one.
    pub fn declarations_for(&self, tool_names: &[&str]) -> Vec<ToolDeclaration> {
        tool_names
            .iter()
            .filter_map(|name| self.tools.get(*name))
            .map(|tool| ToolDeclaration {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.input_schema(),
            })
            .collect()
    }

    /// Validate `args` against the named tool's schema and dispatch the call.
    ///
    /// Always returns `Ok`: the inner value is `{"result": ...}` on success,
    /// `{"error": "..."}` on any failure including an unknown tool name or a
    /// schema violation. This mirrors the function-response contract the
    /// model gateway replies to the model with.
    pub async fn invoke(
        &self,
        tool_name: &str,
        args: serde_json::Value,
    ) -> serde_json::Value {
        let Some(tool) = self.tools.get(tool_name) else {
            tracing::debug!(tool_name, "unknown tool");
            return serde_json::json!({"error": "unknown tool"});
        };

        if let Err(reason) = validate_args(&tool.input_schema(), &args) {
            tracing::debug!(tool_name, reason, "tool argument validation failed");
            return serde_json::json!({"error": reason});
        }

        tracing::debug!(tool_name, "invoking tool");
        match tool.call(args).await {
            Ok(value) => serde_json::json!({"result": value}),
            Err(err) => {
                tracing::debug!(tool_name, error = %err, "tool execution failed");
                serde_json::json!({"error": err.to_string()})
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn tool_dyn_is_object_safe() {
        _assert_send_sync::<Arc<dyn ToolDyn>>();
    }

    struct EchoTool;

    impl ToolDyn for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes input back"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"msg": {"type": "string"}}, "required": ["msg"]})
        }
        fn call(
            &self,
            args: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
            Box::pin(async move { Ok(json!({"echoed": args})) })
        }
    }

    struct FailTool;

    impl ToolDyn for FailTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        fn call(
            &self,
            _args: serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + '_>> {
            Box::pin(async { Err(ToolError::ExecutionFailed("always fails".into())) })
        }
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        assert!(reg.is_empty());
        reg.register(Arc::new(EchoTool)).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.get("echo").is_some());
        assert!(reg.get("nonexistent").is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool)).unwrap();
        let err = reg.register(Arc::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ToolError::AlreadyRegistered(name) if name == "echo"));
    }

    #[test]
    fn declarations_for_filters_and_orders() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool)).unwrap();
        reg.register(Arc::new(FailTool)).unwrap();

        let decls = reg.declarations_for(&["fail", "echo", "nonexistent"]);
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].name, "fail");
        assert_eq!(decls[1].name, "echo");
    }

    #[tokio::test]
    async fn invoke_success_wraps_result() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool)).unwrap();
        let out = reg.invoke("echo", json!({"msg": "hi"})).await;
        assert_eq!(out, json!({"result": {"echoed": {"msg": "hi"}}}));
    }

    #[tokio::test]
    async fn invoke_unknown_tool_never_panics() {
        let reg = ToolRegistry::new();
        let out = reg.invoke("nonexistent", json!({})).await;
        assert_eq!(out, json!({"error": "unknown tool"}));
    }

    #[tokio::test]
    async fn invoke_missing_required_argument_is_rejected_before_dispatch() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool)).unwrap();
        let out = reg.invoke("echo", json!({})).await;
        assert_eq!(out, json!({"error": "missing required argument: msg"}));
    }

    #[tokio::test]
    async fn invoke_handler_failure_is_captured_not_raised() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(FailTool)).unwrap();
        let out = reg.invoke("fail", json!({})).await;
        assert_eq!(out, json!({"error": "execution failed: always fails"}));
    }
}
