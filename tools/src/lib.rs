//! Portable file-inspection tools: list, tree and search that behave the same
//! on every host, backed by native commands where available.

pub mod adapters;
pub mod builtins;
pub mod config;
pub mod fallback;
pub mod normalize;
pub mod pattern;
pub mod platform;
pub mod process;
pub mod selector;
pub mod service;

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use lookout_types::ToolDefinition;
use serde_json::Value;

pub use builtins::{ListTool, SearchTool, TreeTool, register_builtins};
pub use config::{ListToolConfig, SearchToolConfig, ToolSettings, TreeToolConfig};
pub use pattern::{Pattern, PatternError, PatternOptions};
pub use platform::{NativeTool, Platform, PlatformFamily};
pub use selector::{BackendPreference, Operation, Selection, Strategy, select, select_with};
pub use service::{FsTools, ListRequest, SearchRequest, TreeRequest};

/// Tool execution future type alias.
pub type ToolFut<'a> = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;

/// Failures of the tool call itself, as opposed to the filesystem outcome,
/// which travels inside the returned `ToolResponse`.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Bad tool args: {message}")]
    BadArgs { message: String },
    #[error("Tool execution failed: {tool}: {message}")]
    ExecutionFailed { tool: String, message: String },
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("Duplicate tool registered: {name}")]
    DuplicateTool { name: String },
}

/// An agent-callable tool.
pub trait ToolExecutor: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> Value;
    /// One line describing a call, for logs and prompts.
    fn summary(&self, args: &Value) -> Result<String, ToolError>;
    fn execute<'a>(&'a self, args: Value, ctx: &'a mut ToolCtx) -> ToolFut<'a>;
}

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::BadArgs {
        message: e.to_string(),
    })
}

/// Per-call tool context.
#[derive(Debug, Clone)]
pub struct ToolCtx {
    /// Relative tool paths resolve against this directory.
    pub working_dir: PathBuf,
}

impl ToolCtx {
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    executors: HashMap<String, Box<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn register(&mut self, executor: Box<dyn ToolExecutor>) -> Result<(), ToolError> {
        let name = executor.name().to_string();
        if self.executors.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }
        self.executors.insert(name, executor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&dyn ToolExecutor, ToolError> {
        self.executors
            .get(name)
            .map(std::convert::AsRef::as_ref)
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .executors
            .values()
            .map(|exec| ToolDefinition::new(exec.name(), exec.description(), exec.schema()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Validate `args` against the tool's schema, then run it.
    pub async fn dispatch(
        &self,
        name: &str,
        args: Value,
        ctx: &mut ToolCtx,
    ) -> Result<String, ToolError> {
        let executor = self.lookup(name)?;
        validate_args(&executor.schema(), &args)?;
        tracing::debug!(tool = name, call = %executor.summary(&args)?, "Dispatching tool");
        executor.execute(args, ctx).await
    }
}

/// Validate arguments against a JSON schema.
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ToolError::BadArgs {
        message: format!("Invalid tool schema: {e}"),
    })?;
    let result = validator.validate(args);
    if let Err(err) = result {
        return Err(ToolError::BadArgs {
            message: err.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ToolCtx, ToolError, ToolExecutor, ToolFut, ToolRegistry, validate_args};
    use serde_json::{Value, json};

    struct Echo;

    impl ToolExecutor for Echo {
        fn name(&self) -> &'static str {
            "Echo"
        }

        fn description(&self) -> &'static str {
            "Echo the input"
        }

        fn schema(&self) -> Value {
            json!({
                "type": "object",
                "additionalProperties": false,
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        fn summary(&self, _args: &Value) -> Result<String, ToolError> {
            Ok("echo".to_string())
        }

        fn execute<'a>(&'a self, args: Value, _ctx: &'a mut ToolCtx) -> ToolFut<'a> {
            Box::pin(async move { Ok(args["text"].as_str().unwrap_or_default().to_string()) })
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::default();
        registry.register(Box::new(Echo)).unwrap();
        let err = registry.register(Box::new(Echo)).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateTool { name } if name == "Echo"));
    }

    #[test]
    fn unknown_tool_lookup_fails() {
        let registry = ToolRegistry::default();
        assert!(matches!(
            registry.lookup("Nope"),
            Err(ToolError::UnknownTool { .. })
        ));
    }

    #[test]
    fn schema_violations_are_bad_args() {
        let schema = Echo.schema();
        assert!(validate_args(&schema, &json!({ "text": "hi" })).is_ok());
        assert!(matches!(
            validate_args(&schema, &json!({ "text": 3 })),
            Err(ToolError::BadArgs { .. })
        ));
        assert!(validate_args(&schema, &json!({ "text": "hi", "extra": 1 })).is_err());
    }

    #[tokio::test]
    async fn dispatch_validates_then_executes() {
        let mut registry = ToolRegistry::default();
        registry.register(Box::new(Echo)).unwrap();
        let mut ctx = ToolCtx::new(".");
        let out = registry
            .dispatch("Echo", json!({ "text": "hi" }), &mut ctx)
            .await
            .unwrap();
        assert_eq!(out, "hi");
        let err = registry
            .dispatch("Echo", json!({}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::BadArgs { .. }));
    }
}
