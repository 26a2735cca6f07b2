//! Built-in tool executors: `List`, `Tree` and `Search`.
//!
//! Each executor parses its JSON arguments, resolves the path against the
//! call's working directory and returns the serialized `ToolResponse`.
//! Filesystem failures are part of that response, not a `ToolError`.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use lookout_types::ToolResponse;
use serde::Deserialize;
use serde_json::json;

use super::{ToolCtx, ToolError, ToolExecutor, ToolFut, ToolRegistry, parse_args};
use crate::config::default_true;
use crate::selector::BackendPreference;
use crate::service::{FsTools, ListRequest, SearchRequest, TreeRequest};

const LIST_TOOL_NAME: &str = "List";
const TREE_TOOL_NAME: &str = "Tree";
const SEARCH_TOOL_NAME: &str = "Search";

#[derive(Debug, Clone)]
pub struct ListTool {
    tools: Arc<FsTools>,
}

#[derive(Debug, Clone)]
pub struct TreeTool {
    tools: Arc<FsTools>,
}

#[derive(Debug, Clone)]
pub struct SearchTool {
    tools: Arc<FsTools>,
}

impl ListTool {
    #[must_use]
    pub fn new(tools: Arc<FsTools>) -> Self {
        Self { tools }
    }
}

impl TreeTool {
    #[must_use]
    pub fn new(tools: Arc<FsTools>) -> Self {
        Self { tools }
    }
}

impl SearchTool {
    #[must_use]
    pub fn new(tools: Arc<FsTools>) -> Self {
        Self { tools }
    }
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    path: Option<String>,
    backend: Option<BackendPreference>,
}

#[derive(Debug, Deserialize)]
struct TreeArgs {
    path: Option<String>,
    depth: Option<usize>,
    backend: Option<BackendPreference>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    path: Option<String>,
    pattern: Option<String>,
    text: Option<String>,
    case_insensitive: Option<bool>,
    #[serde(default = "default_true")]
    recursive: bool,
    depth: Option<usize>,
    backend: Option<BackendPreference>,
}

fn path_property() -> serde_json::Value {
    json!({
        "type": "string",
        "description": "Directory to inspect, relative to the working directory. Defaults to the working directory. Must not contain '..'."
    })
}

fn backend_property() -> serde_json::Value {
    json!({
        "type": "string",
        "enum": ["auto", "fallback"],
        "description": "Force the portable implementation with 'fallback'. Omit unless native output looks wrong."
    })
}

/// Resolve a tool path against the working directory. Returns the resolved
/// path and the path as given.
fn resolve_path(raw: Option<&str>, ctx: &ToolCtx) -> Result<(PathBuf, String), ToolError> {
    let raw = raw.map(str::trim).filter(|p| !p.is_empty()).unwrap_or(".");
    let path = Path::new(raw);
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ToolError::BadArgs {
            message: format!("path must not contain '..': {raw}"),
        });
    }
    Ok((ctx.working_dir.join(path), raw.to_string()))
}

fn render(tool: &str, response: &ToolResponse) -> Result<String, ToolError> {
    if let Some(kind) = response.error_kind() {
        tracing::debug!(tool, %kind, backend = %response.backend.backend, "Tool returned a failure");
    }
    serde_json::to_string(response).map_err(|e| ToolError::ExecutionFailed {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

impl ToolExecutor for ListTool {
    fn name(&self) -> &'static str {
        LIST_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "List the immediate entries of a directory with kind, size and modification time."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "path": path_property(),
                "backend": backend_property()
            }
        })
    }

    fn summary(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let typed: ListArgs = parse_args(args)?;
        Ok(format!("List {}", typed.path.as_deref().unwrap_or(".")))
    }

    fn execute<'a>(&'a self, args: serde_json::Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: ListArgs = parse_args(&args)?;
            let (path, _) = resolve_path(typed.path.as_deref(), ctx)?;
            let mut request = ListRequest::new(path);
            request.backend = typed.backend;
            let response = self.tools.list(&request).await;
            render(LIST_TOOL_NAME, &response)
        })
    }
}

impl ToolExecutor for TreeTool {
    fn name(&self) -> &'static str {
        TREE_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Render the directory hierarchy below a path as an indented tree."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "path": path_property(),
                "depth": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 10,
                    "default": 3,
                    "description": "How many levels below the path to show."
                },
                "backend": backend_property()
            }
        })
    }

    fn summary(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let typed: TreeArgs = parse_args(args)?;
        let depth = self.tools.settings().tree.effective_depth(typed.depth);
        Ok(format!(
            "Tree {} (depth {depth})",
            typed.path.as_deref().unwrap_or(".")
        ))
    }

    fn execute<'a>(&'a self, args: serde_json::Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: TreeArgs = parse_args(&args)?;
            let (path, label) = resolve_path(typed.path.as_deref(), ctx)?;
            let mut request = TreeRequest::new(path);
            request.depth = typed.depth;
            request.label = Some(label);
            request.backend = typed.backend;
            let response = self.tools.tree(&request).await;
            render(TREE_TOOL_NAME, &response)
        })
    }
}

impl ToolExecutor for SearchTool {
    fn name(&self) -> &'static str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Find files by name pattern, optionally searching their contents for literal text. Returns matching files, or matching lines when 'text' is set."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "path": path_property(),
                "pattern": {
                    "type": "string",
                    "description": "Filename glob: '*', '?', '[a-z]', '{a,b}', '**'. A pattern without '/' matches file names at any depth. Omit to match every file."
                },
                "text": {
                    "type": "string",
                    "description": "Literal text to find inside matching files."
                },
                "case_insensitive": {
                    "type": "boolean",
                    "description": "Ignore case in both pattern and text."
                },
                "recursive": {
                    "type": "boolean",
                    "default": true,
                    "description": "Search subdirectories."
                },
                "depth": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Deepest directory level searched when recursive."
                },
                "backend": backend_property()
            }
        })
    }

    fn summary(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let typed: SearchArgs = parse_args(args)?;
        let path = typed.path.as_deref().unwrap_or(".");
        let pattern = typed.pattern.as_deref().unwrap_or("*");
        Ok(match typed.text.as_deref() {
            Some(text) => format!("Search '{text}' in {pattern} under {path}"),
            None => format!("Search {pattern} under {path}"),
        })
    }

    fn execute<'a>(&'a self, args: serde_json::Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: SearchArgs = parse_args(&args)?;
            let (path, _) = resolve_path(typed.path.as_deref(), ctx)?;
            let request = SearchRequest {
                path,
                pattern: typed.pattern,
                text: typed.text,
                case_insensitive: typed.case_insensitive,
                recursive: typed.recursive,
                depth: typed.depth,
                backend: typed.backend,
            };
            let response = self.tools.search(&request).await;
            render(SEARCH_TOOL_NAME, &response)
        })
    }
}

pub fn register_builtins(registry: &mut ToolRegistry, tools: Arc<FsTools>) -> Result<(), ToolError> {
    registry.register(Box::new(ListTool::new(Arc::clone(&tools))))?;
    registry.register(Box::new(TreeTool::new(Arc::clone(&tools))))?;
    registry.register(Box::new(SearchTool::new(tools)))?;
    Ok(())
}
