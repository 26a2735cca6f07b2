//! Plain-text rendering of tool responses for terminals.

use std::fmt::Write;

use lookout_types::{FsError, ToolResponse, ToolResult};

/// Lines for stdout.
pub fn body(response: &ToolResponse) -> String {
    let mut out = String::new();
    match &response.result {
        ToolResult::Entries(entries) => {
            for entry in entries {
                let suffix = if entry.kind.is_dir() { "/" } else { "" };
                let _ = writeln!(out, "{}{suffix}", entry.path);
            }
        }
        ToolResult::Matches(matches) => {
            for record in matches {
                let _ = writeln!(out, "{}:{}:{}", record.path, record.line_number, record.line);
            }
        }
        ToolResult::Tree(tree) => {
            out.push_str(tree);
            if !tree.ends_with('\n') {
                out.push('\n');
            }
        }
        ToolResult::Error(_) => {}
    }
    out
}

/// Diagnostics for stderr: the error, skipped paths and truncation.
pub fn notes(response: &ToolResponse) -> Vec<String> {
    let mut notes = Vec::new();
    if let Some(err) = response.result.error() {
        notes.push(format!("error: {}", describe(err)));
    }
    for skipped in &response.partial {
        notes.push(format!("skipped: {}", describe(skipped)));
    }
    if response.truncated {
        notes.push("results truncated".to_string());
    }
    if let Some(cause) = &response.backend.fallback_cause {
        notes.push(format!("native backend failed, used fallback: {cause}"));
    }
    notes
}

fn describe(err: &FsError) -> String {
    match &err.path {
        Some(path) => format!("{path}: {err}"),
        None => err.to_string(),
    }
}
