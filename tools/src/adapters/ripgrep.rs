//! `rg` (filename listing with `--files`, content search with `--json`).

use std::path::Path;

use lookout_types::{FsError, MatchRecord};

use super::{
    AdapterOutcome, Invocation, NativeOutput, TextQuery, clean_relative, split_nul,
    trim_line_ending,
};
use crate::fallback::NOT_UTF8;

/// Every file below `root`. Nothing is ignored and links are followed, so the
/// set matches the fallback walk.
pub fn files_invocation(exe: &Path, root: &Path, max_depth: Option<usize>) -> Invocation {
    let inv = Invocation::new(exe)
        .args([
            "--no-config",
            "--files",
            "--hidden",
            "--no-ignore",
            "--follow",
            "--null",
            "--sort",
            "path",
        ])
        .current_dir(root);
    match max_depth {
        Some(depth) => inv.arg("--max-depth").arg(depth.to_string()),
        None => inv,
    }
}

/// Exit 1 means no files at all.
pub fn parse_files(output: &NativeOutput) -> AdapterOutcome<Vec<String>> {
    match output.exit_code {
        Some(0) => AdapterOutcome::parsed(
            split_nul(&output.stdout)
                .map(|path| clean_relative(&path))
                .filter(|path| !path.is_empty())
                .collect(),
        ),
        Some(1) => AdapterOutcome::parsed(Vec::new()),
        _ => AdapterOutcome::recoverable(output.unexpected_exit("rg")),
    }
}

/// Literal search for `query.text` in one batch of root-relative files.
pub fn content_invocation(
    exe: &Path,
    root: &Path,
    query: TextQuery<'_>,
    batch: &[String],
) -> Invocation {
    let inv = Invocation::new(exe)
        .args([
            "--no-config",
            "--json",
            "--fixed-strings",
            "--no-ignore",
            "--hidden",
            "--sort",
            "path",
        ])
        .current_dir(root);
    let inv = if query.case_insensitive {
        inv.arg("--ignore-case")
    } else {
        inv.arg("--case-sensitive")
    };
    inv.arg("--regexp").arg(query.text).arg("--").args(batch)
}

/// Parse `--json` events. Spans are left empty for the caller to recompute.
pub fn parse_content(output: &NativeOutput) -> AdapterOutcome<Vec<MatchRecord>> {
    match output.exit_code {
        Some(0) => {}
        Some(1) => return AdapterOutcome::parsed(Vec::new()),
        _ => return AdapterOutcome::recoverable(output.unexpected_exit("rg")),
    }
    let mut matches = Vec::new();
    let mut skipped = Vec::new();
    for line in output.stdout.split(|&b| b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_slice(line) {
            Ok(value) => value,
            Err(err) => return AdapterOutcome::recoverable(format!("invalid JSON from rg: {err}")),
        };
        if value.get("type").and_then(serde_json::Value::as_str) != Some("match") {
            continue;
        }
        match parse_match(&value) {
            Ok(record) => matches.push(record),
            Err(Some(err)) => skipped.push(err),
            Err(None) => {
                return AdapterOutcome::recoverable("rg match event without path or line number");
            }
        }
    }
    AdapterOutcome::Parsed {
        value: matches,
        skipped,
    }
}

/// `Err(Some)` for a match whose text is not UTF-8, `Err(None)` for a malformed event.
fn parse_match(value: &serde_json::Value) -> Result<MatchRecord, Option<FsError>> {
    let data = value.get("data").ok_or(None)?;
    let path = data
        .get("path")
        .and_then(|p| p.get("text"))
        .and_then(serde_json::Value::as_str)
        .ok_or(None)?;
    let path = clean_relative(path);
    let line_number = data
        .get("line_number")
        .and_then(serde_json::Value::as_u64)
        .ok_or(None)?;
    let Some(text) = data
        .get("lines")
        .and_then(|l| l.get("text"))
        .and_then(serde_json::Value::as_str)
    else {
        return Err(Some(FsError::skipped(path, NOT_UTF8)));
    };
    Ok(MatchRecord {
        path,
        line_number,
        line: trim_line_ending(text).to_string(),
        spans: Vec::new(),
    })
}
