//! `grep -nHIF` (posix content search).

use std::collections::HashSet;
use std::path::Path;

use lookout_types::{FsError, MatchRecord};

use super::{
    AdapterOutcome, Invocation, NativeOutput, TextQuery, folds_as_ascii, trim_line_ending,
};
use crate::fallback::NOT_UTF8;

/// grep runs in the C locale, where `-i` folds ASCII letters only.
pub fn unsupported(query: TextQuery<'_>) -> Option<String> {
    (query.case_insensitive && !folds_as_ascii(query.text))
        .then(|| "grep -i cannot fold non-ASCII case".to_string())
}

/// Fixed-string search with file names and line numbers; binary files are
/// treated as non-matching.
pub fn invocation(exe: &Path, root: &Path, query: TextQuery<'_>, batch: &[String]) -> Invocation {
    let inv = Invocation::new(exe)
        .args(["-n", "-H", "-I", "-F"])
        .current_dir(root)
        .c_locale();
    let inv = if query.case_insensitive { inv.arg("-i") } else { inv };
    inv.arg("-e").arg(query.text).arg("--").args(batch)
}

/// Parse `path:line:text` records. `batch` disambiguates paths containing `:`.
pub fn parse(output: &NativeOutput, batch: &[String]) -> AdapterOutcome<Vec<MatchRecord>> {
    match output.exit_code {
        Some(0) => {}
        Some(1) => return AdapterOutcome::parsed(Vec::new()),
        _ => return AdapterOutcome::recoverable(output.unexpected_exit("grep")),
    }
    let known: HashSet<&str> = batch.iter().map(String::as_str).collect();
    parse_records(&output.stdout, "grep", |line| split_record(line, &known))
}

/// Shared by `grep` and `findstr`: split stdout into lines and decode each
/// through `split`, which yields `(path, line_number, text)`.
pub(crate) fn parse_records<'a, F>(
    stdout: &'a [u8],
    tool: &str,
    mut split: F,
) -> AdapterOutcome<Vec<MatchRecord>>
where
    F: FnMut(&'a [u8]) -> Option<(String, u64, &'a [u8])>,
{
    let mut matches = Vec::new();
    let mut skipped: Vec<FsError> = Vec::new();
    for line in stdout.split(|&b| b == b'\n') {
        if line.is_empty() || line == b"\r" {
            continue;
        }
        let Some((path, line_number, text)) = split(line) else {
            let shown = String::from_utf8_lossy(line);
            return AdapterOutcome::recoverable(format!("unrecognized {tool} line: {shown}"));
        };
        match std::str::from_utf8(text) {
            Ok(text) => matches.push(MatchRecord {
                path,
                line_number,
                line: trim_line_ending(text).to_string(),
                spans: Vec::new(),
            }),
            Err(_) => {
                if !skipped.iter().any(|s| s.path.as_deref() == Some(path.as_str())) {
                    skipped.push(FsError::skipped(path, NOT_UTF8));
                }
            }
        }
    }
    AdapterOutcome::Parsed {
        value: matches,
        skipped,
    }
}

/// Find the `:` after a known path that is followed by `digits:`.
fn split_record<'a>(line: &'a [u8], known: &HashSet<&str>) -> Option<(String, u64, &'a [u8])> {
    line.iter()
        .enumerate()
        .filter(|&(_, &b)| b == b':')
        .find_map(|(idx, _)| {
            let path = std::str::from_utf8(&line[..idx]).ok()?;
            if !known.contains(path) {
                return None;
            }
            let (number, text) = split_line_number(&line[idx + 1..])?;
            Some((path.to_string(), number, text))
        })
}

pub(crate) fn split_line_number(rest: &[u8]) -> Option<(u64, &[u8])> {
    let colon = rest.iter().position(|&b| b == b':')?;
    let number = std::str::from_utf8(&rest[..colon]).ok()?.parse().ok()?;
    Some((number, &rest[colon + 1..]))
}
