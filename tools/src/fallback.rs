//! Portable fallback engine: listing, tree and search straight against the
//! filesystem.
//!
//! Every traversal uses `ignore::WalkBuilder` with its filters disabled,
//! links followed and siblings sorted by name, so output is a depth-first
//! pre-order walk. Link loops are detected by the walker and reported as
//! skipped paths. All functions here block; [`run_blocking`] moves them off
//! the async runtime.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, UNIX_EPOCH};

use ignore::WalkBuilder;
use lookout_types::{Entry, EntryKind, ErrorKind, FsError, MatchRecord, MatchSpan};
use regex::bytes::{Regex as ByteRegex, RegexBuilder as ByteRegexBuilder};
use regex::{Regex, RegexBuilder};

use crate::normalize::{RawOutput, RawResult, TreeNode, fs_error_from_io};
use crate::pattern::Pattern;

/// Skip cause for files containing a NUL byte.
pub const BINARY_FILE: &str = "binary file, not searched";
/// Skip cause for files with a matching line that is not UTF-8.
pub const NOT_UTF8: &str = "file is not valid UTF-8";

/// Shared flag checked between filesystem operations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Cancels the flag when dropped.
    #[must_use]
    pub fn guard(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

pub struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Deadline plus cancellation for one fallback run.
#[derive(Debug, Clone)]
pub struct Budget {
    deadline: Option<(Instant, Duration)>,
    cancel: CancelFlag,
}

impl Budget {
    #[must_use]
    pub fn new(timeout: Option<Duration>, cancel: CancelFlag) -> Self {
        Self {
            deadline: timeout.map(|t| (Instant::now() + t, t)),
            cancel,
        }
    }

    /// No deadline, never cancelled.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(None, CancelFlag::default())
    }

    pub fn check(&self) -> Result<(), FsError> {
        if self.cancel.is_cancelled() {
            return Err(FsError::new(ErrorKind::Timeout, "operation cancelled"));
        }
        if let Some((deadline, timeout)) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(FsError::new(
                ErrorKind::Timeout,
                format!("traversal exceeded {}ms", timeout.as_millis()),
            ));
        }
        Ok(())
    }
}

/// Run `job` on the blocking pool. Dropping the returned future cancels it.
pub async fn run_blocking<T, F>(timeout: Option<Duration>, job: F) -> Result<T, FsError>
where
    T: Send + 'static,
    F: FnOnce(&Budget) -> Result<T, FsError> + Send + 'static,
{
    let cancel = CancelFlag::default();
    let _cancel_on_drop = cancel.guard();
    let budget = Budget::new(timeout, cancel);
    tokio::task::spawn_blocking(move || job(&budget))
        .await
        .map_err(|err| {
            FsError::new(
                ErrorKind::BackendUnavailable,
                format!("fallback worker failed: {err}"),
            )
        })?
}

/// A walked node, relative to the walk root.
struct Visited {
    rel: String,
    depth: usize,
    kind: EntryKind,
    metadata: Option<Metadata>,
}

impl Visited {
    fn into_entry(self) -> Entry {
        let size = self.metadata.as_ref().map(Metadata::len);
        let modified = self.metadata.as_ref().and_then(modified_ms);
        Entry::new(self.rel, self.kind)
            .with_size(size)
            .with_modified(modified)
    }
}

/// Walk `root` to `max_depth`, handing every node below the root to `visit`
/// until it returns `false`. Unreadable sub-paths and link loops land in
/// `skipped`; failure to read the root itself is an error.
fn walk<F>(
    root: &Path,
    max_depth: Option<usize>,
    budget: &Budget,
    skipped: &mut Vec<FsError>,
    mut visit: F,
) -> Result<(), FsError>
where
    F: FnMut(Visited) -> bool,
{
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(true)
        .max_depth(max_depth)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for result in walker {
        budget.check()?;
        let visited = match result {
            Ok(entry) if entry.depth() == 0 => continue,
            Ok(entry) => {
                let kind = entry
                    .file_type()
                    .map_or(EntryKind::Other, |ft| kind_of(ft.is_dir(), ft.is_file()));
                Visited {
                    rel: relative(root, entry.path()),
                    depth: entry.depth(),
                    kind,
                    metadata: entry.metadata().ok(),
                }
            }
            Err(err) => match walk_error(root, &err)? {
                WalkIssue::Skipped(skip) => {
                    tracing::warn!(path = ?skip.path, cause = %skip.cause, "Skipping path");
                    skipped.push(skip);
                    continue;
                }
                WalkIssue::Dangling(visited) => visited,
            },
        };
        if !visit(visited) {
            break;
        }
    }
    Ok(())
}

enum WalkIssue {
    Skipped(FsError),
    /// A link whose target is gone; still listed, as `Other`.
    Dangling(Visited),
}

fn walk_error(root: &Path, err: &ignore::Error) -> Result<WalkIssue, FsError> {
    let path = error_path(err);
    let rel = path.map(|p| relative(root, p)).unwrap_or_default();
    if err.depth() == Some(0) || path == Some(root) {
        return Err(match err.io_error() {
            Some(io) => fs_error_from_io(io, &root.display().to_string()),
            None => FsError::new(ErrorKind::BackendUnavailable, err.to_string()),
        });
    }
    if is_loop(err) {
        return Ok(WalkIssue::Skipped(FsError::skipped(rel, "symbolic link loop, not followed")));
    }
    if let Some(io) = err.io_error()
        && io.kind() == std::io::ErrorKind::NotFound
        && let Some(path) = path
        && path.symlink_metadata().is_ok_and(|m| m.file_type().is_symlink())
    {
        let depth = rel.split('/').count();
        return Ok(WalkIssue::Dangling(Visited {
            rel,
            depth,
            kind: EntryKind::Other,
            metadata: None,
        }));
    }
    let cause = err.io_error().map_or_else(|| err.to_string(), ToString::to_string);
    Ok(WalkIssue::Skipped(FsError::skipped(rel, cause)))
}

fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::Loop { child, .. } => Some(child),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        _ => None,
    }
}

fn is_loop(err: &ignore::Error) -> bool {
    match err {
        ignore::Error::Loop { .. } => true,
        ignore::Error::WithPath { err, .. }
        | ignore::Error::WithDepth { err, .. }
        | ignore::Error::WithLineNumber { err, .. } => is_loop(err),
        _ => false,
    }
}

const fn kind_of(is_dir: bool, is_file: bool) -> EntryKind {
    if is_dir {
        EntryKind::Directory
    } else if is_file {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

/// `path` relative to `root`, `/`-separated.
fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn modified_ms(meta: &Metadata) -> Option<i64> {
    let since = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since.as_millis()).ok()
}

fn file_name(root: &Path) -> String {
    root.file_name()
        .map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn root_metadata(root: &Path) -> Result<Metadata, FsError> {
    std::fs::metadata(root).map_err(|err| fs_error_from_io(&err, &root.display().to_string()))
}

/// Immediate children of `root`, or `root` itself when it is a file.
pub fn list(root: &Path, budget: &Budget) -> Result<RawOutput, FsError> {
    let meta = root_metadata(root)?;
    if !meta.is_dir() {
        let entry = Entry::new(file_name(root), kind_of(false, meta.is_file()))
            .with_size(Some(meta.len()))
            .with_modified(modified_ms(&meta));
        return Ok(RawOutput::new(RawResult::Entries(vec![entry])));
    }

    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    walk(root, Some(1), budget, &mut skipped, |visited| {
        entries.push(visited.into_entry());
        true
    })?;
    Ok(RawOutput {
        result: RawResult::Entries(entries),
        skipped,
        truncated: false,
    })
}

/// The hierarchy below `root` down to `depth`, with a root node named `label`.
pub fn tree(root: &Path, label: &str, depth: usize, budget: &Budget) -> Result<RawOutput, FsError> {
    let meta = root_metadata(root)?;
    if !meta.is_dir() {
        let leaf = TreeNode::leaf(label, kind_of(false, meta.is_file()));
        return Ok(RawOutput::new(RawResult::Tree(leaf)));
    }

    let mut stack = vec![TreeNode::leaf(label, EntryKind::Directory)];
    let mut skipped = Vec::new();
    walk(root, Some(depth), budget, &mut skipped, |visited| {
        fold_to(&mut stack, visited.depth);
        let name = visited
            .rel
            .rsplit('/')
            .next()
            .unwrap_or(&visited.rel)
            .to_string();
        let node = TreeNode::leaf(name, visited.kind);
        if visited.kind.is_dir() {
            stack.push(node);
        } else if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        }
        true
    })?;
    fold_to(&mut stack, 1);
    let root_node = stack
        .pop()
        .unwrap_or_else(|| TreeNode::leaf(label, EntryKind::Directory));
    Ok(RawOutput {
        result: RawResult::Tree(root_node),
        skipped,
        truncated: false,
    })
}

fn fold_to(stack: &mut Vec<TreeNode>, len: usize) {
    while stack.len() > len {
        if let Some(done) = stack.pop()
            && let Some(parent) = stack.last_mut()
        {
            parent.children.push(done);
        }
    }
}

/// Filename query shared by file search and content-search candidate
/// enumeration.
#[derive(Debug, Clone)]
pub struct FileQuery {
    pub pattern: Pattern,
    pub max_depth: Option<usize>,
    /// Stop (and flag truncation) after this many matching files.
    pub max_files: usize,
}

/// Regular files below `root` whose relative path satisfies the pattern.
pub fn find_files(root: &Path, query: &FileQuery, budget: &Budget) -> Result<RawOutput, FsError> {
    let meta = root_metadata(root)?;
    if !meta.is_dir() {
        let name = file_name(root);
        let entries = if meta.is_file() && query.pattern.matches(&name) {
            vec![
                Entry::new(name, EntryKind::File)
                    .with_size(Some(meta.len()))
                    .with_modified(modified_ms(&meta)),
            ]
        } else {
            Vec::new()
        };
        return Ok(RawOutput::new(RawResult::Entries(entries)));
    }

    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    let mut truncated = false;
    walk(root, query.max_depth, budget, &mut skipped, |visited| {
        if visited.kind != EntryKind::File || !query.pattern.matches(&visited.rel) {
            return true;
        }
        if entries.len() >= query.max_files {
            truncated = true;
            return false;
        }
        entries.push(visited.into_entry());
        true
    })?;
    Ok(RawOutput {
        result: RawResult::Entries(entries),
        skipped,
        truncated,
    })
}

/// Directory that candidate paths from [`find_files`] are relative to.
#[must_use]
pub fn content_base(root: &Path) -> PathBuf {
    if root.is_file() {
        root.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        root.to_path_buf()
    }
}

/// Literal, optionally case-insensitive line matcher. Every backend's spans
/// come from here so they agree byte for byte.
#[derive(Debug, Clone)]
pub struct LineMatcher {
    regex: Regex,
    /// Same expression over raw bytes, for lines that are not UTF-8.
    raw: ByteRegex,
}

impl LineMatcher {
    pub fn new(text: &str, case_insensitive: bool) -> Result<Self, FsError> {
        let escaped = regex::escape(text);
        let unsupported =
            |err: regex::Error| FsError::new(ErrorKind::UnsupportedPattern, err.to_string());
        let regex = RegexBuilder::new(&escaped)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(unsupported)?;
        let raw = ByteRegexBuilder::new(&escaped)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(unsupported)?;
        Ok(Self { regex, raw })
    }

    /// Whether an undecodable line contains the text.
    #[must_use]
    pub fn matches_raw(&self, line: &[u8]) -> bool {
        self.raw.is_match(line)
    }

    #[must_use]
    pub fn spans(&self, line: &str) -> Vec<MatchSpan> {
        self.regex
            .find_iter(line)
            .map(|m| MatchSpan {
                start: m.start(),
                end: m.end(),
            })
            .collect()
    }

    /// Recompute spans for native records, dropping lines with none.
    #[must_use]
    pub fn fill_spans(&self, records: Vec<MatchRecord>) -> Vec<MatchRecord> {
        records
            .into_iter()
            .filter_map(|mut record| {
                record.spans = self.spans(&record.line);
                (!record.spans.is_empty()).then_some(record)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContentLimits {
    /// Stop (and flag truncation) once this many matches are collected.
    pub max_results: usize,
    pub max_file_size: u64,
}

/// Scan `candidates` (relative to `base`) line by line.
pub fn search_content(
    base: &Path,
    candidates: &[String],
    matcher: &LineMatcher,
    limits: ContentLimits,
    budget: &Budget,
) -> Result<RawOutput, FsError> {
    let mut matches = Vec::new();
    let mut skipped = Vec::new();
    let mut truncated = false;

    'files: for rel in candidates {
        budget.check()?;
        let path = base.join(rel);
        let bytes = match read_candidate(&path, limits.max_file_size) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                skipped.push(FsError::skipped(
                    rel,
                    format!("larger than {} bytes", limits.max_file_size),
                ));
                continue;
            }
            Err(err) => {
                skipped.push(FsError::skipped(rel, err.to_string()));
                continue;
            }
        };
        if is_binary(&bytes) {
            skipped.push(FsError::skipped(rel, BINARY_FILE));
            continue;
        }

        // Undecodable lines are dropped one by one; the file is reported once
        // if any of them would have matched.
        let mut reported = false;
        for (idx, raw) in lines(&bytes).enumerate() {
            let Ok(line) = std::str::from_utf8(raw) else {
                if !reported && matcher.matches_raw(raw) {
                    reported = true;
                    skipped.push(FsError::skipped(rel, NOT_UTF8));
                }
                continue;
            };
            let spans = matcher.spans(line);
            if spans.is_empty() {
                continue;
            }
            if matches.len() >= limits.max_results {
                truncated = true;
                break 'files;
            }
            matches.push(MatchRecord {
                path: rel.clone(),
                line_number: idx as u64 + 1,
                line: line.to_string(),
                spans,
            });
        }
    }

    Ok(RawOutput {
        result: RawResult::Matches(matches),
        skipped,
        truncated,
    })
}

/// `Ok(None)` when the file exceeds `max_size`.
fn read_candidate(path: &Path, max_size: u64) -> std::io::Result<Option<Vec<u8>>> {
    if std::fs::metadata(path)?.len() > max_size {
        return Ok(None);
    }
    std::fs::read(path).map(Some)
}

/// Content search treats a file with a NUL byte as binary.
#[must_use]
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.contains(&0)
}

/// Lines split on `\n` with one trailing `\r` removed; no phantom line after
/// a final newline.
fn lines(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    bytes
        .strip_suffix(b"\n")
        .unwrap_or(bytes)
        .split(|&b| b == b'\n')
        .filter(move |_| !bytes.is_empty())
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}
