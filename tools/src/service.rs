//! [`FsTools`]: the list, tree and search operations.
//!
//! Every call follows the same path: select a backend for the operation,
//! run the native adapter if one was chosen, retry exactly once through the
//! portable fallback when the adapter reports a recoverable failure, then
//! normalize. Only a failing fallback surfaces as an error result.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lookout_types::{
    BackendReport, Entry, EntryKind, FsError, MatchRecord, PathStyle, ToolResponse,
};
use tokio::time::Instant;

use crate::adapters::{
    AdapterOutcome, BATCH_SIZE, Invocation, NativeOutput, TextQuery, dir, find, findstr, grep, ls,
    ripgrep, tree, tree_com,
};
use crate::config::{ToolSettings, millis};
use crate::fallback::{self, Budget, ContentLimits, FileQuery, LineMatcher};
use crate::normalize::{Normalizer, Origin, RawOutput, RawResult, TreeNode, fs_error_from_io};
use crate::pattern::{Pattern, PatternOptions};
use crate::platform::{NativeTool, Platform};
use crate::process::run_native;
use crate::selector::{BackendPreference, Operation, Selection, Strategy, select_with};

const ROOT_IS_FILE: &str = "root is a file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub path: PathBuf,
    /// Overrides the configured preference.
    pub backend: Option<BackendPreference>,
}

impl ListRequest {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backend: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRequest {
    pub path: PathBuf,
    /// Clamped to the configured range; `None` uses the default depth.
    pub depth: Option<usize>,
    /// Root line of the rendered tree. Defaults to `path` as given.
    pub label: Option<String>,
    pub backend: Option<BackendPreference>,
}

impl TreeRequest {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            depth: None,
            label: None,
            backend: None,
        }
    }
}

/// Filename search, or content search when `text` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub path: PathBuf,
    pub pattern: Option<String>,
    pub text: Option<String>,
    /// `None` uses the configured default.
    pub case_insensitive: Option<bool>,
    pub recursive: bool,
    /// Deepest level searched when recursive; 1 is the root's children.
    pub depth: Option<usize>,
    pub backend: Option<BackendPreference>,
}

impl SearchRequest {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pattern: None,
            text: None,
            case_insensitive: None,
            recursive: true,
            depth: None,
            backend: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootKind {
    Directory,
    File,
}

/// The file-inspection tools bound to one platform and one set of settings.
#[derive(Debug, Clone)]
pub struct FsTools {
    platform: Arc<Platform>,
    settings: ToolSettings,
}

impl FsTools {
    #[must_use]
    pub fn new(platform: Arc<Platform>, settings: ToolSettings) -> Self {
        Self { platform, settings }
    }

    /// Bound to the process-wide detected platform.
    #[must_use]
    pub fn detected(settings: ToolSettings) -> Self {
        Self::new(Platform::current(), settings)
    }

    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    #[must_use]
    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    #[must_use]
    pub fn path_style(&self) -> PathStyle {
        self.settings
            .path_style
            .unwrap_or_else(|| self.platform.path_style())
    }

    pub async fn list(&self, request: &ListRequest) -> ToolResponse {
        let selection = self.select(Operation::List, request.backend);
        let root = match inspect_root(&request.path).await {
            Ok((root, RootKind::Directory)) => root,
            Ok((root, RootKind::File)) => {
                return self
                    .list_at(root, Selection::fallback(Operation::List, ROOT_IS_FILE))
                    .await;
            }
            Err(err) => return ToolResponse::error(err, report(&selection)),
        };
        self.list_at(root, selection).await
    }

    async fn list_at(&self, root: PathBuf, selection: Selection) -> ToolResponse {
        let config = self.settings.list;
        let timeout = millis(config.native_timeout_ms);
        let native = match selection.strategy {
            Strategy::Native(tool) => {
                let deadline = Instant::now() + timeout;
                let outcome = match tool {
                    NativeTool::Ls => {
                        self.run(tool, |exe| ls::invocation(exe, &root), deadline, |out| {
                            ls::parse(&root, out)
                        })
                        .await
                    }
                    NativeTool::CmdDir => {
                        self.run(
                            tool,
                            |exe| dir::list_invocation(exe, &root),
                            deadline,
                            dir::parse_list,
                        )
                        .await
                    }
                    other => AdapterOutcome::recoverable(format!("{other} cannot list directories")),
                };
                Some(outcome.map(|entries| RawOutput::new(RawResult::Entries(entries))))
            }
            Strategy::Fallback => None,
        };
        self.complete(selection, native, config.max_entries, timeout, move |budget| {
            fallback::list(&root, budget)
        })
        .await
    }

    pub async fn tree(&self, request: &TreeRequest) -> ToolResponse {
        let mut selection = self.select(Operation::Tree, request.backend);
        let root = match inspect_root(&request.path).await {
            Ok((root, RootKind::Directory)) => root,
            Ok((root, RootKind::File)) => {
                selection = Selection::fallback(Operation::Tree, ROOT_IS_FILE);
                root
            }
            Err(err) => return ToolResponse::error(err, report(&selection)),
        };
        let config = self.settings.tree;
        let depth = config.effective_depth(request.depth);
        let label = request
            .label
            .clone()
            .unwrap_or_else(|| request.path.display().to_string());
        let timeout = millis(config.native_timeout_ms);

        let native = match selection.strategy {
            Strategy::Native(tool) => {
                let deadline = Instant::now() + timeout;
                let outcome = match tool {
                    NativeTool::Tree => {
                        self.run(tool, |exe| tree::invocation(exe, &root, depth), deadline, |out| {
                            tree::parse(&root, out)
                        })
                        .await
                    }
                    NativeTool::TreeCom => {
                        self.run(tool, |exe| tree_com::invocation(exe, &root), deadline, |out| {
                            tree_com::parse(out, depth)
                        })
                        .await
                    }
                    other => AdapterOutcome::recoverable(format!("{other} cannot render trees")),
                };
                Some(outcome.map(|children| {
                    RawOutput::new(RawResult::Tree(TreeNode {
                        name: label.clone(),
                        kind: EntryKind::Directory,
                        children,
                    }))
                }))
            }
            Strategy::Fallback => None,
        };
        self.complete(selection, native, config.max_lines, timeout, move |budget| {
            fallback::tree(&root, &label, depth, budget)
        })
        .await
    }

    pub async fn search(&self, request: &SearchRequest) -> ToolResponse {
        let text = request.text.as_deref().filter(|text| !text.is_empty());
        let operation = if text.is_some() {
            Operation::ContentSearch
        } else {
            Operation::FileSearch
        };
        let mut selection = self.select(operation, request.backend);
        let case_insensitive = request
            .case_insensitive
            .unwrap_or(self.settings.case_insensitive);
        let pattern = match Pattern::compile_with(
            request.pattern.as_deref().unwrap_or(""),
            PatternOptions { case_insensitive },
        ) {
            Ok(pattern) => pattern,
            Err(err) => return ToolResponse::error(err.into(), report(&selection)),
        };
        tracing::debug!(
            pattern = pattern.source(),
            recursive = pattern.is_recursive(),
            case_insensitive = pattern.is_case_insensitive(),
            "Pattern compiled"
        );
        let root = match inspect_root(&request.path).await {
            Ok((root, RootKind::Directory)) => root,
            Ok((root, RootKind::File)) => {
                selection = Selection::fallback(operation, ROOT_IS_FILE);
                root
            }
            Err(err) => return ToolResponse::error(err, report(&selection)),
        };

        let query = FileQuery {
            pattern,
            max_depth: if request.recursive {
                request.depth.map(|depth| depth.max(1))
            } else {
                Some(1)
            },
            max_files: self.settings.search.max_files,
        };
        match text {
            None => {
                self.search_files(selection, root, query, request.recursive)
                    .await
            }
            Some(text) => {
                let query_text = TextQuery {
                    text,
                    case_insensitive,
                };
                self.search_content(selection, root, query, query_text)
                    .await
            }
        }
    }

    async fn search_files(
        &self,
        selection: Selection,
        root: PathBuf,
        query: FileQuery,
        recursive: bool,
    ) -> ToolResponse {
        let config = self.settings.search;
        let native = match selection.strategy {
            Strategy::Native(tool) => {
                let deadline = Instant::now() + millis(config.native_timeout_ms);
                let outcome = match tool {
                    NativeTool::Ripgrep => {
                        self.run(
                            tool,
                            |exe| ripgrep::files_invocation(exe, &root, query.max_depth),
                            deadline,
                            ripgrep::parse_files,
                        )
                        .await
                    }
                    NativeTool::Find => {
                        self.run(
                            tool,
                            |exe| find::invocation(exe, &root, query.max_depth),
                            deadline,
                            find::parse,
                        )
                        .await
                    }
                    NativeTool::CmdDir => {
                        self.run(
                            tool,
                            |exe| dir::search_invocation(exe, &root, recursive),
                            deadline,
                            |out| dir::parse_search(&root, recursive, out),
                        )
                        .await
                    }
                    other => AdapterOutcome::recoverable(format!("{other} cannot list files")),
                };
                Some(outcome.map(|paths| filter_files(paths, &query)))
            }
            Strategy::Fallback => None,
        };
        self.complete(
            selection,
            native,
            config.max_results,
            millis(config.fallback_timeout_ms),
            move |budget| fallback::find_files(&root, &query, budget),
        )
        .await
    }

    async fn search_content(
        &self,
        selection: Selection,
        root: PathBuf,
        query: FileQuery,
        text: TextQuery<'_>,
    ) -> ToolResponse {
        let config = self.settings.search;
        let matcher = match LineMatcher::new(text.text, text.case_insensitive) {
            Ok(matcher) => matcher,
            Err(err) => return ToolResponse::error(err, report(&selection)),
        };
        let fallback_timeout = millis(config.fallback_timeout_ms);

        // Candidates are enumerated in-process for every backend, so native
        // tools only ever scan content.
        let walk_root = root.clone();
        let candidates = match fallback::run_blocking(Some(fallback_timeout), move |budget| {
            fallback::find_files(&walk_root, &query, budget)
        })
        .await
        {
            Ok(raw) => raw,
            Err(err) => return ToolResponse::error(err, report(&selection)),
        };
        let (paths, skipped, truncated) = split_candidates(candidates, config.max_file_size_bytes);
        tracing::debug!(candidates = paths.len(), skipped = skipped.len(), "Content search candidates");
        let base = fallback::content_base(&root);

        let native = match selection.strategy {
            Strategy::Native(tool) => {
                let deadline = Instant::now() + millis(config.native_timeout_ms);
                let outcome = self
                    .content_native(tool, &base, text, &paths, &matcher, config.max_results, deadline)
                    .await;
                Some(outcome.map(|matches| RawOutput {
                    result: RawResult::Matches(matches),
                    skipped: skipped.clone(),
                    truncated,
                }))
            }
            Strategy::Fallback => None,
        };
        let limits = ContentLimits {
            max_results: config.max_results,
            max_file_size: config.max_file_size_bytes,
        };
        self.complete(selection, native, config.max_results, fallback_timeout, move |budget| {
            let mut raw = fallback::search_content(&base, &paths, &matcher, limits, budget)?;
            let mut all_skipped = skipped;
            all_skipped.append(&mut raw.skipped);
            raw.skipped = all_skipped;
            raw.truncated |= truncated;
            Ok(raw)
        })
        .await
    }

    /// Feed `paths` to the native tool in batches; any unusable batch makes
    /// the whole run recoverable.
    #[allow(clippy::too_many_arguments)]
    async fn content_native(
        &self,
        tool: NativeTool,
        root: &Path,
        text: TextQuery<'_>,
        paths: &[String],
        matcher: &LineMatcher,
        limit: usize,
        deadline: Instant,
    ) -> AdapterOutcome<Vec<MatchRecord>> {
        let refused = match tool {
            NativeTool::Grep => grep::unsupported(text),
            NativeTool::Findstr => findstr::unsupported(text),
            _ => None,
        };
        if let Some(cause) = refused {
            return AdapterOutcome::Recoverable(cause);
        }

        let mut matches = Vec::new();
        let mut skipped = Vec::new();
        for batch in paths.chunks(BATCH_SIZE) {
            let outcome = match tool {
                NativeTool::Ripgrep => {
                    self.run(
                        tool,
                        |exe| ripgrep::content_invocation(exe, root, text, batch),
                        deadline,
                        ripgrep::parse_content,
                    )
                    .await
                }
                NativeTool::Grep => {
                    self.run(tool, |exe| grep::invocation(exe, root, text, batch), deadline, |out| {
                        grep::parse(out, batch)
                    })
                    .await
                }
                NativeTool::Findstr => {
                    self.run(
                        tool,
                        |exe| findstr::invocation(exe, root, text, batch),
                        deadline,
                        |out| findstr::parse(out, batch),
                    )
                    .await
                }
                other => AdapterOutcome::recoverable(format!("{other} cannot search contents")),
            };
            match outcome {
                AdapterOutcome::Parsed {
                    value,
                    skipped: batch_skipped,
                } => {
                    let spanned = matcher.fill_spans(value);
                    let found = drop_binary_matches(root, spanned, &mut skipped).await;
                    matches.extend(found);
                    skipped.extend(batch_skipped);
                }
                AdapterOutcome::Recoverable(cause) => return AdapterOutcome::Recoverable(cause),
            }
            if matches.len() > limit {
                break;
            }
        }
        AdapterOutcome::Parsed {
            value: matches,
            skipped,
        }
    }

    fn select(&self, operation: Operation, preference: Option<BackendPreference>) -> Selection {
        let selection = select_with(
            operation,
            &self.platform,
            preference.unwrap_or(self.settings.backend),
        );
        tracing::debug!(
            operation = operation.as_str(),
            backend = selection.strategy.name(),
            reason = %selection.reason,
            "Backend selected"
        );
        selection
    }

    fn normalizer(&self, limit: usize) -> Normalizer {
        Normalizer {
            path_style: self.path_style(),
            glyphs: self.settings.glyphs,
            limit,
        }
    }

    /// Spawn one native tool and parse its output. Spawn failures and
    /// timeouts are recoverable like any other adapter failure.
    async fn run<T, B, P>(
        &self,
        tool: NativeTool,
        build: B,
        deadline: Instant,
        parse: P,
    ) -> AdapterOutcome<T>
    where
        B: FnOnce(&Path) -> Invocation,
        P: FnOnce(&NativeOutput) -> AdapterOutcome<T>,
    {
        let Some(exe) = self.platform.executable(tool) else {
            return AdapterOutcome::recoverable(format!("{tool} is not available"));
        };
        let invocation = build(exe);
        tracing::debug!(
            tool = %tool,
            program = %invocation.program.display(),
            args = ?invocation.args,
            "Running native tool"
        );
        match run_native(&invocation, deadline).await {
            Ok(output) => parse(&output),
            Err(err) => AdapterOutcome::recoverable(err.to_string()),
        }
    }

    /// Resolve the native outcome (or its absence) into a response, running
    /// `fallback` at most once.
    async fn complete<F>(
        &self,
        selection: Selection,
        native: Option<AdapterOutcome<RawOutput>>,
        limit: usize,
        fallback_timeout: Duration,
        fallback: F,
    ) -> ToolResponse
    where
        F: FnOnce(&Budget) -> Result<RawOutput, FsError> + Send + 'static,
    {
        let Selection {
            operation,
            strategy,
            reason,
        } = selection;
        let mut report = BackendReport::new(strategy.name(), reason);

        let outcome = match native {
            Some(AdapterOutcome::Parsed { mut value, skipped }) => {
                value.skipped.extend(skipped);
                Ok((value, Origin::Native))
            }
            Some(AdapterOutcome::Recoverable(cause)) => {
                tracing::warn!(
                    operation = operation.as_str(),
                    backend = %report.backend,
                    %cause,
                    "Native backend failed; retrying with fallback"
                );
                report.backend = Strategy::Fallback.name().to_string();
                report.fallback_cause = Some(cause);
                fallback::run_blocking(Some(fallback_timeout), fallback)
                    .await
                    .map(|raw| (raw, Origin::Fallback))
            }
            None => fallback::run_blocking(Some(fallback_timeout), fallback)
                .await
                .map(|raw| (raw, Origin::Fallback)),
        };

        match outcome {
            Ok((raw, origin)) => {
                let normalized = self.normalizer(limit).normalize(raw, origin);
                ToolResponse {
                    result: normalized.result,
                    partial: normalized.partial,
                    truncated: normalized.truncated,
                    backend: report,
                }
            }
            Err(err) => {
                tracing::warn!(
                    operation = operation.as_str(),
                    kind = %err.kind,
                    cause = %err.cause,
                    "Operation failed"
                );
                ToolResponse::error(err, report)
            }
        }
    }
}

fn report(selection: &Selection) -> BackendReport {
    BackendReport::new(selection.strategy.name(), selection.reason.clone())
}

/// Absolute form of `path`, or the error a caller should see for it.
async fn inspect_root(path: &Path) -> Result<(PathBuf, RootKind), FsError> {
    let shown = path.display().to_string();
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|err| fs_error_from_io(&err, &shown))?;
    let absolute = std::path::absolute(path).map_err(|err| fs_error_from_io(&err, &shown))?;
    let kind = if meta.is_dir() {
        RootKind::Directory
    } else {
        RootKind::File
    };
    Ok((absolute, kind))
}

/// Apply depth, pattern and file cap to a native file listing.
fn filter_files(paths: Vec<String>, query: &FileQuery) -> RawOutput {
    let mut entries = Vec::new();
    let mut truncated = false;
    let match_all = query.pattern.is_match_all();
    for path in paths {
        let within_depth = query
            .max_depth
            .is_none_or(|depth| path.split('/').count() <= depth);
        if !within_depth || !(match_all || query.pattern.matches(&path)) {
            continue;
        }
        if entries.len() >= query.max_files {
            truncated = true;
            break;
        }
        entries.push(Entry::new(path, EntryKind::File));
    }
    RawOutput {
        result: RawResult::Entries(entries),
        skipped: Vec::new(),
        truncated,
    }
}

/// rg searches binary files named on its command line; keep only matches
/// from files the fallback would scan too.
async fn drop_binary_matches(
    root: &Path,
    records: Vec<MatchRecord>,
    skipped: &mut Vec<FsError>,
) -> Vec<MatchRecord> {
    let mut scannable: HashMap<String, bool> = HashMap::new();
    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        let keep = match scannable.get(&record.path) {
            Some(&keep) => keep,
            None => {
                let keep = match tokio::fs::read(root.join(&record.path)).await {
                    Ok(bytes) if fallback::is_binary(&bytes) => {
                        skipped.push(FsError::skipped(&record.path, fallback::BINARY_FILE));
                        false
                    }
                    Ok(_) => true,
                    Err(err) => {
                        skipped.push(FsError::skipped(&record.path, err.to_string()));
                        false
                    }
                };
                scannable.insert(record.path.clone(), keep);
                keep
            }
        };
        if keep {
            kept.push(record);
        }
    }
    kept
}

/// Candidate paths small enough to scan, plus everything skipped so far.
fn split_candidates(raw: RawOutput, max_size: u64) -> (Vec<String>, Vec<FsError>, bool) {
    let RawOutput {
        result,
        mut skipped,
        truncated,
    } = raw;
    let RawResult::Entries(entries) = result else {
        return (Vec::new(), skipped, truncated);
    };
    let mut paths = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.size.is_some_and(|size| size > max_size) {
            skipped.push(FsError::skipped(
                entry.path,
                format!("larger than {max_size} bytes"),
            ));
        } else {
            paths.push(entry.path);
        }
    }
    (paths, skipped, truncated)
}

#[cfg(test)]
mod tests {
    use super::{FsTools, ListRequest, SearchRequest, TreeRequest, filter_files};
    use crate::config::ToolSettings;
    use crate::fallback::FileQuery;
    use crate::pattern::Pattern;
    use crate::platform::{Platform, PlatformFamily};
    use crate::selector::BackendPreference;
    use lookout_types::{ErrorKind, PathStyle, ToolResponse, ToolResult};
    use std::fs;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    fn settings() -> ToolSettings {
        ToolSettings {
            path_style: Some(PathStyle::Posix),
            ..ToolSettings::default()
        }
    }

    fn fallback_tools() -> FsTools {
        FsTools::new(Arc::new(Platform::bare(PlatformFamily::Posix)), settings())
    }

    fn fixture() -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "alpha\nneedle\n").unwrap();
        fs::write(dir.path().join("c.md"), "needle\n").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.txt"), "one Needle\n").unwrap();
        dir
    }

    fn paths(response: &ToolResponse) -> Vec<String> {
        match &response.result {
            ToolResult::Entries(entries) => entries.iter().map(|e| e.path.clone()).collect(),
            ToolResult::Matches(matches) => matches.iter().map(|m| m.path.clone()).collect(),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn tools_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FsTools>();
    }

    #[tokio::test]
    async fn list_without_native_tools_uses_fallback() {
        let dir = fixture();
        let response = fallback_tools().list(&ListRequest::new(dir.path())).await;
        assert_eq!(paths(&response), vec!["a.txt", "c.md", "sub"]);
        assert_eq!(response.backend.backend, "fallback");
        assert!(response.backend.reason.contains("ls not found"));
        assert!(response.backend.fallback_cause.is_none());
    }

    #[tokio::test]
    async fn list_of_empty_directory_is_empty_success() {
        let dir = tempdir().unwrap();
        let response = fallback_tools().list(&ListRequest::new(dir.path())).await;
        assert!(paths(&response).is_empty());
        assert_eq!(response.error_kind(), None);
    }

    #[tokio::test]
    async fn missing_root_is_not_found() {
        let dir = tempdir().unwrap();
        let response = fallback_tools()
            .list(&ListRequest::new(dir.path().join("missing")))
            .await;
        assert_eq!(response.error_kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn file_root_lists_itself() {
        let dir = fixture();
        let response = fallback_tools()
            .list(&ListRequest::new(dir.path().join("a.txt")))
            .await;
        assert_eq!(paths(&response), vec!["a.txt"]);
        assert_eq!(response.backend.reason, "root is a file");
    }

    #[tokio::test]
    async fn list_truncates_at_configured_limit() {
        let dir = fixture();
        let mut settings = settings();
        settings.list.max_entries = 2;
        let tools = FsTools::new(Arc::new(Platform::bare(PlatformFamily::Posix)), settings);
        let response = tools.list(&ListRequest::new(dir.path())).await;
        assert_eq!(paths(&response), vec!["a.txt", "c.md"]);
        assert!(response.truncated);
    }

    #[tokio::test]
    async fn recursive_pattern_search() {
        let dir = fixture();
        let mut request = SearchRequest::new(dir.path());
        request.pattern = Some("*.txt".into());
        let response = fallback_tools().search(&request).await;
        assert_eq!(paths(&response), vec!["a.txt", "sub/b.txt"]);

        request.recursive = false;
        let response = fallback_tools().search(&request).await;
        assert_eq!(paths(&response), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn windows_style_paths() {
        let dir = fixture();
        let mut settings = settings();
        settings.path_style = Some(PathStyle::Windows);
        let tools = FsTools::new(Arc::new(Platform::bare(PlatformFamily::Posix)), settings);
        let mut request = SearchRequest::new(dir.path());
        request.pattern = Some("*.txt".into());
        let response = tools.search(&request).await;
        assert_eq!(paths(&response), vec!["a.txt", "sub\\b.txt"]);
    }

    #[tokio::test]
    async fn malformed_pattern_is_unsupported() {
        let dir = fixture();
        let mut request = SearchRequest::new(dir.path());
        request.pattern = Some("[abc".into());
        let response = fallback_tools().search(&request).await;
        assert_eq!(response.error_kind(), Some(ErrorKind::UnsupportedPattern));
    }

    #[tokio::test]
    async fn content_search_respects_case_flag() {
        let dir = fixture();
        let mut request = SearchRequest::new(dir.path());
        request.pattern = Some("*.txt".into());
        request.text = Some("needle".into());
        let response = fallback_tools().search(&request).await;
        assert_eq!(paths(&response), vec!["a.txt"]);

        request.case_insensitive = Some(true);
        let response = fallback_tools().search(&request).await;
        assert_eq!(paths(&response), vec!["a.txt", "sub/b.txt"]);
        let ToolResult::Matches(matches) = &response.result else {
            panic!("expected matches");
        };
        assert_eq!(matches[0].line_number, 2);
        assert_eq!(matches[1].spans[0].start, 4);
    }

    #[tokio::test]
    async fn tree_renders_with_label_and_depth() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("x.txt"), "").unwrap();
        fs::create_dir(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("d/y.txt"), "").unwrap();

        let mut request = TreeRequest::new(dir.path());
        request.label = Some("R".into());
        let response = fallback_tools().tree(&request).await;
        assert_eq!(
            response.result,
            ToolResult::Tree("R/\n├── d/\n│   └── y.txt\n└── x.txt".into())
        );

        request.depth = Some(1);
        let response = fallback_tools().tree(&request).await;
        assert_eq!(response.result, ToolResult::Tree("R/\n├── d/\n└── x.txt".into()));
    }

    #[tokio::test]
    async fn fallback_preference_skips_native_tools() {
        let dir = fixture();
        let platform = Platform::probe_with(PlatformFamily::Posix, |_| Some("/bin/false".into()));
        let tools = FsTools::new(Arc::new(platform), settings());
        let mut request = ListRequest::new(dir.path());
        request.backend = Some(BackendPreference::Fallback);
        let response = tools.list(&request).await;
        assert_eq!(response.backend.reason, "fallback backend requested");
        assert_eq!(paths(&response).len(), 3);
    }

    #[test]
    fn native_listings_are_filtered_by_depth_and_pattern() {
        let query = FileQuery {
            pattern: Pattern::compile("*.txt").unwrap(),
            max_depth: Some(1),
            max_files: 10,
        };
        let raw = filter_files(vec!["a.txt".into(), "c.md".into(), "sub/b.txt".into()], &query);
        let crate::normalize::RawResult::Entries(entries) = raw.result else {
            panic!("expected entries");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "a.txt");
    }

    #[test]
    fn empty_pattern_keeps_every_file_up_to_the_cap() {
        let query = FileQuery {
            pattern: Pattern::compile("").unwrap(),
            max_depth: None,
            max_files: 2,
        };
        let raw = filter_files(vec!["a.txt".into(), "c.md".into(), "sub/b.txt".into()], &query);
        assert!(raw.truncated);
        let crate::normalize::RawResult::Entries(entries) = raw.result else {
            panic!("expected entries");
        };
        let got: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(got, vec!["a.txt", "c.md"]);
    }

    #[cfg(unix)]
    mod native {
        use super::{fixture, paths, settings};
        use crate::platform::{NativeTool, Platform, PlatformFamily};
        use crate::service::{FsTools, ListRequest, SearchRequest};
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};
        use std::sync::Arc;
        use tempfile::tempdir;

        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn failing_native_tool_retries_through_fallback() {
            let bin = tempdir().unwrap();
            let ls = script(bin.path(), "ls", "echo 'ls: boom' >&2\nexit 2");
            let tools = FsTools::new(
                Arc::new(Platform::new(PlatformFamily::Posix, [(NativeTool::Ls, ls)])),
                settings(),
            );
            let dir = fixture();
            let response = tools.list(&ListRequest::new(dir.path())).await;
            assert_eq!(paths(&response), vec!["a.txt", "c.md", "sub"]);
            assert_eq!(response.backend.backend, "fallback");
            let cause = response.backend.fallback_cause.unwrap();
            assert!(cause.contains("ls: boom"), "{cause}");
        }

        #[tokio::test]
        async fn hanging_native_tool_times_out_into_fallback() {
            let bin = tempdir().unwrap();
            let ls = script(bin.path(), "ls", "sleep 5");
            let mut settings = settings();
            settings.list.native_timeout_ms = 200;
            let tools = FsTools::new(
                Arc::new(Platform::new(PlatformFamily::Posix, [(NativeTool::Ls, ls)])),
                settings,
            );
            let dir = fixture();
            let response = tools.list(&ListRequest::new(dir.path())).await;
            assert_eq!(paths(&response).len(), 3);
            let cause = response.backend.fallback_cause.unwrap();
            assert!(cause.contains("timed out"), "{cause}");
        }

        #[tokio::test]
        async fn native_file_list_is_post_filtered() {
            let bin = tempdir().unwrap();
            let rg = script(bin.path(), "rg", r"printf 'a.txt\0sub/b.txt\0c.md\0'");
            let tools = FsTools::new(
                Arc::new(Platform::new(PlatformFamily::Posix, [(NativeTool::Ripgrep, rg)])),
                settings(),
            );
            let dir = fixture();
            let mut request = SearchRequest::new(dir.path());
            request.pattern = Some("*.txt".into());
            let response = tools.search(&request).await;
            assert_eq!(response.backend.backend, "rg");
            assert_eq!(paths(&response), vec!["a.txt", "sub/b.txt"]);
        }

        #[tokio::test]
        async fn native_content_matches_get_spans() {
            let bin = tempdir().unwrap();
            let grep = script(bin.path(), "grep", "echo 'a.txt:2:needle'");
            let tools = FsTools::new(
                Arc::new(Platform::new(PlatformFamily::Posix, [(NativeTool::Grep, grep)])),
                settings(),
            );
            let dir = fixture();
            let mut request = SearchRequest::new(dir.path());
            request.pattern = Some("a.txt".into());
            request.text = Some("needle".into());
            let response = tools.search(&request).await;
            assert_eq!(response.backend.backend, "grep");
            let lookout_types::ToolResult::Matches(matches) = &response.result else {
                panic!("expected matches");
            };
            assert_eq!(matches.len(), 1);
            assert_eq!(matches[0].spans[0].end, 6);
        }

        #[tokio::test]
        async fn grep_refuses_non_ascii_case_folding() {
            let bin = tempdir().unwrap();
            let grep = script(bin.path(), "grep", "exit 1");
            let tools = FsTools::new(
                Arc::new(Platform::new(PlatformFamily::Posix, [(NativeTool::Grep, grep)])),
                settings(),
            );
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("school.txt"), "ÉCOLE
").unwrap();
            let mut request = SearchRequest::new(dir.path());
            request.text = Some("école".into());
            request.case_insensitive = Some(true);
            let response = tools.search(&request).await;
            assert_eq!(response.backend.backend, "fallback");
            let cause = response.backend.fallback_cause.clone().unwrap();
            assert!(cause.contains("non-ASCII"), "{cause}");
            assert_eq!(paths(&response), vec!["school.txt"]);
        }

        #[tokio::test]
        async fn native_matches_in_binary_files_are_dropped() {
            let bin = tempdir().unwrap();
            let grep = script(bin.path(), "grep", "echo 'a.bin:1:needle'
echo 'b.txt:1:needle'");
            let tools = FsTools::new(
                Arc::new(Platform::new(PlatformFamily::Posix, [(NativeTool::Grep, grep)])),
                settings(),
            );
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("a.bin"), b"needle\0").unwrap();
            fs::write(dir.path().join("b.txt"), "needle\n").unwrap();
            let mut request = SearchRequest::new(dir.path());
            request.text = Some("needle".into());
            let response = tools.search(&request).await;
            assert_eq!(response.backend.backend, "grep");
            assert_eq!(paths(&response), vec!["b.txt"]);
            assert_eq!(response.partial.len(), 1);
            assert_eq!(response.partial[0].path.as_deref(), Some("a.bin"));
            assert_eq!(response.partial[0].cause, crate::fallback::BINARY_FILE);
        }
    }
}
