//! Result normalization: one output shape regardless of backend.

use std::cmp::Ordering;

use lookout_types::{
    Entry, EntryKind, ErrorKind, FsError, GlyphSet, MatchRecord, PathStyle, ToolResult,
    TreeGlyphs, tree_glyphs,
};
use unicode_normalization::UnicodeNormalization;

pub const TRUNCATION_MARKER: &str = "... (output truncated)";

/// One node of a directory hierarchy, before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub kind: EntryKind,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    #[must_use]
    pub fn leaf(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
        }
    }

    fn sort_recursive(&mut self) {
        self.children
            .sort_by_cached_key(|child| sort_key(&child.name));
        for child in &mut self.children {
            child.sort_recursive();
        }
    }
}

/// Backend output in internal form: root-relative `/`-separated paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResult {
    Entries(Vec<Entry>),
    Matches(Vec<MatchRecord>),
    Tree(TreeNode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub result: RawResult,
    pub skipped: Vec<FsError>,
    /// Set when the backend itself stopped early (file cap).
    pub truncated: bool,
}

impl RawOutput {
    #[must_use]
    pub const fn new(result: RawResult) -> Self {
        Self {
            result,
            skipped: Vec::new(),
            truncated: false,
        }
    }
}

/// Which kind of backend produced a [`RawOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Native order is trusted.
    Native,
    /// Re-sorted component-wise.
    Fallback,
}

/// The normalized result plus its partial-failure list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub result: ToolResult,
    pub partial: Vec<FsError>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    pub path_style: PathStyle,
    pub glyphs: GlyphSet,
    /// Maximum entries, matches, or rendered tree lines.
    pub limit: usize,
}

impl Normalizer {
    #[must_use]
    pub fn normalize(&self, raw: RawOutput, origin: Origin) -> Normalized {
        let RawOutput {
            result,
            skipped,
            truncated,
        } = raw;
        let mut partial: Vec<FsError> = skipped
            .into_iter()
            .map(|mut err| {
                if let Some(path) = err.path.take() {
                    err.path = Some(self.path_style.apply(&path));
                }
                err
            })
            .collect();
        partial.dedup();

        let (result, limited) = match result {
            RawResult::Entries(mut entries) => {
                if origin == Origin::Fallback {
                    entries.sort_by_cached_key(|e| path_key(&e.path));
                }
                let limited = truncate(&mut entries, self.limit);
                for entry in &mut entries {
                    entry.path = self.path_style.apply(&entry.path);
                }
                (ToolResult::Entries(entries), limited)
            }
            RawResult::Matches(mut matches) => {
                if origin == Origin::Fallback {
                    matches.sort_by(compare_matches);
                }
                let limited = truncate(&mut matches, self.limit);
                for record in &mut matches {
                    record.path = self.path_style.apply(&record.path);
                }
                (ToolResult::Matches(matches), limited)
            }
            RawResult::Tree(mut root) => {
                root.sort_recursive();
                let (text, limited) = render_tree(&root, tree_glyphs(self.glyphs), self.limit);
                (ToolResult::Tree(text), limited)
            }
        };

        Normalized {
            result,
            partial,
            truncated: truncated || limited,
        }
    }
}

fn truncate<T>(items: &mut Vec<T>, limit: usize) -> bool {
    if items.len() > limit {
        items.truncate(limit);
        true
    } else {
        false
    }
}

fn sort_key(name: &str) -> String {
    name.nfc().collect()
}

/// Component-wise key: `a/b` sorts before `a.b`, giving depth-first pre-order.
fn path_key(path: &str) -> Vec<String> {
    path.split('/').map(sort_key).collect()
}

fn compare_matches(a: &MatchRecord, b: &MatchRecord) -> Ordering {
    path_key(&a.path)
        .cmp(&path_key(&b.path))
        .then(a.line_number.cmp(&b.line_number))
}

/// Render a tree whose root line is `root.name`. Directories get a `/`
/// suffix. At most `max_lines` lines are kept, then a truncation marker.
#[must_use]
pub fn render_tree(root: &TreeNode, glyphs: TreeGlyphs, max_lines: usize) -> (String, bool) {
    let mut lines = vec![display_name(&root.name, root.kind)];
    render_children(&root.children, "", glyphs, &mut lines);

    let truncated = lines.len() > max_lines;
    if truncated {
        lines.truncate(max_lines);
        lines.push(TRUNCATION_MARKER.to_string());
    }
    (lines.join("\n"), truncated)
}

fn render_children(children: &[TreeNode], prefix: &str, glyphs: TreeGlyphs, out: &mut Vec<String>) {
    for (idx, child) in children.iter().enumerate() {
        let last = idx + 1 == children.len();
        let branch = if last { glyphs.last_branch } else { glyphs.branch };
        out.push(format!("{prefix}{branch}{}", display_name(&child.name, child.kind)));
        if !child.children.is_empty() {
            let extension = if last { glyphs.blank } else { glyphs.pipe };
            render_children(&child.children, &format!("{prefix}{extension}"), glyphs, out);
        }
    }
}

fn display_name(name: &str, kind: EntryKind) -> String {
    if kind.is_dir() && !name.ends_with(['/', '\\']) {
        format!("{name}/")
    } else {
        name.to_string()
    }
}

/// Map an IO failure onto the result taxonomy.
#[must_use]
pub fn fs_error_from_io(err: &std::io::Error, path: &str) -> FsError {
    let kind = match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound,
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
        _ => ErrorKind::BackendUnavailable,
    };
    FsError::new(kind, format!("{path}: {err}")).with_path(path)
}

#[cfg(test)]
mod tests {
    use super::{
        Normalizer, Origin, RawOutput, RawResult, TRUNCATION_MARKER, TreeNode, fs_error_from_io,
        render_tree,
    };
    use lookout_types::{
        Entry, EntryKind, ErrorKind, FsError, GlyphSet, MatchRecord, PathStyle, ToolResult,
        tree_glyphs,
    };

    fn normalizer(style: PathStyle, limit: usize) -> Normalizer {
        Normalizer {
            path_style: style,
            glyphs: GlyphSet::Unicode,
            limit,
        }
    }

    fn entries(paths: &[&str]) -> RawOutput {
        RawOutput::new(RawResult::Entries(
            paths.iter().map(|p| Entry::new(*p, EntryKind::File)).collect(),
        ))
    }

    fn paths(result: &ToolResult) -> Vec<&str> {
        match result {
            ToolResult::Entries(entries) => entries.iter().map(|e| e.path.as_str()).collect(),
            ToolResult::Matches(matches) => matches.iter().map(|m| m.path.as_str()).collect(),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn fallback_entries_sort_component_wise() {
        let n = normalizer(PathStyle::Posix, 100);
        let out = n.normalize(entries(&["a.b", "a/b", "B", "a"]), Origin::Fallback);
        assert_eq!(paths(&out.result), vec!["B", "a", "a/b", "a.b"]);
        assert!(!out.truncated);
    }

    #[test]
    fn native_order_is_kept() {
        let n = normalizer(PathStyle::Posix, 100);
        let out = n.normalize(entries(&["z", "a"]), Origin::Native);
        assert_eq!(paths(&out.result), vec!["z", "a"]);
    }

    #[test]
    fn decomposed_names_sort_like_composed() {
        let n = normalizer(PathStyle::Posix, 100);
        // "é" decomposed (e + combining acute) vs "f"
        let out = n.normalize(entries(&["f", "e\u{301}"]), Origin::Fallback);
        assert_eq!(paths(&out.result), vec!["f", "e\u{301}"]);
    }

    #[test]
    fn windows_style_applies_to_paths_and_partials() {
        let n = normalizer(PathStyle::Windows, 100);
        let mut raw = entries(&["sub/a.txt"]);
        raw.skipped.push(FsError::skipped("sub/locked", "permission denied"));
        let out = n.normalize(raw, Origin::Native);
        assert_eq!(paths(&out.result), vec!["sub\\a.txt"]);
        assert_eq!(out.partial[0].path.as_deref(), Some("sub\\locked"));
    }

    #[test]
    fn limit_truncates_and_flags() {
        let n = normalizer(PathStyle::Posix, 2);
        let out = n.normalize(entries(&["a", "b", "c"]), Origin::Fallback);
        assert_eq!(paths(&out.result), vec!["a", "b"]);
        assert!(out.truncated);
    }

    #[test]
    fn fallback_matches_sort_by_path_then_line() {
        let record = |path: &str, line_number| MatchRecord {
            path: path.into(),
            line_number,
            line: String::new(),
            spans: Vec::new(),
        };
        let raw = RawOutput::new(RawResult::Matches(vec![
            record("b.txt", 1),
            record("a.txt", 9),
            record("a.txt", 2),
        ]));
        let out = normalizer(PathStyle::Posix, 10).normalize(raw, Origin::Fallback);
        let ToolResult::Matches(matches) = out.result else {
            panic!("expected matches");
        };
        let order: Vec<(&str, u64)> = matches
            .iter()
            .map(|m| (m.path.as_str(), m.line_number))
            .collect();
        assert_eq!(order, vec![("a.txt", 2), ("a.txt", 9), ("b.txt", 1)]);
    }

    #[test]
    fn tree_renders_sorted_with_dir_suffix() {
        let root = TreeNode {
            name: "R".into(),
            kind: EntryKind::Directory,
            children: vec![
                TreeNode::leaf("x.txt", EntryKind::File),
                TreeNode {
                    name: "d".into(),
                    kind: EntryKind::Directory,
                    children: vec![TreeNode::leaf("y.txt", EntryKind::File)],
                },
            ],
        };
        let out = normalizer(PathStyle::Posix, 200)
            .normalize(RawOutput::new(RawResult::Tree(root)), Origin::Native);
        let ToolResult::Tree(text) = out.result else {
            panic!("expected tree");
        };
        assert_eq!(text, "R/\n├── d/\n│   └── y.txt\n└── x.txt");
    }

    #[test]
    fn ascii_tree_and_truncation_marker() {
        let root = TreeNode {
            name: "R/".into(),
            kind: EntryKind::Directory,
            children: (0..5)
                .map(|i| TreeNode::leaf(format!("f{i}"), EntryKind::File))
                .collect(),
        };
        let (text, truncated) = render_tree(&root, tree_glyphs(GlyphSet::Ascii), 3);
        assert!(truncated);
        assert_eq!(text, format!("R/\n|-- f0\n|-- f1\n{TRUNCATION_MARKER}"));
    }

    #[test]
    fn io_errors_map_to_taxonomy() {
        let cases = [
            (std::io::ErrorKind::NotFound, ErrorKind::NotFound),
            (std::io::ErrorKind::PermissionDenied, ErrorKind::PermissionDenied),
            (std::io::ErrorKind::TimedOut, ErrorKind::Timeout),
            (std::io::ErrorKind::Other, ErrorKind::BackendUnavailable),
        ];
        for (io, expected) in cases {
            let err = fs_error_from_io(&std::io::Error::from(io), "x");
            assert_eq!(err.kind, expected);
            assert_eq!(err.path.as_deref(), Some("x"));
        }
    }
}
