//! Filesystem nodes and content matches produced by every backend.

use serde::{Deserialize, Serialize};

/// Kind of a filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    /// Sockets, devices, FIFOs, and links whose target could not be resolved.
    Other,
}

impl EntryKind {
    #[must_use]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// One filesystem node, with its path relative to the request root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: String,
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Modification time in unix epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
}

impl Entry {
    #[must_use]
    pub fn new(path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
            size: None,
            modified: None,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_modified(mut self, modified: Option<i64>) -> Self {
        self.modified = modified;
        self
    }

    /// Final path segment. Paths are `/`-separated until normalization.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Byte range `[start, end)` of a match inside [`MatchRecord::line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

/// One matching line found by a content search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub path: String,
    /// 1-based.
    pub line_number: u64,
    /// Line text without its line terminator.
    pub line: String,
    pub spans: Vec<MatchSpan>,
}

#[cfg(test)]
mod tests {
    use super::{Entry, EntryKind};

    #[test]
    fn name_is_last_segment() {
        assert_eq!(Entry::new("a/b/c.txt", EntryKind::File).name(), "c.txt");
        assert_eq!(Entry::new("top", EntryKind::Directory).name(), "top");
    }

    #[test]
    fn optional_metadata_is_omitted_from_json() {
        let entry = Entry::new("a.txt", EntryKind::File);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"path": "a.txt", "kind": "file"}));

        let entry = entry.with_size(Some(12)).with_modified(Some(1_000));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["size"], 12);
        assert_eq!(json["modified"], 1_000);
    }
}
