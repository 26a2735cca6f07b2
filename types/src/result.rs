//! The unified output contract returned by every operation.

use serde::{Deserialize, Serialize};

use crate::{Entry, ErrorKind, FsError, MatchRecord};

/// Exactly one of: entries, content matches, rendered tree, or an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ToolResult {
    Entries(Vec<Entry>),
    Matches(Vec<MatchRecord>),
    Tree(String),
    Error(FsError),
}

impl ToolResult {
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    #[must_use]
    pub const fn error(&self) -> Option<&FsError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Which backend produced a response and why it was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendReport {
    /// Native tool name (`ls`, `rg`, ...) or `fallback`.
    pub backend: String,
    pub reason: String,
    /// Set when a native backend failed recoverably and the fallback answered instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_cause: Option<String>,
}

impl BackendReport {
    #[must_use]
    pub fn new(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            reason: reason.into(),
            fallback_cause: None,
        }
    }
}

/// Envelope returned to the calling agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub result: ToolResult,
    /// Sub-paths skipped during the call, each of kind [`ErrorKind::PartialResult`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial: Vec<FsError>,
    #[serde(default)]
    pub truncated: bool,
    pub backend: BackendReport,
}

impl ToolResponse {
    #[must_use]
    pub fn new(result: ToolResult, backend: BackendReport) -> Self {
        Self {
            result,
            partial: Vec::new(),
            truncated: false,
            backend,
        }
    }

    #[must_use]
    pub fn error(err: FsError, backend: BackendReport) -> Self {
        Self::new(ToolResult::Error(err), backend)
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.partial.is_empty()
    }

    /// The kind a caller should act on: the error kind, `PartialResult`, or `None`.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.result {
            ToolResult::Error(err) => Some(err.kind),
            _ if self.is_partial() => Some(ErrorKind::PartialResult),
            _ => None,
        }
    }
}
