//! Error taxonomy shared by every operation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of failure kinds a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The root path does not exist.
    NotFound,
    PermissionDenied,
    Timeout,
    /// The filename pattern failed to compile.
    UnsupportedPattern,
    /// No native adapter applied and the portable fallback failed too.
    BackendUnavailable,
    /// Some sub-paths were skipped; the call still produced a result.
    PartialResult,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::Timeout => "timeout",
            Self::UnsupportedPattern => "unsupported_pattern",
            Self::BackendUnavailable => "backend_unavailable",
            Self::PartialResult => "partial_result",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure: a kind plus a human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {cause}")]
pub struct FsError {
    pub kind: ErrorKind,
    pub cause: String,
    /// Offending path, when the failure concerns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl FsError {
    #[must_use]
    pub fn new(kind: ErrorKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
            path: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// A skipped sub-path inside an otherwise successful call.
    #[must_use]
    pub fn skipped(path: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(ErrorKind::PartialResult, cause).with_path(path)
    }
}
