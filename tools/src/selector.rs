//! Backend selection: operation × platform → native adapter or fallback.

use serde::{Deserialize, Serialize};

use crate::platform::{NativeTool, Platform, PlatformFamily};

/// A requested tool operation, as seen by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    Tree,
    /// Search by filename pattern only.
    FileSearch,
    /// Search file contents for a text query.
    ContentSearch,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Tree => "tree",
            Self::FileSearch => "file search",
            Self::ContentSearch => "content search",
        }
    }
}

/// The closed set of execution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Native(NativeTool),
    Fallback,
}

impl Strategy {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Native(tool) => tool.name(),
            Self::Fallback => "fallback",
        }
    }
}

/// Caller preference for which backend family to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Native tool when available, fallback otherwise.
    #[default]
    Auto,
    /// Always use the portable fallback.
    Fallback,
}

/// A selection decision plus the explanation reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub operation: Operation,
    pub strategy: Strategy,
    pub reason: String,
}

impl Selection {
    #[must_use]
    pub fn fallback(operation: Operation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            strategy: Strategy::Fallback,
            reason: reason.into(),
        }
    }
}

/// Native tools for `operation` on `family`, most preferred first.
#[must_use]
pub const fn preferred_tools(operation: Operation, family: PlatformFamily) -> &'static [NativeTool] {
    match (operation, family) {
        (Operation::List, PlatformFamily::Posix) => &[NativeTool::Ls],
        (Operation::List, PlatformFamily::Windows) => &[NativeTool::CmdDir],
        (Operation::Tree, PlatformFamily::Posix) => &[NativeTool::Tree],
        (Operation::Tree, PlatformFamily::Windows) => &[NativeTool::TreeCom],
        (Operation::FileSearch, PlatformFamily::Posix) => &[NativeTool::Ripgrep, NativeTool::Find],
        (Operation::FileSearch, PlatformFamily::Windows) => {
            &[NativeTool::Ripgrep, NativeTool::CmdDir]
        }
        (Operation::ContentSearch, PlatformFamily::Posix) => {
            &[NativeTool::Ripgrep, NativeTool::Grep]
        }
        (Operation::ContentSearch, PlatformFamily::Windows) => {
            &[NativeTool::Ripgrep, NativeTool::Findstr]
        }
    }
}

/// Pick the first available preferred tool, or the fallback.
#[must_use]
pub fn select(operation: Operation, platform: &Platform) -> Selection {
    let candidates = preferred_tools(operation, platform.family());
    if let Some(&tool) = candidates.iter().find(|&&tool| platform.is_available(tool)) {
        return Selection {
            operation,
            strategy: Strategy::Native(tool),
            reason: format!("{tool} available for {}", operation.as_str()),
        };
    }
    let names: Vec<&str> = candidates.iter().map(|tool| tool.name()).collect();
    Selection::fallback(
        operation,
        format!(
            "no native tool for {} ({} not found)",
            operation.as_str(),
            names.join(", ")
        ),
    )
}

/// [`select`], unless the caller asked for the fallback outright.
#[must_use]
pub fn select_with(
    operation: Operation,
    platform: &Platform,
    preference: BackendPreference,
) -> Selection {
    match preference {
        BackendPreference::Auto => select(operation, platform),
        BackendPreference::Fallback => {
            Selection::fallback(operation, "fallback backend requested")
        }
    }
}
