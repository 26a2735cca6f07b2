//! Host platform detection.
//!
//! The platform is a pure function of the environment: the target OS family
//! plus the set of native executables found on `PATH`. It is probed once per
//! process ([`Platform::current`]) and then passed explicitly to whoever needs
//! it, so tests can hand in a fabricated [`Platform`] instead.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use lookout_types::PathStyle;
use serde::Serialize;

/// Host OS family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Posix,
    Windows,
}

impl PlatformFamily {
    #[must_use]
    pub fn host() -> Self {
        if env::consts::FAMILY == "windows" {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    #[must_use]
    pub const fn path_style(self) -> PathStyle {
        match self {
            Self::Posix => PathStyle::Posix,
            Self::Windows => PathStyle::Windows,
        }
    }

    /// Native tools worth probing for on this family.
    #[must_use]
    pub const fn candidates(self) -> &'static [NativeTool] {
        match self {
            Self::Posix => &[
                NativeTool::Ls,
                NativeTool::Tree,
                NativeTool::Find,
                NativeTool::Grep,
                NativeTool::Ripgrep,
            ],
            Self::Windows => &[
                NativeTool::CmdDir,
                NativeTool::TreeCom,
                NativeTool::Findstr,
                NativeTool::Ripgrep,
            ],
        }
    }
}

/// Every native command the adapters know how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeTool {
    Ls,
    /// `dir`, a `cmd.exe` builtin; the probed executable is `cmd` itself.
    CmdDir,
    Tree,
    TreeCom,
    Find,
    Grep,
    Findstr,
    Ripgrep,
}

impl NativeTool {
    /// Executable name looked up on `PATH`.
    #[must_use]
    pub const fn executable(self) -> &'static str {
        match self {
            Self::Ls => "ls",
            Self::CmdDir => "cmd",
            Self::Tree | Self::TreeCom => "tree",
            Self::Find => "find",
            Self::Grep => "grep",
            Self::Findstr => "findstr",
            Self::Ripgrep => "rg",
        }
    }

    /// Display name used in backend reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ls => "ls",
            Self::CmdDir => "dir",
            Self::Tree => "tree",
            Self::TreeCom => "tree.com",
            Self::Find => "find",
            Self::Grep => "grep",
            Self::Findstr => "findstr",
            Self::Ripgrep => "rg",
        }
    }
}

impl std::fmt::Display for NativeTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Detected host: family plus the native tools found on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    family: PlatformFamily,
    executables: BTreeMap<NativeTool, PathBuf>,
}

static CURRENT: OnceLock<Arc<Platform>> = OnceLock::new();

impl Platform {
    /// Build a platform from known parts. Used for injected fakes.
    pub fn new(
        family: PlatformFamily,
        executables: impl IntoIterator<Item = (NativeTool, PathBuf)>,
    ) -> Self {
        Self {
            family,
            executables: executables.into_iter().collect(),
        }
    }

    /// A platform with no native tools, which always selects the fallback.
    #[must_use]
    pub fn bare(family: PlatformFamily) -> Self {
        Self::new(family, [])
    }

    /// Probe the real environment.
    #[must_use]
    pub fn detect() -> Self {
        let family = PlatformFamily::host();
        Self::probe_with(family, locate)
    }

    /// Detected once, shared for the rest of the process.
    #[must_use]
    pub fn current() -> Arc<Self> {
        Arc::clone(CURRENT.get_or_init(|| {
            let platform = Self::detect();
            tracing::debug!(
                family = ?platform.family,
                tools = ?platform.executables.keys().collect::<Vec<_>>(),
                "Platform detected"
            );
            Arc::new(platform)
        }))
    }

    /// Probe each candidate tool of `family` through `lookup`.
    ///
    /// A tool whose lookup yields nothing is recorded as unavailable.
    pub fn probe_with<F>(family: PlatformFamily, mut lookup: F) -> Self
    where
        F: FnMut(NativeTool) -> Option<PathBuf>,
    {
        let executables = family
            .candidates()
            .iter()
            .filter_map(|&tool| lookup(tool).map(|path| (tool, path)))
            .collect();
        Self {
            family,
            executables,
        }
    }

    #[must_use]
    pub const fn family(&self) -> PlatformFamily {
        self.family
    }

    #[must_use]
    pub const fn path_style(&self) -> PathStyle {
        self.family.path_style()
    }

    #[must_use]
    pub fn executable(&self, tool: NativeTool) -> Option<&Path> {
        self.executables.get(&tool).map(PathBuf::as_path)
    }

    #[must_use]
    pub fn is_available(&self, tool: NativeTool) -> bool {
        self.executables.contains_key(&tool)
    }
}

fn locate(tool: NativeTool) -> Option<PathBuf> {
    if tool == NativeTool::CmdDir
        && let Some(comspec) = env::var_os("ComSpec").map(PathBuf::from)
        && comspec.is_file()
    {
        return Some(comspec);
    }
    match which::which(tool.executable()) {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::debug!(tool = %tool, error = %err, "Native tool unavailable");
            None
        }
    }
}
