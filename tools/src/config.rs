//! Settings consumed by the tool service.
//!
//! These are plain values; reading them from disk is the job of
//! `lookout-config`, which converts its TOML sections into a [`ToolSettings`].

use std::time::Duration;

use lookout_types::{GlyphSet, PathStyle};

use crate::selector::BackendPreference;

/// Serde helper for fields that default to `true`.
#[must_use]
pub const fn default_true() -> bool {
    true
}

/// Native tools get this long before the call is retried through the fallback.
pub const DEFAULT_NATIVE_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListToolConfig {
    pub max_entries: usize,
    pub native_timeout_ms: u64,
}

impl Default for ListToolConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            native_timeout_ms: DEFAULT_NATIVE_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeToolConfig {
    pub default_depth: usize,
    /// Requested depths are clamped to `1..=max_depth`.
    pub max_depth: usize,
    pub max_lines: usize,
    pub native_timeout_ms: u64,
}

impl Default for TreeToolConfig {
    fn default() -> Self {
        Self {
            default_depth: 3,
            max_depth: 10,
            max_lines: 200,
            native_timeout_ms: DEFAULT_NATIVE_TIMEOUT_MS,
        }
    }
}

impl TreeToolConfig {
    #[must_use]
    pub fn effective_depth(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_depth)
            .clamp(1, self.max_depth.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchToolConfig {
    pub max_results: usize,
    /// Cap on files enumerated per search.
    pub max_files: usize,
    pub max_file_size_bytes: u64,
    pub native_timeout_ms: u64,
    pub fallback_timeout_ms: u64,
}

impl Default for SearchToolConfig {
    fn default() -> Self {
        Self {
            max_results: 200,
            max_files: 10_000,
            max_file_size_bytes: 2_000_000,
            native_timeout_ms: DEFAULT_NATIVE_TIMEOUT_MS,
            fallback_timeout_ms: 60_000,
        }
    }
}

/// Aggregated tool settings derived from config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSettings {
    pub backend: BackendPreference,
    pub case_insensitive: bool,
    /// `None` follows the detected platform.
    pub path_style: Option<PathStyle>,
    pub glyphs: GlyphSet,
    pub list: ListToolConfig,
    pub tree: TreeToolConfig,
    pub search: SearchToolConfig,
}

pub(crate) const fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::{ToolSettings, TreeToolConfig};
    use crate::selector::BackendPreference;

    #[test]
    fn default_limits() {
        let settings = ToolSettings::default();
        assert_eq!(settings.backend, BackendPreference::Auto);
        assert_eq!(settings.list.max_entries, 100);
        assert_eq!(settings.tree.default_depth, 3);
        assert_eq!(settings.tree.max_lines, 200);
        assert_eq!(settings.search.max_results, 200);
        assert_eq!(settings.search.max_files, 10_000);
    }

    #[test]
    fn tree_depth_is_clamped() {
        let tree = TreeToolConfig::default();
        assert_eq!(tree.effective_depth(None), 3);
        assert_eq!(tree.effective_depth(Some(0)), 1);
        assert_eq!(tree.effective_depth(Some(25)), 10);
        assert_eq!(tree.effective_depth(Some(4)), 4);
    }
}
