//! Configuration loading for lookout.
//!
//! ```toml
//! [app]
//! ascii_only = true
//!
//! [tools]
//! backend = "auto"          # or "fallback"
//! case_insensitive = false
//! path_style = "posix"      # or "windows"; omit to follow the host
//!
//! [tools.tree]
//! default_depth = 3
//! max_lines = 200
//!
//! [tools.search]
//! max_results = 200
//! ```

use std::path::{Path, PathBuf};

use lookout_tools::{BackendPreference, ToolSettings};
use lookout_types::{GlyphSet, PathStyle};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct LookoutConfig {
    pub app: Option<AppConfig>,
    pub tools: Option<ToolsConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Draw trees with ASCII glyphs for limited terminals.
    #[serde(default)]
    pub ascii_only: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolsConfig {
    pub backend: Option<BackendPreference>,
    pub case_insensitive: Option<bool>,
    pub path_style: Option<PathStyle>,
    pub list: Option<ListConfig>,
    pub tree: Option<TreeConfig>,
    pub search: Option<SearchConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListConfig {
    pub max_entries: Option<usize>,
    pub native_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TreeConfig {
    pub default_depth: Option<usize>,
    pub max_depth: Option<usize>,
    pub max_lines: Option<usize>,
    pub native_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchConfig {
    pub max_results: Option<usize>,
    pub max_files: Option<usize>,
    pub max_file_size_bytes: Option<u64>,
    pub native_timeout_ms: Option<u64>,
    pub fallback_timeout_ms: Option<u64>,
}

impl LookoutConfig {
    /// Load `~/.lookout/config.toml`. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                Ok(Some(config))
            }
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Overlay the configured values on the tool defaults. Limits are at least 1.
    #[must_use]
    pub fn tool_settings(&self) -> ToolSettings {
        let mut settings = ToolSettings::default();
        if self.app.as_ref().is_some_and(|app| app.ascii_only) {
            settings.glyphs = GlyphSet::Ascii;
        }
        let Some(tools) = &self.tools else {
            return settings;
        };

        if let Some(backend) = tools.backend {
            settings.backend = backend;
        }
        if let Some(case_insensitive) = tools.case_insensitive {
            settings.case_insensitive = case_insensitive;
        }
        settings.path_style = tools.path_style;

        if let Some(list) = &tools.list {
            let target = &mut settings.list;
            overlay_limit(&mut target.max_entries, list.max_entries);
            overlay_timeout(&mut target.native_timeout_ms, list.native_timeout_ms);
        }
        if let Some(tree) = &tools.tree {
            let target = &mut settings.tree;
            overlay_limit(&mut target.default_depth, tree.default_depth);
            overlay_limit(&mut target.max_depth, tree.max_depth);
            overlay_limit(&mut target.max_lines, tree.max_lines);
            overlay_timeout(&mut target.native_timeout_ms, tree.native_timeout_ms);
        }
        if let Some(search) = &tools.search {
            let target = &mut settings.search;
            overlay_limit(&mut target.max_results, search.max_results);
            overlay_limit(&mut target.max_files, search.max_files);
            if let Some(size) = search.max_file_size_bytes {
                target.max_file_size_bytes = size.max(1);
            }
            overlay_timeout(&mut target.native_timeout_ms, search.native_timeout_ms);
            overlay_timeout(&mut target.fallback_timeout_ms, search.fallback_timeout_ms);
        }
        settings
    }
}

fn overlay_limit(target: &mut usize, value: Option<usize>) {
    if let Some(value) = value {
        *target = value.max(1);
    }
}

fn overlay_timeout(target: &mut u64, value: Option<u64>) {
    if let Some(value) = value {
        *target = value.max(1);
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lookout").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, LookoutConfig};
    use lookout_tools::{BackendPreference, ToolSettings};
    use lookout_types::{GlyphSet, PathStyle};
    use std::path::PathBuf;

    #[test]
    fn empty_config_yields_defaults() {
        let config: LookoutConfig = toml::from_str("").unwrap();
        assert_eq!(config.tool_settings(), ToolSettings::default());
    }

    #[test]
    fn sections_overlay_defaults() {
        let config: LookoutConfig = toml::from_str(
            r#"
[app]
ascii_only = true

[tools]
backend = "fallback"
case_insensitive = true
path_style = "windows"

[tools.tree]
default_depth = 5
max_lines = 50

[tools.search]
max_results = 10
fallback_timeout_ms = 1000
"#,
        )
        .unwrap();
        let settings = config.tool_settings();
        assert_eq!(settings.glyphs, GlyphSet::Ascii);
        assert_eq!(settings.backend, BackendPreference::Fallback);
        assert!(settings.case_insensitive);
        assert_eq!(settings.path_style, Some(PathStyle::Windows));
        assert_eq!(settings.tree.default_depth, 5);
        assert_eq!(settings.tree.max_lines, 50);
        assert_eq!(settings.tree.max_depth, 10);
        assert_eq!(settings.search.max_results, 10);
        assert_eq!(settings.search.fallback_timeout_ms, 1000);
        assert_eq!(settings.list.max_entries, 100);
    }

    #[test]
    fn zero_limits_are_raised_to_one() {
        let config: LookoutConfig = toml::from_str("[tools.list]\nmax_entries = 0\n").unwrap();
        assert_eq!(config.tool_settings().list.max_entries, 1);
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        assert!(toml::from_str::<LookoutConfig>("[tools]\nbackend = \"native\"\n").is_err());
    }

    #[test]
    fn load_from_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = LookoutConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_from_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "invalid toml [").unwrap();
        let err = LookoutConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), path.as_path());
    }

    #[test]
    fn config_error_path_accessor() {
        let path = PathBuf::from("/test/path");
        let err = ConfigError::Read {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.path(), path.as_path());
    }
}
