//! Presentation conventions chosen by the caller: path separators and tree glyphs.

use serde::{Deserialize, Serialize};

/// Separator convention applied to every returned path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    Posix,
    Windows,
}

impl PathStyle {
    /// Rewrite an internal `/`-separated path into this convention.
    #[must_use]
    pub fn apply(self, path: &str) -> String {
        match self {
            Self::Posix => path.to_string(),
            Self::Windows => path.replace('/', "\\"),
        }
    }
}

/// Glyph set for tree branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlyphSet {
    #[default]
    Unicode,
    /// For terminals with limited character-set support.
    Ascii,
}

/// Branch-drawing strings used by the tree renderer.
#[derive(Debug, Clone, Copy)]
pub struct TreeGlyphs {
    pub branch: &'static str,
    pub last_branch: &'static str,
    pub pipe: &'static str,
    pub blank: &'static str,
}

#[must_use]
pub const fn tree_glyphs(set: GlyphSet) -> TreeGlyphs {
    match set {
        GlyphSet::Ascii => TreeGlyphs {
            branch: "|-- ",
            last_branch: "`-- ",
            pipe: "|   ",
            blank: "    ",
        },
        GlyphSet::Unicode => TreeGlyphs {
            branch: "├── ",
            last_branch: "└── ",
            pipe: "│   ",
            blank: "    ",
        },
    }
}
