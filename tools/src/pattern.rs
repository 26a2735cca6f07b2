//! Filename glob patterns, matched segment by segment.
//!
//! A pattern is split on `/` into segment matchers:
//!
//! - `*` matches any run of characters inside one segment, `?` exactly one.
//! - `[...]` classes and `{a,b}` alternates work inside a segment.
//! - A segment that is exactly `**` matches zero or more whole segments.
//! - A pattern with a single segment (no `/`, not `**`) matches the final path
//!   segment only, at any depth. How deep a search goes is decided by the
//!   request's recursion flag, never by the pattern shape.
//!
//! Paths handed to [`Pattern::matches`] are relative and `/`-separated, the
//! form every backend produces before normalization.

use globset::{GlobBuilder, GlobMatcher};
use lookout_types::{ErrorKind, FsError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternOptions {
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, Error)]
#[error("invalid pattern '{pattern}': {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

impl From<PatternError> for FsError {
    fn from(err: PatternError) -> Self {
        FsError::new(ErrorKind::UnsupportedPattern, err.to_string())
    }
}

#[derive(Debug, Clone)]
enum Segment {
    AnyDepth,
    /// Stored lowercased when the pattern is case-insensitive.
    Literal(String),
    Glob(GlobMatcher),
}

impl Segment {
    fn matches(&self, part: &str, case_insensitive: bool) -> bool {
        match self {
            Self::AnyDepth => true,
            Self::Literal(lit) if case_insensitive => part.to_lowercase() == *lit,
            Self::Literal(lit) => part == lit,
            Self::Glob(matcher) => matcher.is_match(part),
        }
    }
}

/// A compiled filename pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
    recursive: bool,
    case_insensitive: bool,
}

impl Pattern {
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        Self::compile_with(source, PatternOptions::default())
    }

    pub fn compile_with(source: &str, options: PatternOptions) -> Result<Self, PatternError> {
        let mut body = source.trim();
        while let Some(rest) = body.strip_prefix("./") {
            body = rest;
        }
        let body = body.trim_matches('/');

        let mut segments = Vec::new();
        for raw in split_segments(body) {
            if raw.is_empty() || raw == "." {
                continue;
            }
            let segment = if raw == "**" {
                if matches!(segments.last(), Some(Segment::AnyDepth)) {
                    continue;
                }
                Segment::AnyDepth
            } else if has_glob_meta(&raw) {
                Segment::Glob(build_matcher(source, &raw, options)?)
            } else if options.case_insensitive {
                Segment::Literal(raw.to_lowercase())
            } else {
                Segment::Literal(raw)
            };
            segments.push(segment);
        }

        let recursive = segments.iter().any(|s| matches!(s, Segment::AnyDepth));
        Ok(Self {
            source: source.to_string(),
            segments,
            recursive,
            case_insensitive: options.case_insensitive,
        })
    }

    /// Whether `path` (relative, `/`-separated) satisfies the pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        if self.segments.is_empty() {
            return true;
        }
        let parts: Vec<&str> = path
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .collect();
        if self.is_basename_only() {
            return parts
                .last()
                .is_some_and(|name| self.segments[0].matches(name, self.case_insensitive));
        }
        match_segments(&self.segments, &parts, self.case_insensitive)
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the pattern contains a `**` segment.
    #[must_use]
    pub const fn is_recursive(&self) -> bool {
        self.recursive
    }

    #[must_use]
    pub const fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Whether the pattern matches everything.
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::AnyDepth))
    }

    fn is_basename_only(&self) -> bool {
        self.segments.len() == 1 && !matches!(self.segments[0], Segment::AnyDepth)
    }
}

pub fn compile(source: &str) -> Result<Pattern, PatternError> {
    Pattern::compile(source)
}

#[must_use]
pub fn matches(pattern: &Pattern, path: &str) -> bool {
    pattern.matches(path)
}

fn match_segments(segments: &[Segment], parts: &[&str], case_insensitive: bool) -> bool {
    match segments.split_first() {
        None => parts.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=parts.len()).any(|skip| match_segments(rest, &parts[skip..], case_insensitive))
        }
        Some((segment, rest)) => parts.split_first().is_some_and(|(first, tail)| {
            segment.matches(first, case_insensitive)
                && match_segments(rest, tail, case_insensitive)
        }),
    }
}

/// Split on `/`, except inside `[...]` classes, `{...}` alternates, or after `\`.
fn split_segments(body: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_class = false;
    let mut brace_depth = 0usize;
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                current.push(ch);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                continue;
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '{' if !in_class => brace_depth += 1,
            '}' if !in_class => brace_depth = brace_depth.saturating_sub(1),
            '/' if !in_class && brace_depth == 0 => {
                segments.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    segments.push(current);
    segments
}

fn has_glob_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{', '\\'])
}

fn build_matcher(
    source: &str,
    segment: &str,
    options: PatternOptions,
) -> Result<GlobMatcher, PatternError> {
    // `**` only means "any depth" as a whole segment; elsewhere it is just `*`.
    let mut collapsed = String::with_capacity(segment.len());
    let mut escaped = false;
    for ch in segment.chars() {
        if ch == '*' && !escaped && collapsed.ends_with('*') && !collapsed.ends_with("\\*") {
            continue;
        }
        escaped = ch == '\\' && !escaped;
        collapsed.push(ch);
    }

    GlobBuilder::new(&collapsed)
        .literal_separator(true)
        .case_insensitive(options.case_insensitive)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|err| PatternError {
            pattern: source.to_string(),
            message: err.kind().to_string(),
        })
}
