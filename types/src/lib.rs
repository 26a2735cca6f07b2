//! Core result types for lookout.
//!
//! This crate contains the value types every backend produces and every caller
//! consumes. No IO, no async.

mod entry;
mod error;
mod result;
mod style;
mod tool;

pub use entry::{Entry, EntryKind, MatchRecord, MatchSpan};
pub use error::{ErrorKind, FsError};
pub use result::{BackendReport, ToolResponse, ToolResult};
pub use style::{GlyphSet, PathStyle, TreeGlyphs, tree_glyphs};
pub use tool::ToolDefinition;
