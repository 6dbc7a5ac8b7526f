//! Code-unit extraction: tree-sitter parsing of source files into ordered,
//! function-level units.
//!
//! The main entry point is [`CodeUnitExtractor`], which parses file text with a
//! [`LanguageSupport`] implementation and returns one [`CodeUnit`] per function
//! definition, in source order. [`CodeUnitExtractor::imports`] returns the
//! file's import statements as [`ImportRef`]s.

pub mod extract;
pub mod languages;

use serde::{Deserialize, Serialize};

pub use extract::{CodeUnitExtractor, ExtractOptions};
pub use languages::LanguageSupport;
pub use languages::python::PythonSupport;

/// Error type for the extraction engine.
#[derive(thiserror::Error, Debug)]
pub enum UnitError {
    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),
}

pub type Result<T> = std::result::Result<T, UnitError>;

// ── Span type ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl From<tree_sitter::Range> for TextRange {
    fn from(r: tree_sitter::Range) -> Self {
        Self {
            start_byte: r.start_byte,
            end_byte: r.end_byte,
            start_row: r.start_point.row,
            start_col: r.start_point.column,
            end_row: r.end_point.row,
            end_col: r.end_point.column,
        }
    }
}

// ── Extraction output ──────────────────────────────────────────────

/// One function-level fragment of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUnit {
    /// Bare function name.
    pub name: String,
    /// Dotted name including enclosing classes/functions (equal to `name`
    /// for top-level functions).
    pub qualified_name: String,
    /// Whole source lines from the declaration line through the last line.
    pub code: String,
    pub span: TextRange,
}

impl CodeUnit {
    /// 1-based inclusive line range, as shown to humans.
    pub fn line_range(&self) -> (usize, usize) {
        (self.span.start_row + 1, self.span.end_row + 1)
    }
}

/// One imported module, as written in an `import` or `from ... import` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRef {
    /// Dotted module path without leading dots; empty for `from . import x`.
    pub module: String,
    /// Number of leading dots of a relative import; 0 when absolute.
    pub level: usize,
    /// Names listed after `from ... import`; empty for plain `import`.
    pub names: Vec<String>,
    pub span: TextRange,
}

impl ImportRef {
    pub fn is_relative(&self) -> bool {
        self.level > 0
    }
}
