use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Entry classification ───────────────────────────────────────────

/// What a content-source entry is, as far as summarization is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    /// A Python source file: summarized per function, then as a whole.
    PythonFile,
    /// A directory: recursed into and rolled up.
    Directory,
    /// A README: refreshes the ambient context of its directory.
    ReadmeFile,
    /// Anything else; never visited or recorded.
    Other,
}

impl EntryKind {
    /// Classify a listed entry by its name and whether the source reports it
    /// as a directory.
    pub fn classify(name: &str, entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::Dir => Self::Directory,
            EntryType::Other => Self::Other,
            EntryType::File => {
                if name.ends_with(".py") {
                    Self::PythonFile
                } else if name.to_lowercase().starts_with("readme") {
                    Self::ReadmeFile
                } else {
                    Self::Other
                }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PythonFile => "PYTHON_FILE",
            Self::Directory => "DIRECTORY",
            Self::ReadmeFile => "README_FILE",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw entry type as reported by a content source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
    /// Symlinks, submodules, sockets and the like.
    Other,
}

/// One child entry returned by [`ContentSource::list_entries`](crate::source::ContentSource::list_entries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Base name.
    pub name: String,
    /// Fully qualified path, usable with the same source.
    pub path: String,
    pub entry_type: EntryType,
}

// ── Summary results ────────────────────────────────────────────────

/// What a [`SummaryResult`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryKind {
    Function,
    PythonFile,
    ReadmeFile,
    Directory,
    /// How a file uses one module it imports.
    Import,
}

impl SummaryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "FUNCTION",
            Self::PythonFile => "PYTHON_FILE",
            Self::ReadmeFile => "README_FILE",
            Self::Directory => "DIRECTORY",
            Self::Import => "IMPORT",
        }
    }

    /// Label used when a child summary is aggregated into its directory's input.
    pub fn child_label(self) -> &'static str {
        match self {
            Self::Directory => "Directory",
            Self::Function | Self::PythonFile | Self::ReadmeFile | Self::Import => "File",
        }
    }
}

impl std::fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata key holding the ambient context a summary was generated with.
pub const META_CONTEXT: &str = "context";
/// Metadata key holding the failure detail of an error summary.
pub const META_ERROR: &str = "error";
/// Metadata key holding the provider model id.
pub const META_MODEL: &str = "model";
/// Metadata key set to `true` when the completion came from the response cache.
pub const META_CACHED: &str = "cached";

/// Prefix of every summary produced by a failed oracle call.
pub const ERROR_MARKER: &str = "Error generating summary: ";

/// One generated artifact: a summary paired with the source text it is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub name: String,
    pub summary: String,
    /// Function code, full file text, or empty for directories.
    pub code: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// `None` only for the empty sentinel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SummaryKind>,
}

impl SummaryResult {
    pub fn new(
        kind: SummaryKind,
        name: impl Into<String>,
        summary: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            code: code.into(),
            metadata: HashMap::new(),
            kind: Some(kind),
        }
    }

    /// The reserved "no summary" value.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            summary: String::new(),
            code: String::new(),
            metadata: HashMap::new(),
            kind: None,
        }
    }

    pub fn is_empty_sentinel(&self) -> bool {
        self.name.is_empty() && self.summary.is_empty() && self.code.is_empty()
    }

    /// Whether this result records a failed oracle call.
    pub fn is_error(&self) -> bool {
        self.metadata.contains_key(META_ERROR)
    }

    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Back-fill the source text the summary is about.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Label for aggregation into a parent directory.
    pub fn child_label(&self) -> &'static str {
        self.kind.map_or("File", SummaryKind::child_label)
    }
}
