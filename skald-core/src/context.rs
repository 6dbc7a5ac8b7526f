//! Context propagation: how summaries are aggregated into the input of the
//! next level up, and how ambient context is composed into oracle prompts.

use crate::types::{EntryKind, SourceEntry, SummaryResult};

/// Ambient context threaded through traversal.
///
/// Each directory frame owns one. A README refreshes it for the rest of the
/// directory; a subdirectory starts from a copy of its parent's value at the
/// moment it is reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientContext(String);

impl AmbientContext {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Replace the value. Never affects copies handed out earlier.
    pub fn replace(&mut self, text: impl Into<String>) {
        self.0 = text.into();
    }
}

/// File summarization input: `Function <name>: <summary>` per function, in
/// extraction order.
pub fn aggregate_function_summaries(results: &[SummaryResult]) -> String {
    results
        .iter()
        .map(|r| format!("Function {}: {}", r.name, r.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Directory summarization input: `<Directory|File> <name>: <summary>` per
/// child, in traversal order.
pub fn aggregate_child_summaries<'a>(results: impl IntoIterator<Item = &'a SummaryResult>) -> String {
    results
        .into_iter()
        .map(|r| format!("{} {}: {}", r.child_label(), r.name, r.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build an oracle prompt. An empty context contributes no context block.
pub fn compose_prompt(instruction: &str, name: &str, context: &str, target: &str) -> String {
    if context.trim().is_empty() {
        format!("{instruction}\nName: {name}\n{target}")
    } else {
        format!("{instruction}\nName: {name}\nContext: {}\n{target}", context.trim())
    }
}

/// Move README entries ahead of the rest of a listing. Stable on both sides.
pub fn readme_first(entries: Vec<SourceEntry>) -> Vec<SourceEntry> {
    let (mut readmes, rest): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| EntryKind::classify(&e.name, e.entry_type) == EntryKind::ReadmeFile);
    readmes.extend(rest);
    readmes
}
