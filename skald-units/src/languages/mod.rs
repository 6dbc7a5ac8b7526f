mod helpers;
pub mod python;

pub(crate) use helpers::first_error;

use crate::{CodeUnit, ExtractOptions, ImportRef};

/// Trait implemented by each language's extraction support.
pub trait LanguageSupport: Send + Sync + std::fmt::Debug {
    /// Language identifier (e.g., "python").
    fn id(&self) -> &'static str;

    /// File extensions this language handles.
    fn extensions(&self) -> &'static [&'static str];

    /// Tree-sitter language for parsing.
    fn tree_sitter_language(&self) -> tree_sitter::Language;

    /// Extract function-level units from an already parsed tree, in source order.
    fn extract_units(
        &self,
        tree: &tree_sitter::Tree,
        source: &str,
        options: &ExtractOptions,
    ) -> Vec<CodeUnit>;

    /// Every import statement in the tree, in source order.
    fn extract_imports(&self, tree: &tree_sitter::Tree, source: &str) -> Vec<ImportRef>;

    /// Whether a file name belongs to this language.
    fn handles(&self, file_name: &str) -> bool {
        file_name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| self.extensions().contains(&ext))
    }
}
