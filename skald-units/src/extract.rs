use std::sync::Arc;

use tracing::debug;

use crate::languages::LanguageSupport;
use crate::languages::python::PythonSupport;
use crate::{CodeUnit, ImportRef, Result, UnitError};

/// Knobs for code-unit extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Also return methods and nested functions, with dotted qualified names.
    pub include_nested: bool,
}

/// Parses file text into ordered function-level units.
#[derive(Debug, Clone)]
pub struct CodeUnitExtractor {
    language: Arc<dyn LanguageSupport>,
    options: ExtractOptions,
}

impl CodeUnitExtractor {
    pub fn new(language: Arc<dyn LanguageSupport>) -> Self {
        Self {
            language,
            options: ExtractOptions::default(),
        }
    }

    /// Extractor for Python source files.
    pub fn python() -> Self {
        Self::new(Arc::new(PythonSupport))
    }

    #[must_use]
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn language(&self) -> &dyn LanguageSupport {
        &*self.language
    }

    pub fn options(&self) -> ExtractOptions {
        self.options
    }

    /// Parse `source` and return its units in source order.
    ///
    /// Fails with [`UnitError::Parse`] when the text is not syntactically valid.
    pub fn extract(&self, source: &str, path: &str) -> Result<Vec<CodeUnit>> {
        let tree = self.parse(source, path)?;
        let units = self.language.extract_units(&tree, source, &self.options);
        debug!(path, language = self.language.id(), units = units.len(), "Extracted code units");
        Ok(units)
    }

    /// Parse `source` and return every import it declares, in source order,
    /// including imports nested inside functions.
    pub fn imports(&self, source: &str, path: &str) -> Result<Vec<ImportRef>> {
        let tree = self.parse(source, path)?;
        let imports = self.language.extract_imports(&tree, source);
        debug!(path, imports = imports.len(), "Extracted imports");
        Ok(imports)
    }

    fn parse(&self, source: &str, path: &str) -> Result<tree_sitter::Tree> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&self.language.tree_sitter_language())
            .map_err(|e| UnitError::TreeSitter(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| UnitError::TreeSitter(format!("parser produced no tree for {path}")))?;

        if let Some(bad) = crate::languages::first_error(tree.root_node()) {
            let pos = bad.start_position();
            return Err(UnitError::Parse {
                path: path.to_string(),
                message: format!("syntax error at line {}, column {}", pos.row + 1, pos.column + 1),
            });
        }
        Ok(tree)
    }
}

impl Default for CodeUnitExtractor {
    fn default() -> Self {
        Self::python()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_source_is_a_parse_error() {
        let err = CodeUnitExtractor::python()
            .extract("def broken(:\n    return\n", "broken.py")
            .unwrap_err();
        match err {
            UnitError::Parse { path, message } => {
                assert_eq!(path, "broken.py");
                assert!(message.starts_with("syntax error at line 1"), "{message}");
            }
            other => panic!("Expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_source_has_no_imports_either() {
        let err = CodeUnitExtractor::python()
            .imports("import os\ndef broken(:\n", "broken.py")
            .unwrap_err();
        assert!(matches!(err, UnitError::Parse { .. }));
    }

    #[test]
    fn handles_by_extension() {
        let extractor = CodeUnitExtractor::python();
        assert!(extractor.language().handles("main.py"));
        assert!(!extractor.language().handles("README.md"));
        assert!(!extractor.language().handles("py"));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn arb_function() -> impl Strategy<Value = (String, u8)> {
            ("[a-z][a-z0-9_]{0,10}", 0u8..4)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn extraction_is_idempotent(funcs in proptest::collection::vec(arb_function(), 0..8)) {
                let mut src = String::new();
                for (i, (name, blanks)) in funcs.iter().enumerate() {
                    src.push_str(&format!("def {name}_{i}(x):\n    y = x\n"));
                    for _ in 0..*blanks {
                        src.push('\n');
                    }
                    src.push_str("    # note\n    return y\n\n");
                }

                let extractor = CodeUnitExtractor::python();
                let first = extractor.extract(&src, "gen.py").unwrap();
                let second = extractor.extract(&src, "gen.py").unwrap();
                prop_assert_eq!(&first, &second);
                prop_assert_eq!(first.len(), funcs.len());
                for (i, unit) in first.iter().enumerate() {
                    prop_assert_eq!(&unit.name, &format!("{}_{i}", funcs[i].0));
                    prop_assert!(unit.code.ends_with("return y"));
                }
            }
        }
    }
}
