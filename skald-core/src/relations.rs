//! Relational context: which repository files a Python file imports, what it
//! uses them for, and the reverse `used_by` links.
//!
//! Runs over a finished [`SummaryTree`]. Imports are read from each file's
//! text with [`CodeUnitExtractor::imports`], resolved against the Python
//! modules present in the tree, and each resolved import is described by the
//! oracle through [`Summarizer::describe_import`]. Imports of modules outside
//! the repository are dropped.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use skald_units::{CodeUnitExtractor, ImportRef};

use crate::summarize::Summarizer;
use crate::tree::SummaryTree;
use crate::types::{ERROR_MARKER, EntryKind};

// ── Module naming ──────────────────────────────────────────────────

/// Dotted module name of the Python file at `path`, relative to `root`.
///
/// `pkg/__init__.py` names the package `pkg`. `None` for paths outside
/// `root` or without a `.py` suffix.
pub fn module_name(root: &str, path: &str) -> Option<String> {
    let rel = if root.is_empty() {
        path
    } else {
        let rest = path.strip_prefix(root)?;
        if !rest.is_empty() && !rest.starts_with(['/', '\\']) {
            return None;
        }
        rest
    };
    let stem = rel.trim_start_matches(['/', '\\']).strip_suffix(".py")?;
    let mut parts: Vec<&str> = stem.split(['/', '\\']).filter(|p| !p.is_empty()).collect();
    if parts.last() == Some(&"__init__") {
        parts.pop();
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("."))
}

#[derive(Debug, Clone)]
struct IndexedFile {
    module: String,
    /// Package the file lives in; relative imports resolve against it.
    package: Vec<String>,
}

/// Python modules present in a summary tree, by name and by path.
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    paths: HashMap<String, String>,
    files: HashMap<String, IndexedFile>,
}

impl ModuleIndex {
    pub fn from_tree(tree: &SummaryTree) -> Self {
        let root = tree.get(tree.root()).map_or("", |n| n.path.as_str());
        let mut index = Self::default();
        for id in tree.preorder() {
            let Some(node) = tree.get(id) else { continue };
            if node.kind == EntryKind::PythonFile {
                index.insert(root, &node.path);
            }
        }
        index
    }

    /// Register the file at `path`. The first file claiming a module name keeps it.
    pub fn insert(&mut self, root: &str, path: &str) {
        let Some(module) = module_name(root, path) else {
            return;
        };
        let mut package: Vec<String> = module.split('.').map(str::to_string).collect();
        let is_package = path
            .rsplit(['/', '\\'])
            .next()
            .is_some_and(|name| name == "__init__.py");
        if !is_package {
            package.pop();
        }
        self.paths
            .entry(module.clone())
            .or_insert_with(|| path.to_string());
        self.files
            .insert(path.to_string(), IndexedFile { module, package });
    }

    pub fn path_of(&self, module: &str) -> Option<&str> {
        self.paths.get(module).map(String::as_str)
    }

    pub fn module_of(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|f| f.module.as_str())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Repository files an import statement in `importer` refers to, as
    /// `(module, path)` pairs in statement order.
    ///
    /// The imported module itself is tried first, then each imported name as
    /// a submodule, so `from pkg import mod` finds `pkg/mod.py`.
    pub fn resolve(&self, importer: &str, import: &ImportRef) -> Vec<(String, String)> {
        let Some(base) = self.base_module(importer, import) else {
            return Vec::new();
        };

        let mut candidates = Vec::new();
        if !base.is_empty() {
            candidates.push(base.clone());
        }
        for name in import.names.iter().filter(|n| n.as_str() != "*") {
            if base.is_empty() {
                candidates.push(name.clone());
            } else {
                candidates.push(format!("{base}.{name}"));
            }
        }

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter_map(|module| {
                let path = self.path_of(&module)?.to_string();
                (path != importer && seen.insert(path.clone())).then_some((module, path))
            })
            .collect()
    }

    fn base_module(&self, importer: &str, import: &ImportRef) -> Option<String> {
        if !import.is_relative() {
            return Some(import.module.clone());
        }
        let package = &self.files.get(importer)?.package;
        let keep = package.len().checked_sub(import.level - 1)?;
        let mut parts: Vec<&str> = package[..keep].iter().map(String::as_str).collect();
        parts.extend(import.module.split('.').filter(|p| !p.is_empty()));
        Some(parts.join("."))
    }
}

// ── Relations ──────────────────────────────────────────────────────

/// A repository file this file imports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsesRelation {
    /// Path of the imported file.
    pub uses: String,
    pub module: String,
    pub description: String,
}

/// A repository file importing this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsedByRelation {
    /// Path of the importing file.
    pub used_by: String,
    pub module: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileRelations {
    pub module: String,
    pub uses_relationships: Vec<UsesRelation>,
    pub used_by_relationships: Vec<UsedByRelation>,
}

/// Relations of every Python file, keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationMap {
    files: BTreeMap<String, FileRelations>,
}

impl RelationMap {
    pub fn get(&self, path: &str) -> Option<&FileRelations> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileRelations)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Counters collected while building relations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelationStats {
    pub files_analyzed: u64,
    pub imports_resolved: u64,
    pub descriptions: u64,
    pub description_failures: u64,
    pub parse_failures: u64,
}

#[derive(Debug)]
pub struct RelationOutcome {
    pub relations: RelationMap,
    pub stats: RelationStats,
}

/// Reword a uses-description from the imported file's side.
///
/// `"Imports utils.helpers for formatting names"` read by `main.py` becomes
/// `"main expects formatting names"`. Error-marked descriptions pass through.
pub fn used_by_description(importer_name: &str, module: &str, description: &str) -> String {
    if description.starts_with(ERROR_MARKER) {
        return description.to_string();
    }
    let mut rest = description.trim();
    for verb in ["imports", "uses", "utilizes"] {
        if let Some(after) = strip_word(rest, verb) {
            rest = after;
            break;
        }
    }
    if let Some(after) = rest.strip_prefix(module) {
        rest = after.trim_start();
    }
    if let Some(after) = strip_word(rest, "for") {
        rest = after;
    }
    let stem = importer_name.strip_suffix(".py").unwrap_or(importer_name);
    format!("{stem} expects {rest}")
}

/// `text` without a leading case-insensitive `word`, if it starts with one.
fn strip_word<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let head = text.get(..word.len())?;
    let rest = &text[word.len()..];
    (head.eq_ignore_ascii_case(word) && (rest.is_empty() || rest.starts_with(char::is_whitespace)))
        .then(|| rest.trim_start())
}

// ── Builder ────────────────────────────────────────────────────────

/// Builds a [`RelationMap`] for a finished summary tree.
#[derive(Debug)]
pub struct RelationBuilder {
    summarizer: Arc<Summarizer>,
    extractor: CodeUnitExtractor,
}

impl RelationBuilder {
    pub fn new(summarizer: Arc<Summarizer>) -> Self {
        Self {
            summarizer,
            extractor: CodeUnitExtractor::python(),
        }
    }

    /// Describe every resolved import of every summarized Python file.
    ///
    /// Never fails: files that do not parse get no `uses` entries and
    /// oracle errors are kept as error-marked descriptions.
    #[instrument(skip_all, name = "relations")]
    pub async fn build(&self, tree: &SummaryTree) -> RelationOutcome {
        let index = ModuleIndex::from_tree(tree);
        let mut stats = RelationStats::default();
        let mut files: BTreeMap<String, FileRelations> = BTreeMap::new();
        let mut names: HashMap<String, String> = HashMap::new();

        for id in tree.preorder() {
            let Some(node) = tree.get(id) else { continue };
            if node.kind != EntryKind::PythonFile {
                continue;
            }
            let (Some(summary), Some(module)) = (&node.final_summary, index.module_of(&node.path))
            else {
                continue;
            };
            stats.files_analyzed += 1;
            names.insert(node.path.clone(), node.name.clone());

            let targets = match self.resolved_imports(&index, &node.path, &summary.code) {
                Ok(targets) => targets,
                Err(e) => {
                    warn!(path = %node.path, error = %e, "Cannot read imports");
                    stats.parse_failures += 1;
                    Vec::new()
                }
            };
            stats.imports_resolved += targets.len() as u64;

            let mut uses = Vec::with_capacity(targets.len());
            for (target_module, target_path) in targets {
                let described = self
                    .summarizer
                    .describe_import(&node.context, &summary.code, &target_module)
                    .await;
                stats.descriptions += 1;
                let description = if described.is_error() {
                    stats.description_failures += 1;
                    described.summary
                } else {
                    format!("Imports {target_module} for {}", described.summary)
                };
                uses.push(UsesRelation {
                    uses: target_path,
                    module: target_module,
                    description,
                });
            }
            debug!(path = %node.path, uses = uses.len(), "Relations described");

            files.insert(
                node.path.clone(),
                FileRelations {
                    module: module.to_string(),
                    uses_relationships: uses,
                    used_by_relationships: Vec::new(),
                },
            );
        }

        let mut reverse: Vec<(String, UsedByRelation)> = Vec::new();
        for (path, relations) in &files {
            let importer_name = names.get(path).map_or(path.as_str(), String::as_str);
            for used in &relations.uses_relationships {
                reverse.push((
                    used.uses.clone(),
                    UsedByRelation {
                        used_by: path.clone(),
                        module: relations.module.clone(),
                        description: used_by_description(
                            importer_name,
                            &used.module,
                            &used.description,
                        ),
                    },
                ));
            }
        }
        for (target, used_by) in reverse {
            if let Some(entry) = files.get_mut(&target) {
                entry.used_by_relationships.push(used_by);
            }
        }

        info!(
            files = stats.files_analyzed,
            imports = stats.imports_resolved,
            failures = stats.description_failures,
            "Relations built"
        );
        RelationOutcome {
            relations: RelationMap { files },
            stats,
        }
    }

    fn resolved_imports(
        &self,
        index: &ModuleIndex,
        path: &str,
        code: &str,
    ) -> crate::error::Result<Vec<(String, String)>> {
        let imports = self.extractor.imports(code, path)?;
        let mut seen = HashSet::new();
        Ok(imports
            .iter()
            .flat_map(|import| index.resolve(path, import))
            .filter(|(_, target)| seen.insert(target.clone()))
            .collect())
    }
}
