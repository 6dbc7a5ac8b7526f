//! Tree serialization and document flattening.
//!
//! A [`SummaryTree`] round-trips through the nested [`TreeExport`] JSON form,
//! and flattens into retrieval [`Document`]s in pre-order: a node's own
//! document, then one per function for Python files, then its children.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExportError, SkaldError};
use crate::tree::{Node, NodeId, SummaryTree};
use crate::types::{EntryKind, SummaryResult};

// ── Documents ──────────────────────────────────────────────────────

/// Type tag carried in document metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    PythonFile,
    Directory,
    ReadmeFile,
    Other,
    Function,
}

impl From<EntryKind> for DocumentType {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::PythonFile => Self::PythonFile,
            EntryKind::Directory => Self::Directory,
            EntryKind::ReadmeFile => Self::ReadmeFile,
            EntryKind::Other => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub name: String,
    /// Path of the node; for functions, the owning file's path.
    pub path: String,
    pub code: String,
    pub summary: String,
}

/// One retrievable unit of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

fn push_node_documents(
    kind: EntryKind,
    name: &str,
    path: &str,
    final_summary: Option<&SummaryResult>,
    summaries: &[SummaryResult],
    out: &mut Vec<Document>,
) {
    if let Some(summary) = final_summary.filter(|s| !s.is_empty_sentinel()) {
        out.push(Document {
            page_content: summary.summary.clone(),
            metadata: DocumentMetadata {
                doc_type: kind.into(),
                name: name.to_string(),
                path: path.to_string(),
                code: summary.code.clone(),
                summary: summary.summary.clone(),
            },
        });
    }
    if kind == EntryKind::PythonFile {
        for function in summaries {
            out.push(Document {
                page_content: format!("{}\n\n{}", function.summary, function.code),
                metadata: DocumentMetadata {
                    doc_type: DocumentType::Function,
                    name: function.name.clone(),
                    path: path.to_string(),
                    code: function.code.clone(),
                    summary: function.summary.clone(),
                },
            });
        }
    }
}

/// Flatten a tree into documents, in pre-order.
pub fn flatten(tree: &SummaryTree) -> Vec<Document> {
    let mut docs = Vec::new();
    for id in tree.preorder() {
        if let Some(node) = tree.get(id) {
            push_node_documents(
                node.kind,
                &node.name,
                &node.path,
                node.final_summary.as_ref(),
                &node.summaries,
                &mut docs,
            );
        }
    }
    debug!(documents = docs.len(), "Flattened summary tree");
    docs
}

/// Flatten a loaded JSON tree, in the same order as [`flatten`].
pub fn documents_from_export(export: &TreeExport) -> Vec<Document> {
    let mut docs = Vec::new();
    let mut stack = vec![export];
    while let Some(node) = stack.pop() {
        push_node_documents(
            node.kind,
            &node.name,
            &node.path,
            node.final_summary.as_ref(),
            &node.summaries,
            &mut docs,
        );
        stack.extend(node.children.iter().rev());
    }
    docs
}

// ── Vector batch ───────────────────────────────────────────────────

/// Column-oriented batch ready for a vector store `add` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorBatch {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<DocumentMetadata>,
}

impl VectorBatch {
    /// One fresh UUID v4 per document.
    pub fn from_documents(docs: &[Document]) -> Self {
        let mut batch = Self::default();
        for doc in docs {
            batch.ids.push(uuid::Uuid::new_v4().to_string());
            batch.documents.push(doc.page_content.clone());
            batch.metadatas.push(doc.metadata.clone());
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ── JSON tree ──────────────────────────────────────────────────────

/// Nested, self-contained form of a [`SummaryTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeExport {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub summaries: Vec<SummaryResult>,
    #[serde(default)]
    pub final_summary: Option<SummaryResult>,
    #[serde(default)]
    pub children: Vec<TreeExport>,
}

impl TreeExport {
    fn leaf(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            kind: node.kind,
            path: node.path.clone(),
            context: node.context.clone(),
            summaries: node.summaries.clone(),
            final_summary: node.final_summary.clone(),
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

impl SummaryTree {
    /// Nest the arena into a [`TreeExport`].
    pub fn to_export(&self) -> TreeExport {
        let order = self.preorder();
        let mut built: Vec<Option<TreeExport>> = vec![None; self.len()];

        // Reverse pre-order finishes every child before its parent.
        for id in order.iter().rev() {
            let Some(node) = self.get(*id) else {
                continue;
            };
            let mut export = TreeExport::leaf(node);
            export.children = node
                .children
                .iter()
                .filter_map(|c| built.get_mut(c.0).and_then(Option::take))
                .collect();
            built[id.0] = Some(export);
        }

        built
            .get_mut(self.root().0)
            .and_then(Option::take)
            .unwrap_or_else(|| TreeExport {
                name: String::new(),
                kind: EntryKind::Directory,
                path: String::new(),
                context: String::new(),
                summaries: Vec::new(),
                final_summary: None,
                children: Vec::new(),
            })
    }

    /// Rebuild an arena from a [`TreeExport`]. A `final_summary` that is
    /// missing or the empty sentinel becomes `None`.
    pub fn from_export(export: &TreeExport) -> Self {
        let mut tree = SummaryTree::new(export.name.clone(), export.path.clone());
        let root = tree.root();
        if let Some(node) = tree.get_mut(root) {
            fill(node, export);
        }

        let mut stack: Vec<(&TreeExport, NodeId)> =
            export.children.iter().rev().map(|c| (c, root)).collect();
        while let Some((item, parent)) = stack.pop() {
            let mut node = Node::new(item.name.clone(), item.kind, item.path.clone());
            fill(&mut node, item);
            let Some(id) = tree.attach(parent, node) else {
                continue;
            };
            stack.extend(item.children.iter().rev().map(|c| (c, id)));
        }
        tree
    }
}

fn fill(node: &mut Node, export: &TreeExport) {
    node.context.clone_from(&export.context);
    node.summaries.clone_from(&export.summaries);
    node.final_summary = export
        .final_summary
        .clone()
        .filter(|s| !s.is_empty_sentinel());
}

// ── Files ──────────────────────────────────────────────────────────

/// Write `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> crate::error::Result<()> {
    let io_err = |source| {
        SkaldError::Export(ExportError::Io {
            path: path.display().to_string(),
            source,
        })
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(ExportError::from)?;
    std::fs::write(path, json).map_err(io_err)?;
    debug!(path = %path.display(), "Wrote JSON");
    Ok(())
}

pub fn read_tree_json(path: &Path) -> crate::error::Result<TreeExport> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        SkaldError::Export(ExportError::Io {
            path: path.display().to_string(),
            source,
        })
    })?;
    serde_json::from_str(&text).map_err(|e| SkaldError::Export(ExportError::from(e)))
}
