use serde::{Deserialize, Serialize};

use crate::types::{EntryKind, SummaryResult};

// ── Typed ID ───────────────────────────────────────────────────────

/// Index of a node inside its [`SummaryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Node ───────────────────────────────────────────────────────────

/// One visited entry in the summary tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: EntryKind,
    /// Fully qualified location; unique within a run.
    pub path: String,
    /// Per-function summaries in extraction order. Empty unless `PythonFile`.
    pub summaries: Vec<SummaryResult>,
    /// `None` when the node produced no meaningful content.
    pub final_summary: Option<SummaryResult>,
    /// Ambient context the node was visited with. For directories, the
    /// outbound value computed once the directory finished.
    pub context: String,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: EntryKind, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
            summaries: Vec::new(),
            final_summary: None,
            context: String::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    /// The final summary, unless absent or the empty sentinel.
    pub fn meaningful_summary(&self) -> Option<&SummaryResult> {
        self.final_summary
            .as_ref()
            .filter(|s| !s.is_empty_sentinel())
    }
}

// ── Arena ──────────────────────────────────────────────────────────

/// Arena owning every node of one summarization run.
///
/// Node `0` is always the root directory. Children are kept in the order
/// they were attached, which is the content source's listing order.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTree {
    nodes: Vec<Node>,
}

impl SummaryTree {
    /// Create a tree holding only a root directory node.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node::new(name, EntryKind::Directory, path)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Append `node` as the last child of `parent`.
    ///
    /// Returns `None` if `parent` is not in this tree.
    pub fn attach(&mut self, parent: NodeId, mut node: Node) -> Option<NodeId> {
        if parent.0 >= self.nodes.len() {
            return None;
        }
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        Some(id)
    }

    /// Set a node's final summary. A summary already present is kept.
    pub(crate) fn set_final_summary(&mut self, id: NodeId, summary: SummaryResult) -> bool {
        match self.get_mut(id) {
            Some(node) if node.final_summary.is_none() => {
                node.final_summary = Some(summary);
                true
            }
            _ => false,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children.as_slice())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Node ids in pre-order: a node before its children, children in
    /// stored order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Depth of a node below the root (root is 0).
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(p) = current {
            depth += 1;
            current = self.parent(p);
        }
        depth
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }
}

/// Name used for the root node: the last component of `path`, or `"root"`.
pub fn root_name(path: &str) -> String {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty() && *s != ".")
        .unwrap_or("root")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SummaryKind;

    fn sample() -> SummaryTree {
        let mut tree = SummaryTree::new("proj", "/proj");
        let root = tree.root();
        tree.attach(root, Node::new("main.py", EntryKind::PythonFile, "/proj/main.py"))
            .unwrap();
        let utils = tree
            .attach(root, Node::new("utils", EntryKind::Directory, "/proj/utils"))
            .unwrap();
        tree.attach(
            utils,
            Node::new("helpers.py", EntryKind::PythonFile, "/proj/utils/helpers.py"),
        )
        .unwrap();
        tree
    }

    #[test]
    fn attach_links_parent_and_child() {
        let tree = sample();
        assert_eq!(tree.len(), 4);
        assert!(tree.get(tree.root()).unwrap().parent.is_none());
        for (id, node) in tree.iter().skip(1) {
            let parent = node.parent.unwrap();
            let occurrences = tree.children(parent).iter().filter(|c| **c == id).count();
            assert_eq!(occurrences, 1);
        }
    }

    #[test]
    fn attach_to_missing_parent_fails() {
        let mut tree = SummaryTree::new("r", "r");
        assert!(
            tree.attach(NodeId(9), Node::new("x", EntryKind::Directory, "r/x"))
                .is_none()
        );
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn preorder_visits_parent_first() {
        let tree = sample();
        let names: Vec<_> = tree
            .preorder()
            .into_iter()
            .map(|id| tree.get(id).unwrap().name.clone())
            .collect();
        assert_eq!(names, ["proj", "main.py", "utils", "helpers.py"]);
    }

    #[test]
    fn depth_counts_ancestors() {
        let tree = sample();
        assert_eq!(tree.depth(NodeId(0)), 0);
        assert_eq!(tree.depth(NodeId(2)), 1);
        assert_eq!(tree.depth(NodeId(3)), 2);
    }

    #[test]
    fn final_summary_is_set_once() {
        let mut tree = sample();
        let first = SummaryResult::new(SummaryKind::Directory, "proj", "first", "");
        let second = SummaryResult::new(SummaryKind::Directory, "proj", "second", "");
        assert!(tree.set_final_summary(NodeId(0), first));
        assert!(!tree.set_final_summary(NodeId(0), second));
        assert_eq!(
            tree.get(NodeId(0)).unwrap().final_summary.as_ref().unwrap().summary,
            "first"
        );
    }

    #[test]
    fn sentinel_is_not_meaningful() {
        let mut node = Node::new("a", EntryKind::Directory, "a");
        assert!(node.meaningful_summary().is_none());
        node.final_summary = Some(SummaryResult::empty());
        assert!(node.meaningful_summary().is_none());
    }

    #[test]
    fn root_name_from_path() {
        assert_eq!(root_name("/home/me/project"), "project");
        assert_eq!(root_name("/home/me/project/"), "project");
        assert_eq!(root_name("C:\\code\\app"), "app");
        assert_eq!(root_name(""), "root");
        assert_eq!(root_name("/"), "root");
        assert_eq!(root_name("."), "root");
    }
}
