use std::collections::HashMap;

use crate::types::{EntryType, SourceEntry};

use super::ContentSource;

/// In-memory source whose listings follow insertion order.
///
/// Paths given to the builder methods are relative to the root and use `/`.
/// Missing parent directories are created on the way.
#[derive(Debug, Clone)]
pub struct MemorySource {
    root: String,
    listings: HashMap<String, Vec<SourceEntry>>,
    /// `None` marks a file that exists but cannot be read.
    files: HashMap<String, Option<String>>,
}

impl MemorySource {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let mut listings = HashMap::new();
        listings.insert(root.clone(), Vec::new());
        Self {
            root,
            listings,
            files: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_file(mut self, rel: &str, content: impl Into<String>) -> Self {
        let path = self.add_entry(rel, EntryType::File);
        self.files.insert(path, Some(content.into()));
        self
    }

    /// A file that is listed but whose read fails.
    #[must_use]
    pub fn with_unreadable_file(mut self, rel: &str) -> Self {
        let path = self.add_entry(rel, EntryType::File);
        self.files.insert(path, None);
        self
    }

    #[must_use]
    pub fn with_dir(mut self, rel: &str) -> Self {
        self.add_entry(rel, EntryType::Dir);
        self
    }

    /// An entry that is neither file nor directory (symlink, submodule).
    #[must_use]
    pub fn with_other(mut self, rel: &str) -> Self {
        self.add_entry(rel, EntryType::Other);
        self
    }

    fn add_entry(&mut self, rel: &str, entry_type: EntryType) -> String {
        let mut parent = self.root.clone();
        let mut parts = rel.split('/').filter(|p| !p.is_empty()).peekable();
        let mut path = parent.clone();

        while let Some(part) = parts.next() {
            path = self.join(&parent, part);
            let kind = if parts.peek().is_some() {
                EntryType::Dir
            } else {
                entry_type
            };
            let listing = self.listings.entry(parent.clone()).or_default();
            if !listing.iter().any(|e| e.name == part) {
                listing.push(SourceEntry {
                    name: part.to_string(),
                    path: path.clone(),
                    entry_type: kind,
                });
            }
            if kind == EntryType::Dir {
                self.listings.entry(path.clone()).or_default();
            }
            parent.clone_from(&path);
        }
        path
    }
}

#[async_trait::async_trait]
impl ContentSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn root_path(&self) -> &str {
        &self.root
    }

    async fn list_entries(&self, path: &str) -> Vec<SourceEntry> {
        self.listings.get(path).cloned().unwrap_or_default()
    }

    async fn read_file(&self, path: &str) -> Option<String> {
        self.files.get(path).cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preserves_insertion_order() {
        let source = MemorySource::new("repo")
            .with_file("main.py", "def a():\n    pass\n")
            .with_file("README.md", "# r\n")
            .with_file("utils/helpers.py", "")
            .with_dir("empty");

        let names: Vec<_> = source
            .list_entries("repo")
            .await
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["main.py", "README.md", "utils", "empty"]);

        let utils = source.list_entries("repo/utils").await;
        assert_eq!(utils.len(), 1);
        assert_eq!(utils[0].path, "repo/utils/helpers.py");
        assert!(source.list_entries("repo/empty").await.is_empty());
    }

    #[tokio::test]
    async fn unreadable_and_missing_files() {
        let source = MemorySource::new("repo")
            .with_unreadable_file("locked.py")
            .with_other("link");
        assert_eq!(source.list_entries("repo").await.len(), 2);
        assert!(source.read_file("repo/locked.py").await.is_none());
        assert!(source.read_file("repo/absent.py").await.is_none());
        assert_eq!(
            source.list_entries("repo").await[1].entry_type,
            EntryType::Other
        );
    }

    #[test]
    fn join_uses_slashes() {
        let source = MemorySource::new("repo");
        assert_eq!(source.join("repo", "a.py"), "repo/a.py");
        assert_eq!(source.join("", "a.py"), "a.py");
        assert_eq!(source.root_name(), "repo");
    }
}
