use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{SkaldError, SourceError};
use crate::types::{EntryType, SourceEntry};

use super::ContentSource;

/// Local filesystem source rooted at a directory.
///
/// Entries are listed in byte-wise name order so runs over the same tree
/// are reproducible.
#[derive(Debug)]
pub struct LocalSource {
    root: PathBuf,
    root_str: String,
    excludes: Vec<glob::Pattern>,
}

impl LocalSource {
    pub fn new(root: impl AsRef<Path>) -> crate::error::Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(SkaldError::Source(SourceError::NotFound(
                root.display().to_string(),
            )));
        }
        let root = root.canonicalize().map_err(SourceError::Io)?;
        let root_str = root.to_string_lossy().into_owned();
        Ok(Self {
            root,
            root_str,
            excludes: Vec::new(),
        })
    }

    /// Exclude entries whose root-relative path matches any glob pattern.
    ///
    /// A pattern ending in `/**` also excludes the directory itself.
    pub fn with_excludes(mut self, patterns: &[String]) -> crate::error::Result<Self> {
        for raw in patterns {
            let mut variants = vec![raw.as_str()];
            if let Some(dir) = raw.strip_suffix("/**") {
                variants.push(dir);
            }
            for variant in variants {
                let pattern = glob::Pattern::new(variant).map_err(|e| {
                    SkaldError::Config(crate::error::ConfigError::Invalid(format!(
                        "bad exclude pattern '{raw}': {e}"
                    )))
                })?;
                self.excludes.push(pattern);
            }
        }
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        self.excludes.iter().any(|p| p.matches(&rel))
    }
}

#[async_trait::async_trait]
impl ContentSource for LocalSource {
    fn name(&self) -> &'static str {
        "local"
    }

    fn root_path(&self) -> &str {
        &self.root_str
    }

    fn join(&self, parent: &str, name: &str) -> String {
        Path::new(parent).join(name).to_string_lossy().into_owned()
    }

    async fn list_entries(&self, path: &str) -> Vec<SourceEntry> {
        let mut dir = match tokio::fs::read_dir(path).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(path, error = %e, "Cannot list directory");
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(path, error = %e, "Directory listing interrupted");
                    break;
                }
            };
            let entry_path = entry.path();
            if self.is_excluded(&entry_path) {
                debug!(path = %entry_path.display(), "Excluded");
                continue;
            }
            let entry_type = match entry.file_type().await {
                Ok(ft) if ft.is_dir() => EntryType::Dir,
                Ok(ft) if ft.is_file() => EntryType::File,
                Ok(_) => EntryType::Other,
                Err(e) => {
                    warn!(path = %entry_path.display(), error = %e, "Cannot stat entry");
                    EntryType::Other
                }
            };
            entries.push(SourceEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry_path.to_string_lossy().into_owned(),
                entry_type,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    async fn read_file(&self, path: &str) -> Option<String> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path, error = %e, "Cannot read file");
                return None;
            }
        };
        match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(_) => {
                warn!(path, "File is not valid UTF-8");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("main.py"), "def add(a, b):\n    return a + b\n").unwrap();
        std::fs::write(root.join("README.md"), "# Demo\n").unwrap();
        std::fs::create_dir_all(root.join("utils")).unwrap();
        std::fs::write(root.join("utils/helpers.py"), "def f():\n    pass\n").unwrap();
        std::fs::create_dir_all(root.join(".git/objects")).unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        std::fs::create_dir_all(root.join("pkg/__pycache__")).unwrap();
        std::fs::write(root.join("pkg/__pycache__/m.pyc"), [0u8, 1, 2]).unwrap();
        std::fs::write(root.join("blob.bin"), [0xffu8, 0xfe, 0x00]).unwrap();
        dir
    }

    fn names(entries: &[SourceEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[tokio::test]
    async fn lists_sorted_by_name() {
        let dir = fixture();
        let source = LocalSource::new(dir.path()).unwrap();
        let entries = source.list_entries(source.root_path()).await;
        assert_eq!(
            names(&entries),
            [".git", "README.md", "blob.bin", "main.py", "pkg", "utils"]
        );
        let utils = entries.iter().find(|e| e.name == "utils").unwrap();
        assert_eq!(utils.entry_type, EntryType::Dir);
        assert!(utils.path.ends_with("utils"));
    }

    #[tokio::test]
    async fn excludes_apply_to_directories_themselves() {
        let dir = fixture();
        let source = LocalSource::new(dir.path())
            .unwrap()
            .with_excludes(&["**/.git/**".into(), "**/__pycache__/**".into()])
            .unwrap();
        let entries = source.list_entries(source.root_path()).await;
        assert!(!names(&entries).contains(&".git"));

        let pkg = source.join(source.root_path(), "pkg");
        assert!(source.list_entries(&pkg).await.is_empty());
    }

    #[tokio::test]
    async fn missing_directory_lists_empty() {
        let dir = fixture();
        let source = LocalSource::new(dir.path()).unwrap();
        let missing = source.join(source.root_path(), "nope");
        assert!(source.list_entries(&missing).await.is_empty());
    }

    #[tokio::test]
    async fn read_file_handles_missing_and_binary() {
        let dir = fixture();
        let source = LocalSource::new(dir.path()).unwrap();
        let root = source.root_path().to_string();

        let text = source.read_file(&source.join(&root, "main.py")).await.unwrap();
        assert!(text.starts_with("def add"));
        assert!(source.read_file(&source.join(&root, "gone.py")).await.is_none());
        assert!(source.read_file(&source.join(&root, "blob.bin")).await.is_none());
    }

    #[test]
    fn new_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalSource::new(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, SkaldError::Source(SourceError::NotFound(_))));
    }

    #[test]
    fn root_name_is_last_component() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sample_project")).unwrap();
        let source = LocalSource::new(dir.path().join("sample_project")).unwrap();
        assert_eq!(source.root_name(), "sample_project");
    }
}
