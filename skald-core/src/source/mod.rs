//! Content sources: where the engine lists directories and reads files.
//!
//! Every source swallows its own failures at this boundary. A listing that
//! cannot be produced is empty, and a file that cannot be read is `None`. The
//! cause is logged where it happens.

mod github;
mod local;
mod memory;

pub use github::{GitHubSource, parse_github_url};
pub use local::LocalSource;
pub use memory::MemorySource;

use crate::types::SourceEntry;

/// Read-only view of a hierarchical file store.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync + std::fmt::Debug {
    /// Short identifier for logs (`local`, `github`, `memory`).
    fn name(&self) -> &'static str;

    /// Path of the root directory, in this source's path syntax.
    fn root_path(&self) -> &str;

    /// Display name of the root directory.
    fn root_name(&self) -> String {
        crate::tree::root_name(self.root_path())
    }

    /// Path of the child `name` of directory `parent`.
    fn join(&self, parent: &str, name: &str) -> String {
        if parent.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", parent.trim_end_matches('/'))
        }
    }

    /// Children of the directory at `path`, in this source's listing order.
    async fn list_entries(&self, path: &str) -> Vec<SourceEntry>;

    /// Full text of the file at `path`, or `None` if it cannot be read.
    async fn read_file(&self, path: &str) -> Option<String>;
}
