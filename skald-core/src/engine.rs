// Traversal engine: walks a content source and builds the summary tree.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use skald_units::{CodeUnitExtractor, ExtractOptions};

use crate::config::SummarySection;
use crate::context::{self, AmbientContext};
use crate::progress::ProgressReporter;
use crate::source::ContentSource;
use crate::summarize::Summarizer;
use crate::tree::{Node, NodeId, SummaryTree};
use crate::types::{EntryKind, SourceEntry, SummaryResult};

/// Traversal knobs, usually taken from the `[summary]` config section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct EngineOptions {
    /// Visit README entries before the rest of each listing.
    pub readme_first: bool,
    /// Hand a finished subdirectory's outbound context to its later siblings.
    pub sibling_context: bool,
    /// Summarize methods and nested functions too.
    pub include_nested: bool,
    /// Maximum directory depth below the root; 0 means unlimited.
    pub max_depth: u32,
}

impl From<&SummarySection> for EngineOptions {
    fn from(section: &SummarySection) -> Self {
        Self {
            readme_first: section.readme_first,
            sibling_context: section.sibling_context,
            include_nested: section.include_nested,
            max_depth: section.max_depth,
        }
    }
}

/// Counters collected during one traversal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraversalStats {
    pub files_summarized: u64,
    pub functions_summarized: u64,
    pub directories_summarized: u64,
    pub readmes_read: u64,
    pub entries_ignored: u64,
    pub read_failures: u64,
    pub parse_failures: u64,
    pub oracle_failures: u64,
    pub duration: Duration,
}

impl TraversalStats {
    fn count_oracle(&mut self, result: &SummaryResult) {
        if result.is_error() {
            self.oracle_failures += 1;
        }
    }
}

/// Result of [`SummaryEngine::run`].
#[derive(Debug)]
pub struct TraversalOutcome {
    pub tree: SummaryTree,
    pub stats: TraversalStats,
}

/// One directory being traversed.
struct Frame {
    node: NodeId,
    /// Entries not yet visited, in visiting order.
    pending: VecDeque<SourceEntry>,
    /// Current ambient context; refreshed by READMEs and, optionally, by
    /// finished subdirectories.
    ambient: AmbientContext,
    depth: u32,
}

/// Builds a [`SummaryTree`] from a [`ContentSource`], summarizing functions,
/// files and directories bottom-up while threading context top-down.
#[derive(Debug)]
pub struct SummaryEngine {
    source: Arc<dyn ContentSource>,
    summarizer: Arc<Summarizer>,
    extractor: CodeUnitExtractor,
    options: EngineOptions,
}

impl SummaryEngine {
    pub fn new(
        source: Arc<dyn ContentSource>,
        summarizer: Arc<Summarizer>,
        options: EngineOptions,
    ) -> Self {
        let extractor = CodeUnitExtractor::python().with_options(ExtractOptions {
            include_nested: options.include_nested,
        });
        Self {
            source,
            summarizer,
            extractor,
            options,
        }
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Traverse the whole source from its root.
    ///
    /// Never fails: unreadable entries, unparsable files and oracle errors are
    /// contained at the node that produced them and counted in the stats.
    #[instrument(skip_all, name = "summarize_tree", fields(source = self.source.name()))]
    pub async fn run(&self, reporter: &dyn ProgressReporter) -> TraversalOutcome {
        let start = Instant::now();
        let mut stats = TraversalStats::default();

        let root_path = self.source.root_path().to_string();
        let mut tree = SummaryTree::new(self.source.root_name(), root_path.clone());
        info!(root = %root_path, "Summarization starting");
        reporter.start("Summarizing", None);

        let mut stack = vec![Frame {
            node: tree.root(),
            pending: self.listing(&root_path).await,
            ambient: AmbientContext::default(),
            depth: 0,
        }];

        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };

            let Some(entry) = frame.pending.pop_front() else {
                // Directory exhausted: summarize it and hand context upward.
                let Some(done) = stack.pop() else {
                    break;
                };
                let outbound = self
                    .finish_directory(&mut tree, &done, stack.is_empty(), &mut stats, reporter)
                    .await;
                if self.options.sibling_context {
                    if let (Some(parent), Some(outbound)) = (stack.last_mut(), outbound) {
                        parent.ambient.replace(outbound);
                    }
                }
                continue;
            };

            let parent = frame.node;
            let depth = frame.depth;
            let ambient = frame.ambient.as_str().to_string();

            match EntryKind::classify(&entry.name, entry.entry_type) {
                EntryKind::PythonFile => {
                    reporter.set_current(&entry.path);
                    if let Some(node) = self.python_file(&entry, &ambient, &mut stats).await {
                        tree.attach(parent, node);
                        reporter.advance(1);
                    }
                }
                EntryKind::ReadmeFile => {
                    if let Some(refreshed) = self.readme(&entry, &mut stats).await {
                        if let Some(frame) = stack.last_mut() {
                            frame.ambient.replace(refreshed);
                        }
                    }
                }
                EntryKind::Directory => {
                    if self.options.max_depth > 0 && depth >= self.options.max_depth {
                        debug!(path = %entry.path, depth, "Directory below max depth, skipped");
                        stats.entries_ignored += 1;
                        continue;
                    }
                    let mut node = Node::new(&entry.name, EntryKind::Directory, &entry.path);
                    node.context.clone_from(&ambient);
                    let Some(child) = tree.attach(parent, node) else {
                        continue;
                    };
                    stack.push(Frame {
                        node: child,
                        pending: self.listing(&entry.path).await,
                        ambient: AmbientContext::new(ambient),
                        depth: depth + 1,
                    });
                }
                EntryKind::Other => {
                    debug!(path = %entry.path, "Ignored entry");
                    stats.entries_ignored += 1;
                }
            }
        }

        stats.duration = start.elapsed();
        reporter.finish();
        info!(
            nodes = tree.len(),
            files = stats.files_summarized,
            functions = stats.functions_summarized,
            directories = stats.directories_summarized,
            failures = stats.read_failures + stats.parse_failures + stats.oracle_failures,
            duration = ?stats.duration,
            "Summarization complete"
        );

        TraversalOutcome { tree, stats }
    }

    async fn listing(&self, path: &str) -> VecDeque<SourceEntry> {
        let entries = self.source.list_entries(path).await;
        if entries.is_empty() {
            debug!(path, "Empty or unlistable directory");
        }
        let entries = if self.options.readme_first {
            context::readme_first(entries)
        } else {
            entries
        };
        entries.into()
    }

    /// Summarize every function of a Python file, then the file itself.
    /// `None` when the file cannot be read.
    async fn python_file(
        &self,
        entry: &SourceEntry,
        ambient: &str,
        stats: &mut TraversalStats,
    ) -> Option<Node> {
        let Some(text) = self.source.read_file(&entry.path).await else {
            warn!(path = %entry.path, "Skipping unreadable Python file");
            stats.read_failures += 1;
            return None;
        };

        let units = match self.extractor.extract(&text, &entry.path) {
            Ok(units) => units,
            Err(e) => {
                warn!(path = %entry.path, error = %e, "Parse failed, summarizing file without functions");
                stats.parse_failures += 1;
                Vec::new()
            }
        };

        let mut node = Node::new(&entry.name, EntryKind::PythonFile, &entry.path);
        node.context = ambient.to_string();

        for unit in &units {
            let result = self
                .summarizer
                .summarize_function(ambient, &unit.code, &unit.qualified_name)
                .await;
            stats.count_oracle(&result);
            stats.functions_summarized += 1;
            node.summaries.push(result);
        }

        let aggregated = context::aggregate_function_summaries(&node.summaries);
        let file_summary = self
            .summarizer
            .summarize_file(ambient, &aggregated, &entry.name)
            .await
            .with_code(text);
        stats.count_oracle(&file_summary);
        stats.files_summarized += 1;
        debug!(path = %entry.path, functions = units.len(), "File summarized");

        node.final_summary = Some(file_summary);
        Some(node)
    }

    /// Summarize a README and condense it into a fresh ambient context.
    /// `None` when the README cannot be read or its summary failed.
    async fn readme(&self, entry: &SourceEntry, stats: &mut TraversalStats) -> Option<String> {
        let Some(text) = self.source.read_file(&entry.path).await else {
            warn!(path = %entry.path, "Skipping unreadable README");
            stats.read_failures += 1;
            return None;
        };
        let summary = self
            .summarizer
            .summarize_readme("", &text, &entry.name)
            .await;
        stats.count_oracle(&summary);
        stats.readmes_read += 1;
        if summary.is_error() {
            warn!(path = %entry.path, "README summary failed; keeping current context");
            return None;
        }
        debug!(path = %entry.path, "README refreshed ambient context");
        Some(self.summarizer.make_context("", &summary.summary).await)
    }

    /// Roll up a finished directory. Returns the outbound context when a
    /// non-root directory produced a summary.
    async fn finish_directory(
        &self,
        tree: &mut SummaryTree,
        frame: &Frame,
        is_root: bool,
        stats: &mut TraversalStats,
        reporter: &dyn ProgressReporter,
    ) -> Option<String> {
        let (name, collected) = {
            let node = tree.get(frame.node)?;
            let collected: Vec<SummaryResult> = node
                .children
                .iter()
                .filter_map(|c| tree.get(*c).and_then(Node::meaningful_summary))
                .cloned()
                .collect();
            (node.name.clone(), collected)
        };

        if collected.is_empty() {
            debug!(name, "Directory has no summarized children");
            return None;
        }

        reporter.set_current(&name);
        let aggregated = context::aggregate_child_summaries(&collected);
        let summary = self
            .summarizer
            .summarize_directory(frame.ambient.as_str(), &aggregated, &name)
            .await;
        stats.count_oracle(&summary);
        stats.directories_summarized += 1;
        reporter.advance(1);

        let outbound = if is_root {
            None
        } else {
            Some(
                self.summarizer
                    .make_context(frame.ambient.as_str(), &summary.summary)
                    .await,
            )
        };

        tree.set_final_summary(frame.node, summary);
        if let (Some(outbound), Some(node)) = (&outbound, tree.get_mut(frame.node)) {
            node.context.clone_from(outbound);
        }
        outbound
    }
}
