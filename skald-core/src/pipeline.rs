// Pipeline orchestrator: source → traversal → relations → flatten → write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::SkaldConfig;
use crate::engine::{EngineOptions, SummaryEngine, TraversalStats};
use crate::export::{self, Document, VectorBatch};
use crate::llm::CostTracker;
use crate::llm::providers::create_provider;
use crate::progress::ProgressReporter;
use crate::relations::{RelationBuilder, RelationMap, RelationStats};
use crate::source::{ContentSource, GitHubSource, LocalSource};
use crate::summarize::{Summarizer, SummarizerOptions, TEMPLATE_VERSION};
use crate::tree::SummaryTree;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const VECTOR_BATCH_FILE: &str = "vector_batch.json";

/// Where to read the repository from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Local(PathBuf),
    GitHub {
        /// `owner/repo` or a GitHub URL.
        repo: String,
        git_ref: Option<String>,
    },
}

/// Everything one run produced.
#[derive(Debug)]
pub struct PipelineResult {
    pub tree: SummaryTree,
    pub documents: Vec<Document>,
    pub stats: TraversalStats,
    pub costs: CostTracker,
    /// Present when `summary.relations` is on.
    pub relations: Option<RelationMap>,
    pub relation_stats: Option<RelationStats>,
    pub provider: String,
    pub model: String,
    pub source: String,
}

/// Run metadata written next to the outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    pub skald_version: String,
    pub source: String,
    pub root: String,
    pub provider: String,
    pub model: String,
    pub template_version: String,
    pub node_count: usize,
    pub document_count: usize,
    pub stats: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_stats: Option<serde_json::Value>,
    pub costs: CostTracker,
}

/// Paths of the files written by [`SkaldPipeline::write_outputs`].
#[derive(Debug, Clone, Default)]
pub struct WrittenFiles {
    pub tree: PathBuf,
    pub documents: PathBuf,
    pub manifest: PathBuf,
    pub vector_batch: Option<PathBuf>,
    pub relations: Option<PathBuf>,
}

/// Orchestrates a full summarization run from a [`SkaldConfig`].
#[derive(Debug, Clone)]
pub struct SkaldPipeline {
    config: SkaldConfig,
}

impl SkaldPipeline {
    pub fn new(config: SkaldConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SkaldConfig {
        &self.config
    }

    pub fn open_source(&self, spec: &SourceSpec) -> crate::error::Result<Arc<dyn ContentSource>> {
        match spec {
            SourceSpec::Local(path) => {
                let source =
                    LocalSource::new(path)?.with_excludes(&self.config.source.exclude_patterns)?;
                Ok(Arc::new(source))
            }
            SourceSpec::GitHub { repo, git_ref } => Ok(Arc::new(GitHubSource::from_spec(
                repo,
                git_ref.clone(),
                &self.config.source.github,
            )?)),
        }
    }

    /// Build the oracle client from the `[llm]` section.
    pub fn build_summarizer(&self) -> crate::error::Result<Summarizer> {
        let llm = &self.config.llm;
        let api_key = llm.api_key();
        let provider = create_provider(&llm.provider, &llm.model, api_key.as_deref(), llm.base_url())?;
        Ok(Summarizer::new(provider, SummarizerOptions::from(llm)))
    }

    /// Traverse `source` and flatten the result.
    #[instrument(skip_all, name = "pipeline_run")]
    pub async fn run(
        &self,
        source: Arc<dyn ContentSource>,
        summarizer: Summarizer,
        reporter: &dyn ProgressReporter,
    ) -> PipelineResult {
        let summarizer = Arc::new(summarizer);
        let options = EngineOptions::from(&self.config.summary);
        let engine = SummaryEngine::new(Arc::clone(&source), Arc::clone(&summarizer), options);

        let outcome = engine.run(reporter).await;

        let (relations, relation_stats) = if self.config.summary.relations {
            let built = RelationBuilder::new(Arc::clone(&summarizer))
                .build(&outcome.tree)
                .await;
            (Some(built.relations), Some(built.stats))
        } else {
            (None, None)
        };

        let documents = export::flatten(&outcome.tree);
        info!(documents = documents.len(), "Flattened documents");

        PipelineResult {
            tree: outcome.tree,
            documents,
            stats: outcome.stats,
            costs: summarizer.costs(),
            relations,
            relation_stats,
            provider: summarizer.provider().name().to_string(),
            model: summarizer.provider().model_id().to_string(),
            source: source.name().to_string(),
        }
    }

    /// Write tree, documents and manifest into `out_dir`, plus the vector
    /// batch when asked and the relations when the run built them.
    pub fn write_outputs(
        &self,
        result: &PipelineResult,
        out_dir: &Path,
        vector_batch: bool,
    ) -> crate::error::Result<WrittenFiles> {
        let output = &self.config.output;
        let mut written = WrittenFiles {
            tree: out_dir.join(&output.tree_file),
            documents: out_dir.join(&output.documents_file),
            manifest: out_dir.join(MANIFEST_FILE),
            vector_batch: None,
            relations: None,
        };

        export::write_json(&written.tree, &result.tree.to_export())?;
        export::write_json(&written.documents, &result.documents)?;
        export::write_json(&written.manifest, &manifest(result))?;

        if vector_batch {
            let path = out_dir.join(VECTOR_BATCH_FILE);
            export::write_json(&path, &VectorBatch::from_documents(&result.documents))?;
            written.vector_batch = Some(path);
        }

        if let Some(relations) = &result.relations {
            let path = out_dir.join(&output.relations_file);
            export::write_json(&path, relations)?;
            written.relations = Some(path);
        }

        info!(dir = %out_dir.display(), "Outputs written");
        Ok(written)
    }
}

fn manifest(result: &PipelineResult) -> Manifest {
    let root = result
        .tree
        .get(result.tree.root())
        .map(|n| n.path.clone())
        .unwrap_or_default();
    Manifest {
        generated_at: Utc::now(),
        skald_version: env!("CARGO_PKG_VERSION").to_string(),
        source: result.source.clone(),
        root,
        provider: result.provider.clone(),
        model: result.model.clone(),
        template_version: TEMPLATE_VERSION.to_string(),
        node_count: result.tree.len(),
        document_count: result.documents.len(),
        stats: serde_json::to_value(&result.stats).unwrap_or_default(),
        relation_stats: result
            .relation_stats
            .as_ref()
            .and_then(|s| serde_json::to_value(s).ok()),
        costs: result.costs.clone(),
    }
}
