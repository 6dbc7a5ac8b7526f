use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use skald_core::config::SkaldConfig;
use skald_core::pipeline::{SkaldPipeline, SourceSpec};
use skald_core::progress::IndicatifReporter;

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Path to the repository root (ignored with --github)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Summarize a GitHub repository instead (owner/repo or URL)
    #[arg(long, value_name = "REPO")]
    pub github: Option<String>,

    /// Branch, tag or commit to read with --github
    #[arg(long = "ref", value_name = "REF", requires = "github")]
    pub git_ref: Option<String>,

    /// Config file (defaults to <PATH>/.skald/config.toml when present)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Output directory
    #[arg(long, short, default_value = "skald-out")]
    pub output: PathBuf,

    /// LLM provider override (anthropic, openai, custom, ollama)
    #[arg(long)]
    pub provider: Option<String>,

    /// Model override
    #[arg(long)]
    pub model: Option<String>,

    /// Read README files before anything else in each directory
    #[arg(long)]
    pub readme_first: bool,

    /// Feed earlier sibling summaries into later siblings' context
    #[arg(long)]
    pub sibling_context: bool,

    /// Also summarize nested functions and methods
    #[arg(long)]
    pub include_nested: bool,

    /// Stop descending below this directory depth (0 = unlimited)
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Describe how files use the repository modules they import
    #[arg(long)]
    pub relations: bool,

    /// Also write a vector-store ingestion batch
    #[arg(long)]
    pub vector_batch: bool,
}

fn load_config(args: &SummarizeArgs) -> anyhow::Result<SkaldConfig> {
    let mut config = match (&args.config, &args.github) {
        (Some(path), _) => SkaldConfig::load(path)
            .with_context(|| format!("Cannot load config {}", path.display()))?,
        (None, None) => SkaldConfig::load_or_default(&args.path)?,
        (None, Some(_)) => SkaldConfig::default(),
    };

    if let Some(provider) = &args.provider {
        config.llm.provider.clone_from(provider);
    }
    if let Some(model) = &args.model {
        config.llm.model.clone_from(model);
    }
    config.summary.readme_first |= args.readme_first;
    config.summary.sibling_context |= args.sibling_context;
    config.summary.include_nested |= args.include_nested;
    config.summary.relations |= args.relations;
    if let Some(depth) = args.max_depth {
        config.summary.max_depth = depth;
    }

    config.validate()?;
    Ok(config)
}

pub async fn run(args: SummarizeArgs, quiet: bool) -> anyhow::Result<()> {
    let spec = match &args.github {
        Some(repo) => SourceSpec::GitHub {
            repo: repo.clone(),
            git_ref: args.git_ref.clone(),
        },
        None => {
            let path = args
                .path
                .canonicalize()
                .with_context(|| format!("Cannot resolve path: {}", args.path.display()))?;
            SourceSpec::Local(path)
        }
    };

    let pipeline = SkaldPipeline::new(load_config(&args)?);
    let source = pipeline.open_source(&spec).context("Cannot open source")?;
    let summarizer = pipeline.build_summarizer()?;

    let reporter = if quiet {
        IndicatifReporter::hidden()
    } else {
        IndicatifReporter::new()
    };
    let result = pipeline.run(source, summarizer, &reporter).await;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Cannot write to {}", args.output.display()))?;
    let written = pipeline.write_outputs(&result, &args.output, args.vector_batch)?;

    if !quiet {
        let stats = &result.stats;
        println!("Summarized {} with {}/{}", result.source, result.provider, result.model);
        println!(
            "  Functions: {}  Files: {}  Directories: {}  READMEs: {}",
            stats.functions_summarized,
            stats.files_summarized,
            stats.directories_summarized,
            stats.readmes_read,
        );
        println!(
            "  Ignored: {}  Read failures: {}  Parse failures: {}  Oracle failures: {}",
            stats.entries_ignored, stats.read_failures, stats.parse_failures, stats.oracle_failures,
        );
        println!(
            "  Requests: {}  Cache hits: {}  Est. cost: ${:.4}",
            result.costs.total_requests, result.costs.cache_hits, result.costs.estimated_cost_usd,
        );
        println!("  Documents: {}", result.documents.len());
        println!("  Tree:      {}", written.tree.display());
        println!("  Documents: {}", written.documents.display());
        if let Some(batch) = &written.vector_batch {
            println!("  Batch:     {}", batch.display());
        }
        if let (Some(path), Some(rel)) = (&written.relations, &result.relation_stats) {
            println!(
                "  Relations: {} ({} imports, {} failed descriptions)",
                path.display(),
                rel.imports_resolved,
                rel.description_failures,
            );
        }
        println!("  Took {:.1}s", stats.duration.as_secs_f64());
    }

    Ok(())
}
