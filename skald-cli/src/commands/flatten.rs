use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use skald_core::export::{self, VectorBatch};

#[derive(Args, Debug)]
pub struct FlattenArgs {
    /// Summary tree JSON written by `skald summarize`
    pub tree: PathBuf,

    /// Write documents here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Emit a vector-store ingestion batch instead of plain documents
    #[arg(long)]
    pub vector_batch: bool,
}

pub fn run(args: &FlattenArgs) -> anyhow::Result<()> {
    let tree = export::read_tree_json(&args.tree)
        .with_context(|| format!("Cannot read tree {}", args.tree.display()))?;
    let documents = export::documents_from_export(&tree);

    let value = if args.vector_batch {
        serde_json::to_value(VectorBatch::from_documents(&documents))?
    } else {
        serde_json::to_value(&documents)?
    };

    match &args.output {
        Some(path) => {
            export::write_json(path, &value)?;
            tracing::info!(documents = documents.len(), path = %path.display(), "Documents written");
        }
        None => println!("{}", serde_json::to_string_pretty(&value)?),
    }
    Ok(())
}
