use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use skald_core::export::{self, TreeExport};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Summary tree JSON written by `skald summarize`
    pub tree: PathBuf,

    /// Truncate summaries to this many characters (0 = no limit)
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Also list per-function summaries under each file
    #[arg(long)]
    pub functions: bool,
}

pub fn run(args: &ShowArgs) -> anyhow::Result<()> {
    let tree = export::read_tree_json(&args.tree)
        .with_context(|| format!("Cannot read tree {}", args.tree.display()))?;
    print!("{}", render(&tree, args.width, args.functions));
    Ok(())
}

fn render(tree: &TreeExport, width: usize, functions: bool) -> String {
    let mut out = String::new();
    let mut stack = vec![(tree, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        let indent = "  ".repeat(depth);
        let summary = node
            .final_summary
            .as_ref()
            .filter(|s| !s.is_empty_sentinel())
            .map_or("-", |s| s.summary.as_str());
        let _ = writeln!(
            out,
            "{indent}{} [{}] {}",
            node.name,
            node.kind.as_str(),
            truncate(summary, width)
        );
        if functions {
            for f in &node.summaries {
                let _ = writeln!(out, "{indent}    fn {}: {}", f.name, truncate(&f.summary, width));
            }
        }
        stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if width == 0 || line.chars().count() <= width {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
