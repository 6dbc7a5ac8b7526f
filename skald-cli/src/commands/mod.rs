pub mod flatten;
pub mod show;
pub mod summarize;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize a local directory or GitHub repository
    Summarize(summarize::SummarizeArgs),
    /// Turn a saved summary tree into retrieval documents
    Flatten(flatten::FlattenArgs),
    /// Print a saved summary tree as an indented outline
    Show(show::ShowArgs),
}

pub async fn run(cmd: Command, quiet: bool) -> anyhow::Result<()> {
    match cmd {
        Command::Summarize(args) => summarize::run(args, quiet).await,
        Command::Flatten(args) => flatten::run(&args),
        Command::Show(args) => show::run(&args),
    }
}
