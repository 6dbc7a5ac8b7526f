use clap::Parser;

use skald_core::error::{SkaldError, SourceError};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "skald",
    version,
    about = "Summarize a code repository bottom-up, with context flowing top-down"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Classify an error into a process exit code.
///
/// Exit codes:
///   0  success
///   1  general/unknown error
///   2  configuration error
///   3  source not found
///   6  LLM provider configuration error
///   7  export write failure
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    if let Some(skald) = err.chain().find_map(|e| e.downcast_ref::<SkaldError>()) {
        return match skald {
            SkaldError::Config(_) => 2,
            SkaldError::Source(SourceError::NotFound(_)) => 3,
            SkaldError::Llm(_) => 6,
            SkaldError::Export(_) => 7,
            SkaldError::Source(_) | SkaldError::Units(_) => 1,
        };
    }

    let lower = format!("{err:#}").to_lowercase();
    if lower.contains("cannot resolve path") || lower.contains("not found") {
        3
    } else if lower.contains("config") {
        2
    } else if lower.contains("llm") || lower.contains("api key") {
        6
    } else if lower.contains("cannot write") {
        7
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(commands::run(cli.command, cli.quiet)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
