//! CLI for Sluice
//!
//! Developer tooling for replication filters:
//! - eval: Evaluate a filter against a JSON document
//! - check: Report whether a filter compiles
//! - bench: Evaluate on many threads and verify handle cleanup

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Sluice - script-driven replication filters", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose logging (includes console.log output from filters)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a filter against one document
    Eval(commands::eval::EvalArgs),

    /// Check that a filter compiles
    Check(commands::check::CheckArgs),

    /// Evaluate a filter repeatedly on several threads
    Bench(commands::bench::BenchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Eval(args) => commands::eval::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Bench(args) => commands::bench::run(args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
