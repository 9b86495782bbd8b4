//! Bench command implementation
//!
//! Runs one runtime per worker thread, the way a replicator's worker pool
//! would, and checks that no script handles survive the run.

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use sluice_runtime::{evaluate, metrics, EngineConfig, RuntimePool};
use sluice_shared::{Document, FlagSet};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tracing::debug;

use crate::output;

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Filter source, or @path to read it from a file
    #[arg(short, long)]
    pub filter: String,

    /// JSON document to filter ("-" reads stdin)
    #[arg(short, long)]
    pub doc: PathBuf,

    /// Document ID to use when the JSON has no string `_id`
    #[arg(long, default_value = "doc")]
    pub id: String,

    /// Worker threads
    #[arg(short = 'n', long, default_value = "4")]
    pub threads: usize,

    /// Evaluations per thread
    #[arg(short, long, default_value = "10000")]
    pub iterations: u64,

    /// Treat the change as a deletion
    #[arg(long)]
    pub deleted: bool,

    /// Treat the change as an access revocation
    #[arg(long)]
    pub access_removed: bool,

    /// Engine configuration file (TOML or JSON)
    #[arg(short, long, env = "SLUICE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print Prometheus metrics when done
    #[arg(long)]
    pub metrics: bool,
}

/// What one worker observed
struct WorkerReport {
    allowed: u64,
    live_handles: usize,
    runtimes: u64,
}

fn run_worker(
    config: EngineConfig,
    source: &str,
    doc: &Document,
    flags: FlagSet,
    iterations: u64,
    progress: &ProgressBar,
) -> WorkerReport {
    let mut pool = RuntimePool::new(config);
    let mut allowed = 0;
    for i in 0..iterations {
        if evaluate(&mut pool, source, doc, flags) {
            allowed += 1;
        }
        if i % 100 == 99 {
            progress.inc(100);
        }
    }
    progress.inc(iterations % 100);

    let live_handles = pool.acquire().map(|rt| rt.live_handles()).unwrap_or(0);
    debug!(
        "Worker finished: {} of {} allowed, {} live handles",
        allowed, iterations, live_handles
    );
    WorkerReport {
        allowed,
        live_handles,
        runtimes: pool.generation(),
    }
}

pub fn run(args: BenchArgs) -> Result<()> {
    if args.threads == 0 {
        anyhow::bail!("Thread count must be greater than 0");
    }

    let config = super::load_config(args.config.as_deref(), None)?;
    let source = super::read_filter(&args.filter)?;
    let doc = super::read_document(&args.doc, &args.id)?;
    let flags = super::flags(args.deleted, args.access_removed);

    let total = args.threads as u64 * args.iterations;
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} evaluations ({per_sec})")?,
    );

    let started = Instant::now();
    let reports: Vec<WorkerReport> = thread::scope(|scope| {
        let workers: Vec<_> = (0..args.threads)
            .map(|_| {
                let config = config.clone();
                let (source, doc, progress) = (&source, &doc, &progress);
                scope.spawn(move || run_worker(config, source, doc, flags, args.iterations, progress))
            })
            .collect();
        workers
            .into_iter()
            .filter_map(|worker| worker.join().ok())
            .collect()
    });
    let elapsed = started.elapsed();
    progress.finish_and_clear();

    if reports.len() != args.threads {
        anyhow::bail!("{} worker thread(s) panicked", args.threads - reports.len());
    }

    let allowed: u64 = reports.iter().map(|r| r.allowed).sum();
    let leaked: usize = reports.iter().map(|r| r.live_handles).sum();
    let recreated: u64 = reports.iter().map(|r| r.runtimes.saturating_sub(1)).sum();

    output::info(&format!(
        "{} evaluations on {} threads in {:.2?} ({:.0}/s)",
        total,
        args.threads,
        elapsed,
        total as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    ));
    output::info(&format!("{} allowed, {} filtered out", allowed, total - allowed));
    if recreated > 0 {
        output::info(&format!("{} runtime(s) recreated during the run", recreated));
    }

    if args.metrics {
        print!("{}", metrics::encode_metrics());
    }

    if leaked > 0 {
        output::error(&format!("{} script handle(s) still live after the run", leaked));
        anyhow::bail!("Handle leak detected");
    }
    output::success("All script handles released");
    Ok(())
}
