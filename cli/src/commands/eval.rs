//! Eval command implementation

use anyhow::Result;
use clap::Args;
use sluice_runtime::{try_evaluate, RuntimePool};
use std::path::PathBuf;

use crate::output;

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Filter source, or @path to read it from a file
    #[arg(short, long)]
    pub filter: String,

    /// JSON document to filter ("-" reads stdin)
    #[arg(short, long)]
    pub doc: PathBuf,

    /// Document ID to use when the JSON has no string `_id`
    #[arg(long, default_value = "doc")]
    pub id: String,

    /// Treat the change as a deletion
    #[arg(long)]
    pub deleted: bool,

    /// Treat the change as an access revocation
    #[arg(long)]
    pub access_removed: bool,

    /// Engine configuration file (TOML or JSON)
    #[arg(short, long, env = "SLUICE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Per-call execution budget (e.g. "250ms"), overrides the config file
    #[arg(short, long)]
    pub timeout: Option<String>,
}

pub fn run(args: EvalArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref(), args.timeout.as_deref())?;
    let source = super::read_filter(&args.filter)?;
    let doc = super::read_document(&args.doc, &args.id)?;
    let flags = super::flags(args.deleted, args.access_removed);

    let mut pool = RuntimePool::new(config);
    match try_evaluate(&mut pool, &source, &doc, flags) {
        Ok(allowed) => output::verdict(&doc.id, allowed),
        Err(fault) => output::fault(&doc.id, &fault),
    }

    if let Ok(runtime) = pool.acquire() {
        if runtime.script_errors() > 0 {
            output::info("The filter threw; see the log above for the message");
        }
    }
    Ok(())
}
