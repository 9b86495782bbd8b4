//! Check command implementation

use anyhow::Result;
use clap::Args;
use sluice_runtime::RuntimePool;
use std::path::PathBuf;

use crate::output;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Filter source, or @path to read it from a file
    pub filter: String,

    /// Engine configuration file (TOML or JSON)
    #[arg(short, long, env = "SLUICE_CONFIG")]
    pub config: Option<PathBuf>,
}

pub fn run(args: CheckArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref(), None)?;
    let source = super::read_filter(&args.filter)?;

    if source.trim().is_empty() {
        output::info("Empty filter: no filter would be installed, every change replicates");
        return Ok(());
    }

    let mut pool = RuntimePool::new(config);
    let runtime = pool.acquire()?;
    match runtime.check(&source) {
        Ok(()) => {
            output::success("Filter compiles");
            Ok(())
        }
        Err(fault) => {
            output::error(&fault.to_string());
            anyhow::bail!("Filter would reject every document")
        }
    }
}
