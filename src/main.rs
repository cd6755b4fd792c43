//! # Application Entry Point
//!
//! Parse the CLI, initialize tracing, and dispatch to the requested
//! pipeline. A run that finishes with failed samples exits non-zero so
//! retries can be scripted.

use std::time::Instant;

use anyhow::Context;
use tracing::info;

use haplograph::config::{Command, Config};
use haplograph::pipelines::{IndexBuildPipeline, MappingPipeline, PathFindingPipeline};

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Console subscriber; verbosity is controlled via `RUST_LOG`
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

fn run() -> anyhow::Result<()> {
    let start = Instant::now();
    let config = Config::parse_and_validate().context("invalid configuration")?;

    let failed_samples = match config.command {
        Command::BuildIndex(args) => {
            IndexBuildPipeline::new(args)
                .run()
                .context("index build failed")?;
            0
        }
        Command::MapReads(args) => MappingPipeline::new(args)
            .run()
            .context("read mapping failed")?,
        Command::FindPaths(args) => PathFindingPipeline::new(args)
            .run()
            .context("path finding failed")?,
    };

    info!(elapsed = ?start.elapsed(), failed_samples, "run finished");
    if failed_samples > 0 {
        eprintln!("{failed_samples} sample(s) failed; rerun to retry them");
        std::process::exit(2);
    }
    Ok(())
}
