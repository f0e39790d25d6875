//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `tech_profiler` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate. Per-URL
//! reports go to stdout as JSON lines; logs go to stderr.

use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use tech_profiler::initialization::init_logger;
use tech_profiler::{run_profile, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    init_logger(config.log_level.clone(), config.log_format.clone())
        .context("Failed to initialize logger")?;

    match run_profile(config).await {
        Ok(report) => {
            eprintln!(
                "Profiled {} URL{} ({} succeeded, {} failed) in {:.1}s",
                report.total_urls,
                if report.total_urls == 1 { "" } else { "s" },
                report.successful,
                report.failed,
                report.elapsed_seconds
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("tech_profiler error: {:#}", e);
            process::exit(1);
        }
    }
}
