//! tech_profiler library: website technology detection and classification.
//!
//! Fetches web pages through a tiered acquisition pipeline, matches them
//! against a fingerprint store, expands implied technologies, and reports a
//! normalized classification plus best-effort firmographics.
//!
//! # Example
//!
//! ```no_run
//! use tech_profiler::{Config, run_profile};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     file: std::path::PathBuf::from("urls.txt"),
//!     fingerprints: std::path::PathBuf::from("fingerprints.json"),
//!     ..Default::default()
//! };
//!
//! let report = run_profile(config).await?;
//! println!("Profiled {} URLs: {} succeeded, {} failed",
//!          report.total_urls, report.successful, report.failed);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or call library functions within an async context.

#![warn(missing_docs)]

pub mod config;
mod error_handling;
mod escalation;
mod fetch;
mod fingerprint;
mod firmographic;
pub mod initialization;
mod pipeline;
mod snapshot;
mod taxonomy;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use error_handling::{AcquisitionError, ErrorStats, ErrorType, StoreLoadError};
pub use escalation::EscalationReason;
pub use fetch::{RendererPool, SnapshotRenderer};
pub use fingerprint::{Detection, EvidenceSource, FingerprintStore};
pub use firmographic::Firmographics;
pub use pipeline::{ProfileReport, Profiler};
pub use run::{run_profile, RunReport};
pub use snapshot::{FetchTier, PageSnapshot};
pub use taxonomy::{display_name, CategoryBucket, NormalizedResult};

// Internal run module (contains the batch-processing loop)
mod run {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use anyhow::{Context, Result};
    use futures::stream::FuturesUnordered;
    use futures::StreamExt;
    use log::{info, warn};
    use tokio::io::{AsyncBufReadExt, BufReader};

    use crate::config::{Config, LOGGING_INTERVAL};
    use crate::error_handling::print_error_statistics;
    use crate::fingerprint::FingerprintStore;
    use crate::initialization::init_semaphore;
    use crate::pipeline::Profiler;

    /// Results of a profiling run.
    #[derive(Debug, Clone)]
    pub struct RunReport {
        /// Total number of URLs attempted
        pub total_urls: usize,
        /// Number of URLs successfully profiled
        pub successful: usize,
        /// Number of URLs that failed
        pub failed: usize,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    /// Profiles every URL in the configured input and prints one JSON
    /// report per line to stdout.
    ///
    /// This is the main entry point for batch use. URLs come from the
    /// configured file, or stdin when the file is `-`; blank lines and
    /// `#` comments are skipped. Requests run concurrently up to
    /// `max_concurrency`.
    ///
    /// # Errors
    ///
    /// Fails if the fingerprint store cannot be loaded, if the input
    /// cannot be opened, or if the HTTP client cannot be built. Per-URL
    /// failures are logged and counted, never fatal.
    pub async fn run_profile(config: Config) -> Result<RunReport> {
        let store = FingerprintStore::load_from_path(&config.fingerprints, None)
            .await
            .context("Failed to load the fingerprint store")?;
        let profiler = Arc::new(Profiler::new(Arc::new(store), &config)?);
        let semaphore = init_semaphore(config.max_concurrency);

        let reader: Box<dyn tokio::io::AsyncBufRead + Unpin + Send> =
            if config.file.as_os_str() == "-" {
                info!("Reading URLs from stdin");
                Box::new(BufReader::new(tokio::io::stdin()))
            } else {
                let file = tokio::fs::File::open(&config.file)
                    .await
                    .context("Failed to open input file")?;
                Box::new(BufReader::new(file))
            };
        let mut lines = reader.lines();

        let start_time = Instant::now();
        let attempted = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let progress = {
            let completed = Arc::clone(&completed);
            tokio::spawn(async move {
                let mut ticker =
                    tokio::time::interval(Duration::from_secs(LOGGING_INTERVAL));
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let done = completed.load(Ordering::SeqCst);
                    let elapsed = start_time.elapsed().as_secs_f64();
                    info!(
                        "Profiled {} URLs in {:.1}s (~{:.2} URLs/sec)",
                        done,
                        elapsed,
                        done as f64 / elapsed.max(f64::EPSILON)
                    );
                }
            })
        };

        let mut tasks = FuturesUnordered::new();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read line from input: {e}");
                    continue;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let url = normalize_url(trimmed);

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Semaphore closed, skipping URL: {url}");
                    continue;
                }
            };

            attempted.fetch_add(1, Ordering::SeqCst);
            let profiler = Arc::clone(&profiler);
            let completed = Arc::clone(&completed);
            let failed = Arc::clone(&failed);

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                match profiler.profile(&url).await {
                    Ok(report) => {
                        match serde_json::to_string(&report) {
                            Ok(line) => println!("{line}"),
                            Err(e) => warn!("Failed to serialize report for {url}: {e}"),
                        }
                        completed.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        warn!("Failed to profile {url}: {e}");
                        failed.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }));
        }

        while let Some(result) = tasks.next().await {
            if let Err(e) = result {
                warn!("Profiling task panicked: {e}");
            }
        }
        progress.abort();

        profiler.shutdown().await;
        print_error_statistics(profiler.error_stats());

        let elapsed_seconds = start_time.elapsed().as_secs_f64();
        let total_urls = attempted.load(Ordering::SeqCst);
        let successful = completed.load(Ordering::SeqCst);
        info!(
            "Run complete: {}/{} URLs succeeded in {:.1}s",
            successful, total_urls, elapsed_seconds
        );

        Ok(RunReport {
            total_urls,
            successful,
            failed: failed.load(Ordering::SeqCst),
            elapsed_seconds,
        })
    }

    /// Prepends `https://` to bare hostnames; URLs with a scheme pass through.
    fn normalize_url(raw: &str) -> String {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("https://{raw}")
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_normalize_url() {
            assert_eq!(normalize_url("example.com"), "https://example.com");
            assert_eq!(normalize_url("http://example.com"), "http://example.com");
            assert_eq!(
                normalize_url("https://example.com/a"),
                "https://example.com/a"
            );
        }
    }
}
