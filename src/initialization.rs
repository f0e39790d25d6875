//! Process-level initialization: logging, HTTP client, concurrency limits.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::ClientBuilder;
use tldextract::{TldExtractor, TldOption};
use tokio::sync::Semaphore;

use crate::config::{LogFormat, LogLevel, MAX_REDIRECT_HOPS, TCP_CONNECT_TIMEOUT_SECS};

/// Initializes the global logger.
///
/// `Plain` uses env_logger's default human-readable line format; `Json`
/// emits one JSON object per record for machine consumption. Per-request
/// timeouts are enforced by the acquisition layer, so there is no logging
/// of elapsed budgets here.
pub fn init_logger(level: LogLevel, format: LogFormat) -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.into());

    if matches!(format, LogFormat::Json) {
        builder.format(|buf, record| {
            let line = serde_json::json!({
                "ts": chrono::Utc::now().to_rfc3339(),
                "level": record.level().to_string(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            writeln!(buf, "{}", line)
        });
    }

    builder
        .try_init()
        .context("Failed to initialize the logger")?;
    Ok(())
}

/// Builds the shared light-tier HTTP client.
///
/// No client-wide total timeout: each tier enforces its own budget around
/// the request, and a global timeout would double-count retries.
pub fn init_client(user_agent: &str) -> Result<Arc<reqwest::Client>, reqwest::Error> {
    let client = ClientBuilder::new()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECT_HOPS))
        .gzip(true)
        .build()?;
    Ok(Arc::new(client))
}

/// Bounds in-flight requests across the run.
pub fn init_semaphore(count: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(count))
}

/// Public-suffix extractor shared by firmographic inference.
pub fn init_extractor() -> Arc<TldExtractor> {
    Arc::new(TldExtractor::new(TldOption::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_client_builds() {
        let client = init_client("test-agent/1.0");
        assert!(client.is_ok());
    }

    #[test]
    fn test_init_semaphore_permits() {
        let semaphore = init_semaphore(5);
        assert_eq!(semaphore.available_permits(), 5);
    }
}
