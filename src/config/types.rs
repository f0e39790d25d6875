//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument
//! parsing and library configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::constants::DEFAULT_USER_AGENT;

/// Logging level for the application.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Profiler configuration.
///
/// Doubles as the clap parser surface for the CLI binary and as the
/// programmatic configuration struct for library callers.
///
/// # Examples
///
/// ```no_run
/// use tech_profiler::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     fingerprints: PathBuf::from("fingerprints.json"),
///     max_concurrency: 50,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tech_profiler",
    about = "Fetches websites and classifies the technologies they run on"
)]
pub struct Config {
    /// File with one URL per line, or `-` for stdin
    #[arg(long, default_value = "urls.txt")]
    pub file: PathBuf,

    /// Path to the fingerprint store payload (JSON). Load failure is fatal.
    #[arg(long)]
    pub fingerprints: PathBuf,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    pub log_format: LogFormat,

    /// Maximum concurrent requests
    #[arg(long, default_value_t = crate::config::SEMAPHORE_LIMIT)]
    pub max_concurrency: usize,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Disable escalation to the rendered acquisition tier
    #[arg(long, default_value_t = false)]
    pub no_render: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file: PathBuf::from("urls.txt"),
            fingerprints: PathBuf::from("fingerprints.json"),
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            max_concurrency: crate::config::SEMAPHORE_LIMIT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            no_render: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        // Test all LogLevel variants convert correctly to log::LevelFilter
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_concurrency, crate::config::SEMAPHORE_LIMIT);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(!config.no_render);
    }

    #[test]
    fn test_config_cli_parse() {
        let config =
            Config::parse_from(["tech_profiler", "--fingerprints", "fp.json", "--no-render"]);
        assert_eq!(config.fingerprints, PathBuf::from("fp.json"));
        assert!(config.no_render);
    }
}
