use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Error as ReqwestError;
use strum::IntoEnumIterator;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;
use tokio_retry::strategy::ExponentialBackoff;

/// Fatal errors while loading the fingerprint store at startup.
///
/// Any of these aborts startup: a profiler without a valid store cannot
/// produce meaningful results, so there is no per-request recovery path.
#[derive(Error, Debug)]
pub enum StoreLoadError {
    /// Payload is not valid JSON or does not match the expected structure.
    #[error("Fingerprint payload parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    /// A required top-level key (`technologies` or `categories`) is missing.
    #[error("Fingerprint payload is missing required key '{0}'")]
    MissingKey(&'static str),

    /// Failed to read the payload from disk.
    #[error("Failed to read fingerprint payload: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors while acquiring a page snapshot.
///
/// These abort the request's whole pipeline: no partial detections are ever
/// returned for a page we could not capture. Retries, if any, belong to the
/// acquisition layer, never to the pipeline itself.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// Network-level failure (connect error, unreachable host, protocol error).
    #[error("HTTP fetch failed: {0}")]
    HttpError(#[from] ReqwestError),

    /// The tier's timeout budget was exhausted.
    #[error("Fetch timed out after {budget_secs}s ({tier} tier)")]
    Timeout {
        /// Name of the acquisition tier that timed out.
        tier: &'static str,
        /// The tier's timeout budget in seconds.
        budget_secs: u64,
    },

    /// The input URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Types of recoverable incidents counted during a run.
///
/// These are tracked for reporting only. Pattern-level failures are absorbed
/// where they happen (a bad rule never degrades detection of unrelated
/// technologies); acquisition failures abort their own request but not the
/// run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
#[allow(missing_docs)]
pub enum ErrorType {
    PatternCompileError,
    FetchTimeoutError,
    FetchConnectError,
    FetchOtherError,
    RenderError,
    FirmographicError,
}

impl ErrorType {
    /// Human-readable label used in the end-of-run summary.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::PatternCompileError => "Fingerprint pattern compile error",
            ErrorType::FetchTimeoutError => "Fetch timeout",
            ErrorType::FetchConnectError => "Fetch connect error",
            ErrorType::FetchOtherError => "Fetch other error",
            ErrorType::RenderError => "Render tier error",
            ErrorType::FirmographicError => "Firmographic inference error",
        }
    }
}

/// Thread-safe incident counters.
///
/// Tracks the count of each [`ErrorType`] using atomic counters, allowing
/// concurrent access from multiple tasks. All counters start at zero.
pub struct ErrorStats {
    errors: HashMap<ErrorType, AtomicUsize>,
}

impl ErrorStats {
    /// Creates counters with every [`ErrorType`] initialized to zero.
    pub fn new() -> Self {
        let mut errors = HashMap::new();
        for error in ErrorType::iter() {
            errors.insert(error, AtomicUsize::new(0));
        }
        ErrorStats { errors }
    }

    /// Adds one to the given counter.
    pub fn increment(&self, error: ErrorType) {
        // All ErrorType variants are initialized in new(), so unwrap() is safe
        self.errors
            .get(&error)
            .unwrap()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Reads the current value of the given counter.
    pub fn get_count(&self, error: ErrorType) -> usize {
        // All ErrorType variants are initialized in new(), so unwrap() is safe
        self.errors.get(&error).unwrap().load(Ordering::SeqCst)
    }
}

impl Default for ErrorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints non-zero incident counters at the end of a run.
pub fn print_error_statistics(error_stats: &ErrorStats) {
    for error_type in ErrorType::iter() {
        let count = error_stats.get_count(error_type);
        if count > 0 {
            log::info!("{}: {}", error_type.as_str(), count);
        }
    }
}

/// Creates the exponential backoff strategy used by the acquisition layer.
///
/// Initial delay `RETRY_INITIAL_DELAY_MS`, doubling per attempt, capped at
/// `RETRY_MAX_DELAY_SECS`.
pub fn get_retry_strategy() -> ExponentialBackoff {
    ExponentialBackoff::from_millis(crate::config::RETRY_INITIAL_DELAY_MS)
        .factor(crate::config::RETRY_FACTOR)
        .max_delay(Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS))
}

/// Categorizes a `reqwest::Error` into the matching counter and records it.
pub fn update_fetch_error_stats(error_stats: &ErrorStats, error: &reqwest::Error) {
    let error_type = if error.is_timeout() {
        ErrorType::FetchTimeoutError
    } else if error.is_connect() {
        ErrorType::FetchConnectError
    } else {
        ErrorType::FetchOtherError
    };
    error_stats.increment(error_type);
}
