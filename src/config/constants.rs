//! Configuration constants.
//!
//! This module defines all configuration constants used throughout the
//! application, including per-tier timeout budgets, size limits, and
//! escalation thresholds.

use std::time::Duration;

/// Maximum concurrent requests (semaphore limit)
pub const SEMAPHORE_LIMIT: usize = 30;
/// Progress logging interval in seconds
pub const LOGGING_INTERVAL: u64 = 5;

// Acquisition tier timeout budgets
/// Timeout budget for the light (plain HTTP) acquisition tier.
///
/// Each tier carries its own budget; exhausting it aborts the request's
/// pipeline entirely with no partial result.
pub const LIGHT_TIER_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout budget for the rendered (escalated) acquisition tier.
///
/// Rendering is allowed a larger budget since it is only attempted when the
/// light snapshot was judged unrepresentative.
pub const RENDER_TIER_TIMEOUT: Duration = Duration::from_secs(30);
/// TCP connection timeout in seconds
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 5;
/// Maximum redirect hops the HTTP client will follow
pub const MAX_REDIRECT_HOPS: usize = 10;

// Retry policy for the light acquisition tier (acquisition-layer concern;
// the detection pipeline itself never retries)
/// Maximum fetch attempts per request within the tier budget.
pub const RETRY_MAX_ATTEMPTS: usize = 3;
/// Initial backoff delay in milliseconds.
pub const RETRY_INITIAL_DELAY_MS: u64 = 250;
/// Backoff multiplier between attempts.
pub const RETRY_FACTOR: u64 = 2;
/// Backoff delay cap in seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 2;

// Response size limits
/// Maximum response body size in bytes (2MB)
/// Responses larger than this are truncated to prevent memory exhaustion
pub const MAX_RESPONSE_BODY_SIZE: usize = 2 * 1024 * 1024;

// Escalation policy thresholds
/// Minimum visible (non-whitespace, script-stripped) body characters below
/// which the light snapshot is considered too thin and rendering is required.
pub const MIN_VISIBLE_BODY_CHARS: usize = 200;

/// Default User-Agent string for HTTP requests.
///
/// Users can override this via the `--user-agent` CLI flag.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Fallback display category for technologies whose category ID is absent
/// from the store's category table.
pub const FALLBACK_CATEGORY: &str = "Miscellaneous";
