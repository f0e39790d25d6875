//! Page acquisition.
//!
//! Builds [`PageSnapshot`]s for the pipeline. Tier-1 (`Light`) is a plain
//! HTTP GET with a short budget; tier-2 (`Rendered`) goes through the
//! pluggable [`SnapshotRenderer`] seam in [`render`]. Retries live here, in
//! the acquisition layer, behind each tier's timeout budget; the pipeline
//! itself never retries.

pub mod render;
pub mod request;

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use scraper::{Html, Selector};
use tokio_retry::Retry;

use crate::config::{
    LIGHT_TIER_TIMEOUT, MAX_RESPONSE_BODY_SIZE, RENDER_TIER_TIMEOUT, RETRY_MAX_ATTEMPTS,
};
use crate::error_handling::{get_retry_strategy, AcquisitionError};
use crate::snapshot::{FetchTier, PageSnapshot};

pub use render::{HeavyFetchRenderer, RendererPool, SnapshotRenderer};

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("meta selector is valid"));

static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script[src]").expect("script selector is valid"));

/// Fetches a light-tier snapshot of `url`.
///
/// The whole attempt (including retries with exponential backoff) runs
/// under `LIGHT_TIER_TIMEOUT`; exhausting the budget aborts the request
/// with [`AcquisitionError::Timeout`].
pub async fn fetch_light(
    client: &reqwest::Client,
    url: &str,
) -> Result<PageSnapshot, AcquisitionError> {
    fetch_tier(client, url, FetchTier::Light, LIGHT_TIER_TIMEOUT).await
}

/// Fetches a snapshot with the rendered tier's extended budget.
///
/// Used by the bundled [`HeavyFetchRenderer`]; custom renderers replace
/// this entirely.
pub(crate) async fn fetch_heavy(
    client: &reqwest::Client,
    url: &str,
) -> Result<PageSnapshot, AcquisitionError> {
    fetch_tier(client, url, FetchTier::Rendered, RENDER_TIER_TIMEOUT).await
}

async fn fetch_tier(
    client: &reqwest::Client,
    url: &str,
    tier: FetchTier,
    budget: Duration,
) -> Result<PageSnapshot, AcquisitionError> {
    // Reject unparseable input before spending network time on it
    url::Url::parse(url)?;

    let tier_name = match tier {
        FetchTier::Light => "light",
        FetchTier::Rendered => "rendered",
    };

    let attempt = Retry::spawn(get_retry_strategy().take(RETRY_MAX_ATTEMPTS), || {
        fetch_once(client, url, tier)
    });

    match tokio::time::timeout(budget, attempt).await {
        Ok(result) => result,
        Err(_) => Err(AcquisitionError::Timeout {
            tier: tier_name,
            budget_secs: budget.as_secs(),
        }),
    }
}

/// One GET attempt; redirect following and decompression are handled by the
/// client configuration.
async fn fetch_once(
    client: &reqwest::Client,
    url: &str,
    tier: FetchTier,
) -> Result<PageSnapshot, AcquisitionError> {
    let mut response = request::RequestHeaders::apply_to_request_builder(client.get(url))
        .send()
        .await?;

    let final_url = response.url().to_string();
    let status = response.status().as_u16();
    let headers = request::headers_to_map(response.headers());
    let cookies = request::cookies_from_headers(response.headers());

    // Stream the body chunk by chunk so the size cap bounds memory, not
    // just the length of an already-buffered response.
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = MAX_RESPONSE_BODY_SIZE - body.len();
        let take = remaining.min(chunk.len());
        body.extend_from_slice(&chunk[..take]);
        if take < chunk.len() {
            log::debug!(
                "Truncated response body from {} at {} bytes",
                final_url,
                body.len()
            );
            break;
        }
    }
    let html = String::from_utf8_lossy(&body).into_owned();

    let (scripts, meta) = extract_document_data(&html, &final_url);

    log::debug!(
        "Fetched {} ({} bytes, status {}, {} scripts, {} cookies)",
        final_url,
        body.len(),
        status,
        scripts.len(),
        cookies.len()
    );

    Ok(PageSnapshot::new(
        final_url, status, headers, html, scripts, meta, cookies, tier,
    ))
}

/// Parses the document once and pulls out script sources and meta tags.
///
/// `Html` is not `Send`, so extraction happens in one synchronous block
/// before the snapshot crosses any await point. Relative script URLs are
/// resolved against the final URL; unresolvable ones are kept verbatim.
fn extract_document_data(html: &str, final_url: &str) -> (Vec<String>, HashMap<String, String>) {
    let document = Html::parse_document(html);
    let base = url::Url::parse(final_url).ok();

    let mut scripts = Vec::new();
    for element in document.select(&SCRIPT_SELECTOR) {
        if let Some(src) = element.value().attr("src") {
            let resolved = base
                .as_ref()
                .and_then(|b| b.join(src).ok())
                .map(|u| u.to_string())
                .unwrap_or_else(|| src.to_string());
            scripts.push(resolved);
        }
    }

    let mut meta = HashMap::new();
    for element in document.select(&META_SELECTOR) {
        let name = element
            .value()
            .attr("name")
            .or_else(|| element.value().attr("property"));
        if let (Some(name), Some(content)) = (name, element.value().attr("content")) {
            meta.insert(name.to_lowercase(), content.to_string());
        }
    }

    (scripts, meta)
}
