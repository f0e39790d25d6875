//! Per-request orchestration.
//!
//! The pipeline is thin sequencing over the collaborators: acquire a
//! snapshot (escalating tiers if the policy says so), run detection and
//! firmographic inference concurrently over the immutable snapshot,
//! normalize, and assemble the report. All policy lives in the
//! collaborators; nothing here retries, and an acquisition failure at any
//! tier aborts the request with no partial result.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tldextract::TldExtractor;

use crate::config::Config;
use crate::error_handling::{
    update_fetch_error_stats, AcquisitionError, ErrorStats, ErrorType,
};
use crate::escalation::{needs_render, EscalationReason};
use crate::fetch::{fetch_light, RendererPool};
use crate::fingerprint::{match_snapshot, resolve_implications, FingerprintStore};
use crate::firmographic::{self, Firmographics};
use crate::snapshot::FetchTier;
use crate::taxonomy::{normalize, NormalizedResult};

/// Final per-URL output of the profiler.
#[derive(Debug, Serialize)]
pub struct ProfileReport {
    /// URL as submitted.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status of the final response.
    pub status: u16,
    /// Acquisition tier the classified snapshot came from.
    pub tier: FetchTier,
    /// Why the request escalated, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationReason>,
    /// Normalized technology classification.
    pub technologies: NormalizedResult,
    /// Best-effort company signals.
    pub firmographics: Firmographics,
    /// Wall-clock time spent on this request.
    pub elapsed_ms: u64,
    /// When profiling started.
    pub profiled_at: DateTime<Utc>,
}

/// Shared profiling engine.
///
/// Holds the immutable fingerprint store and the shared clients behind
/// `Arc`, so one `Profiler` serves any number of concurrent `profile`
/// calls. Per-request state is owned by each call.
pub struct Profiler {
    store: Arc<FingerprintStore>,
    client: Arc<reqwest::Client>,
    extractor: Arc<TldExtractor>,
    renderer_pool: RendererPool,
    error_stats: Arc<ErrorStats>,
    render_enabled: bool,
}

impl Profiler {
    /// Builds a profiler over a loaded store and the run configuration.
    pub fn new(store: Arc<FingerprintStore>, config: &Config) -> Result<Self> {
        let client = crate::initialization::init_client(&config.user_agent)
            .context("Failed to build the HTTP client")?;
        Ok(Profiler {
            store,
            client,
            extractor: crate::initialization::init_extractor(),
            renderer_pool: RendererPool::new(config.user_agent.clone()),
            error_stats: Arc::new(ErrorStats::new()),
            render_enabled: !config.no_render,
        })
    }

    /// Replaces the rendered-tier pool, e.g. with a custom renderer.
    pub fn with_renderer_pool(mut self, pool: RendererPool) -> Self {
        self.renderer_pool = pool;
        self
    }

    /// Incident counters accumulated across this profiler's requests.
    pub fn error_stats(&self) -> &Arc<ErrorStats> {
        &self.error_stats
    }

    /// Profiles one URL end to end.
    pub async fn profile(&self, url: &str) -> Result<ProfileReport, AcquisitionError> {
        let started = Instant::now();
        let profiled_at = Utc::now();

        let mut snapshot = match fetch_light(&self.client, url).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record_acquisition_error(&e);
                return Err(e);
            }
        };

        let escalation = if self.render_enabled {
            needs_render(&snapshot)
        } else {
            None
        };

        if let Some(reason) = escalation {
            log::info!("Escalating {} to rendered tier ({:?})", url, reason);
            snapshot = match self.render(url).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    self.error_stats.increment(ErrorType::RenderError);
                    return Err(e);
                }
            };
        }

        // Detection and firmographic inference only read the snapshot, so
        // they run concurrently
        let (technologies, firmographics) = tokio::join!(
            self.detect(&snapshot),
            self.infer_firmographics(&snapshot),
        );

        Ok(ProfileReport {
            url: url.to_string(),
            final_url: snapshot.final_url,
            status: snapshot.status,
            tier: snapshot.tier,
            escalation,
            technologies,
            firmographics,
            elapsed_ms: started.elapsed().as_millis() as u64,
            profiled_at,
        })
    }

    /// Explicit teardown of the rendered-tier resources.
    pub async fn shutdown(&self) {
        self.renderer_pool.shutdown().await;
    }

    async fn render(&self, url: &str) -> Result<crate::snapshot::PageSnapshot, AcquisitionError> {
        let renderer = self.renderer_pool.get().await?;
        renderer.render(url).await
    }

    async fn detect(&self, snapshot: &crate::snapshot::PageSnapshot) -> NormalizedResult {
        let mut detections = match_snapshot(snapshot, &self.store);
        resolve_implications(&mut detections, &self.store);
        normalize(&detections)
    }

    async fn infer_firmographics(
        &self,
        snapshot: &crate::snapshot::PageSnapshot,
    ) -> Firmographics {
        let firmographics =
            firmographic::infer(&self.extractor, &snapshot.final_url, &snapshot.html);
        if firmographics.is_empty() {
            log::debug!("No firmographic signals for {}", snapshot.final_url);
        }
        firmographics
    }

    fn record_acquisition_error(&self, error: &AcquisitionError) {
        match error {
            AcquisitionError::HttpError(e) => update_fetch_error_stats(&self.error_stats, e),
            AcquisitionError::Timeout { .. } => {
                self.error_stats.increment(ErrorType::FetchTimeoutError)
            }
            AcquisitionError::InvalidUrl(_) => {
                self.error_stats.increment(ErrorType::FetchOtherError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::SnapshotRenderer;
    use crate::snapshot::PageSnapshot;
    use futures::future::BoxFuture;
    use httptest::matchers::request::method_path;
    use httptest::{responders::status_code, Expectation, Server};

    const PAYLOAD: &str = r#"{
        "categories": {
            "1": {"name": "CMS", "priority": 1},
            "22": {"name": "Web Servers", "priority": 8}
        },
        "technologies": {
            "WordPress": {"cats": [1], "meta": {"generator": "^WordPress"}, "implies": "PHP"},
            "PHP": {"cats": [22], "headers": {"x-powered-by": "php"}},
            "Nginx": {"cats": [22], "headers": {"server": "nginx"}}
        }
    }"#;

    fn store() -> Arc<FingerprintStore> {
        Arc::new(FingerprintStore::load(PAYLOAD.as_bytes()).unwrap())
    }

    fn config() -> Config {
        Config::default()
    }

    fn substantial_body(extra: &str) -> String {
        let filler: String = "lorem ipsum dolor sit amet ".repeat(20);
        format!(
            r#"<html><head><meta name="generator" content="WordPress 6.4"></head><body>{}<p>{}</p></body></html>"#,
            extra, filler
        )
    }

    /// A plain page profiles at the light tier with implied techs included.
    #[tokio::test]
    async fn test_profile_light_tier() {
        let server = Server::run();
        server.expect(
            Expectation::matching(method_path("GET", "/")).respond_with(
                status_code(200)
                    .insert_header("Server", "nginx/1.25")
                    .body(substantial_body("")),
            ),
        );

        let profiler = Profiler::new(store(), &config()).unwrap();
        let report = profiler.profile(&server.url_str("/")).await.unwrap();

        assert_eq!(report.status, 200);
        assert_eq!(report.tier, FetchTier::Light);
        assert!(report.escalation.is_none());

        // Direct: Nginx (header), WordPress (meta); implied: PHP. PHP routes
        // through the canonical override table, not the store's category.
        let cms = report.technologies.bucket("cms").unwrap();
        assert_eq!(cms.technologies, vec!["WordPress"]);
        let servers = report.technologies.bucket("web_servers").unwrap();
        assert_eq!(servers.technologies, vec!["Nginx"]);
        let langs = report.technologies.bucket("programming_languages").unwrap();
        assert_eq!(langs.technologies, vec!["PHP"]);
        assert_eq!(report.technologies.raw_count, 3);
    }

    struct FixedRenderer {
        html: String,
    }

    impl SnapshotRenderer for FixedRenderer {
        fn render<'a>(
            &'a self,
            url: &'a str,
        ) -> BoxFuture<'a, Result<PageSnapshot, AcquisitionError>> {
            let mut snapshot = PageSnapshot::empty(url, FetchTier::Rendered);
            snapshot.status = 200;
            snapshot.html = self.html.clone();
            snapshot
                .meta
                .insert("generator".to_string(), "WordPress 6.4".to_string());
            Box::pin(async move { Ok(snapshot) })
        }
    }

    /// An empty SPA shell escalates and the rendered snapshot is classified.
    #[tokio::test]
    async fn test_profile_escalates_spa_shell() {
        let server = Server::run();
        server.expect(
            Expectation::matching(method_path("GET", "/")).respond_with(
                status_code(200).body(r#"<html><body><div id="root"></div></body></html>"#),
            ),
        );

        let pool = RendererPool::with_factory(Box::new(|| {
            Ok(Arc::new(FixedRenderer {
                html: "<html><body>rendered</body></html>".to_string(),
            }) as Arc<dyn SnapshotRenderer>)
        }));
        let profiler = Profiler::new(store(), &config())
            .unwrap()
            .with_renderer_pool(pool);

        let report = profiler.profile(&server.url_str("/")).await.unwrap();
        assert_eq!(report.tier, FetchTier::Rendered);
        assert_eq!(report.escalation, Some(EscalationReason::EmptyMountPoint));
        let cms = report.technologies.bucket("cms").unwrap();
        assert_eq!(cms.technologies, vec!["WordPress"]);
    }

    /// `no_render` pins the pipeline to the light tier.
    #[tokio::test]
    async fn test_no_render_skips_escalation() {
        let server = Server::run();
        server.expect(
            Expectation::matching(method_path("GET", "/")).respond_with(
                status_code(200).body(r#"<html><body><div id="root"></div></body></html>"#),
            ),
        );

        let mut cfg = config();
        cfg.no_render = true;
        let profiler = Profiler::new(store(), &cfg).unwrap();

        let report = profiler.profile(&server.url_str("/")).await.unwrap();
        assert_eq!(report.tier, FetchTier::Light);
        assert!(report.escalation.is_none());
        assert!(!profiler.renderer_pool.is_initialized());
    }

    /// Acquisition failure aborts with no partial result and is counted.
    #[tokio::test]
    async fn test_invalid_url_aborts() {
        let profiler = Profiler::new(store(), &config()).unwrap();
        let result = profiler.profile("not a url").await;
        assert!(matches!(result, Err(AcquisitionError::InvalidUrl(_))));
        assert_eq!(
            profiler.error_stats().get_count(ErrorType::FetchOtherError),
            1
        );
    }
}
