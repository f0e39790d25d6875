//! Rendered-tier acquisition.
//!
//! Tier-2 sits behind the [`SnapshotRenderer`] trait so the rendering
//! strategy is pluggable. The bundled [`HeavyFetchRenderer`] re-fetches the
//! page with the extended budget and the full browser header set. The
//! renderer is pooled: created lazily on first escalation, shared by all
//! concurrent requests, and torn down explicitly at shutdown.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::config::{MAX_REDIRECT_HOPS, TCP_CONNECT_TIMEOUT_SECS};
use crate::error_handling::AcquisitionError;
use crate::snapshot::PageSnapshot;

/// Produces a rendered-tier snapshot for one URL.
///
/// Each `render` call must be an isolated context: no state may leak
/// between URLs. Implementations are shared across tasks, so they take
/// `&self` and stay `Send + Sync`.
pub trait SnapshotRenderer: Send + Sync {
    /// Renders `url` into a snapshot, or fails the request.
    fn render<'a>(&'a self, url: &'a str)
        -> BoxFuture<'a, Result<PageSnapshot, AcquisitionError>>;

    /// Releases renderer resources. Called once, at shutdown.
    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Bundled tier-2 implementation: a heavier HTTP fetch.
///
/// Re-fetches with the rendered tier's extended timeout budget and the same
/// browser header set as tier-1. It holds its own client so its connection
/// pool outlives any single request.
pub struct HeavyFetchRenderer {
    client: reqwest::Client,
}

impl HeavyFetchRenderer {
    pub fn new(user_agent: &str) -> Result<Self, AcquisitionError> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECT_HOPS))
            .gzip(true)
            .build()?;
        Ok(HeavyFetchRenderer { client })
    }
}

impl SnapshotRenderer for HeavyFetchRenderer {
    fn render<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, Result<PageSnapshot, AcquisitionError>> {
        Box::pin(super::fetch_heavy(&self.client, url))
    }
}

type SharedRenderer = Arc<dyn SnapshotRenderer>;
type RendererFactory = Box<dyn Fn() -> Result<SharedRenderer, AcquisitionError> + Send + Sync>;

/// Lazily-initialized shared renderer.
///
/// The factory runs at most once, on the first escalated request; until
/// then no renderer resources exist. `shutdown` is a no-op if nothing was
/// ever escalated.
pub struct RendererPool {
    renderer: OnceCell<SharedRenderer>,
    factory: RendererFactory,
}

impl RendererPool {
    /// Pool over the bundled [`HeavyFetchRenderer`].
    pub fn new(user_agent: String) -> Self {
        RendererPool {
            renderer: OnceCell::new(),
            factory: Box::new(move || {
                log::info!("Initializing rendered-tier fetcher");
                Ok(Arc::new(HeavyFetchRenderer::new(&user_agent)?) as SharedRenderer)
            }),
        }
    }

    /// Pool over a custom renderer implementation.
    pub fn with_factory(factory: RendererFactory) -> Self {
        RendererPool {
            renderer: OnceCell::new(),
            factory,
        }
    }

    /// Returns the shared renderer, creating it on first use.
    pub async fn get(&self) -> Result<&SharedRenderer, AcquisitionError> {
        self.renderer
            .get_or_try_init(|| async { (self.factory)() })
            .await
    }

    /// True once the factory has run.
    pub fn is_initialized(&self) -> bool {
        self.renderer.initialized()
    }

    /// Tears down the renderer if it was ever created.
    pub async fn shutdown(&self) {
        if let Some(renderer) = self.renderer.get() {
            renderer.shutdown().await;
        }
    }
}
