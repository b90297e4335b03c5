/// Client context and wiring
///
/// `ClientContext` builds the object graph every front end needs and holds
/// it for the lifetime of the process:
///
/// ```text
/// ClientConfig
///   ├── FileTokenStore ──┐
///   ├── HttpClient <─────┘ ──┬── ProjectsResource ─┐
///   │                        └── TasksResource ────┼── Dashboard
///   ├── ResourceCache ───────────────────────────────┤
///   └── AuthSession (HttpClient + ResourceCache) ────┘
/// ```
///
/// # Example
///
/// ```no_run
/// use taskboard_client::{app::ClientContext, config::ClientConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let ctx = ClientContext::new(ClientConfig::load()?)?;
/// ctx.session().install_unauthorized_teardown(None);
///
/// if !ctx.session().is_authenticated() {
///     ctx.session().login("alice", "s3cret-pass").await?;
/// }
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use crate::cache::ResourceCache;
use crate::config::ClientConfig;
use crate::dashboard::Dashboard;
use crate::error::ClientResult;
use crate::http::{HealthStatus, HttpClient};
use crate::resources::{ProjectsResource, TasksResource};
use crate::session::AuthSession;
use crate::token_store::{FileTokenStore, TokenStore};

/// Shared client state
///
/// Cloned handles share the same token store, cache and selection.
#[derive(Clone)]
pub struct ClientContext {
    config: Arc<ClientConfig>,
    http: HttpClient,
    cache: ResourceCache,
    session: AuthSession,
    dashboard: Arc<Dashboard>,
}

impl ClientContext {
    /// Creates a context with the credential file from `config`
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let tokens = Arc::new(FileTokenStore::open(&config.storage.token_path));
        Self::with_token_store(config, tokens)
    }

    /// Creates a context over a caller-provided token store
    pub fn with_token_store(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> ClientResult<Self> {
        let http = HttpClient::with_timeout(&config.api.base_url, tokens, config.timeout())?;
        let cache = ResourceCache::new(config.cache_retention());
        let session = AuthSession::new(http.clone(), cache.clone());

        let dashboard = Dashboard::new(
            cache.clone(),
            Arc::new(ProjectsResource::new(http.clone())),
            Arc::new(TasksResource::new(http.clone())),
        );

        tracing::debug!(base_url = %http.base_url(), "Client context ready");

        Ok(Self {
            config: Arc::new(config),
            http,
            cache,
            session,
            dashboard: Arc::new(dashboard),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// Checks that the server is reachable
    pub async fn health(&self) -> ClientResult<HealthStatus> {
        self.http.health().await
    }
}
