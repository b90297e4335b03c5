/// Outbound HTTP gateway
///
/// Every request the client makes goes through `HttpClient`. It:
///
/// - Attaches the stored credential as a bearer token
/// - Maps non-success responses to `ClientError`
/// - Detects authorization failure (401) and notifies a single registered
///   handler, once per incident
///
/// # Unauthorized handling
///
/// ```text
/// request A ─┐                     ┌─> 401 ─┐
/// request B ─┼─ sent in epoch N ───┼─> 401 ─┼─> handler fires once, epoch N+1
/// request C ─┘                     └─> 401 ─┘
/// ```
///
/// Each request remembers the epoch it was sent in. The first 401 for an
/// epoch advances it and fires the handler; any further 401 from the same
/// epoch only returns `AuthorizationExpired` to its caller. The client
/// never clears the token store itself; that is the handler's job.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskboard_client::http::HttpClient;
/// use taskboard_client::token_store::MemoryTokenStore;
/// use taskboard_shared::models::Project;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new("http://localhost:8000/api", Arc::new(MemoryTokenStore::new()))?;
/// client.set_unauthorized_handler(|| eprintln!("session expired"));
///
/// let projects: Vec<Project> = client.get("projects/", &[]).await?;
/// # Ok(())
/// # }
/// ```

use parking_lot::RwLock;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};
use crate::token_store::TokenStore;

/// Callback invoked when the server rejects the credential
pub type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

/// Whether a request carries the credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Credential attached; 401 is an expired session
    Authenticated,

    /// No credential (login, signup); 401 is a plain rejection
    Public,
}

/// Response of `GET /health/`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// HTTP client shared by every resource
///
/// Cheap to clone; clones share the connection pool, the handler slot and
/// the epoch counter.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenStore>,
    on_unauthorized: RwLock<Option<UnauthorizedHandler>>,
    epoch: AtomicU64,
}

impl HttpClient {
    /// Creates a client with a 30 second request timeout
    pub fn new(base_url: &str, tokens: Arc<dyn TokenStore>) -> ClientResult<Self> {
        Self::with_timeout(base_url, tokens, Duration::from_secs(30))
    }

    /// Creates a client with a custom request timeout
    pub fn with_timeout(
        base_url: &str,
        tokens: Arc<dyn TokenStore>,
        timeout: Duration,
    ) -> ClientResult<Self> {
        // Url::join drops the last path segment unless it ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ClientError::Network(format!("invalid base URL '{}': {}", base_url, e)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taskboard-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                tokens,
                on_unauthorized: RwLock::new(None),
                epoch: AtomicU64::new(0),
            }),
        })
    }

    /// API root all paths are resolved against
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Token store the client reads credentials from
    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.tokens
    }

    /// Registers the unauthorized handler, replacing any previous one
    pub fn set_unauthorized_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.inner.on_unauthorized.write() = Some(Arc::new(handler));
    }

    /// Removes the unauthorized handler
    pub fn clear_unauthorized_handler(&self) {
        *self.inner.on_unauthorized.write() = None;
    }

    /// Number of unauthorized incidents reported so far
    pub fn unauthorized_incidents(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    /// Authenticated GET returning JSON
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let response = self
            .execute(Method::GET, path, query, None, Access::Authenticated)
            .await?;
        decode(response).await
    }

    /// Authenticated POST with a JSON body
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let body = to_json(body)?;
        let response = self
            .execute(Method::POST, path, &[], Some(body), Access::Authenticated)
            .await?;
        decode(response).await
    }

    /// Authenticated PATCH with a JSON body
    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let body = to_json(body)?;
        let response = self
            .execute(Method::PATCH, path, &[], Some(body), Access::Authenticated)
            .await?;
        decode(response).await
    }

    /// Authenticated DELETE; the response body is ignored
    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.execute(Method::DELETE, path, &[], None, Access::Authenticated)
            .await?;
        Ok(())
    }

    /// Unauthenticated POST (login, signup)
    ///
    /// No credential is sent and a 401 is returned as an ordinary error
    /// response without involving the unauthorized handler.
    pub async fn post_public<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let body = to_json(body)?;
        let response = self
            .execute(Method::POST, path, &[], Some(body), Access::Public)
            .await?;
        decode(response).await
    }

    /// Probes `GET /health/`
    pub async fn health(&self) -> ClientResult<HealthStatus> {
        let response = self
            .execute(Method::GET, "health/", &[], None, Access::Public)
            .await?;
        decode(response).await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
        access: Access,
    ) -> ClientResult<reqwest::Response> {
        let url = self.endpoint(path)?;
        let epoch = self.inner.epoch.load(Ordering::SeqCst);

        let mut request = self.inner.http.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if access == Access::Authenticated {
            if let Some(credential) = self.inner.tokens.get() {
                request = request.header(AUTHORIZATION, credential.bearer());
            }
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::debug!(%method, path, error = %e, "request failed without response");
            ClientError::Network(e.to_string())
        })?;

        let status = response.status();
        tracing::debug!(%method, path, status = status.as_u16(), "response received");

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED && access == Access::Authenticated {
            self.report_unauthorized(epoch);
            return Err(ClientError::AuthorizationExpired);
        }

        let reason = status.canonical_reason().unwrap_or("Error").to_string();
        let text = response.text().await.unwrap_or_default();
        Err(ClientError::from_response(status.as_u16(), &reason, &text))
    }

    /// Fires the handler if this is the first 401 of `epoch`
    fn report_unauthorized(&self, epoch: u64) {
        let first = self
            .inner
            .epoch
            .compare_exchange(epoch, epoch + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();

        if !first {
            tracing::debug!(epoch, "401 coalesced into an already reported incident");
            return;
        }

        tracing::warn!(epoch, "Server rejected credential, notifying session");

        // Clone out of the lock: the handler may re-register itself
        let handler = self.inner.on_unauthorized.read().clone();
        match handler {
            Some(handler) => handler(),
            None => tracing::debug!("No unauthorized handler registered"),
        }
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Network(format!("invalid path '{}': {}", path, e)))
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("epoch", &self.inner.epoch.load(Ordering::SeqCst))
            .finish()
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> ClientResult<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| ClientError::Decode(format!("failed to encode body: {}", e)))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
    let bytes = response.bytes().await.map_err(|e| ClientError::Network(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}
