/// Authentication session
///
/// `AuthSession` owns login, signup, logout and the current-user read. It
/// holds no login state of its own: "am I authenticated" is always answered
/// by the token store.
///
/// # Flows
///
/// ```text
/// signup ──> (User)            no session yet
/// login  ──> TokenStore.set    session established
/// logout ──> TokenStore.clear  local, no network
/// 401    ──> HttpClient ──> teardown handler ──> TokenStore.clear + cache.clear
/// ```
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use taskboard_client::cache::ResourceCache;
/// use taskboard_client::http::HttpClient;
/// use taskboard_client::session::AuthSession;
/// use taskboard_client::token_store::MemoryTokenStore;
/// use taskboard_shared::models::SignupRequest;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tokens = Arc::new(MemoryTokenStore::new());
/// let http = HttpClient::new("http://localhost:8000/api", tokens)?;
/// let session = AuthSession::new(http, ResourceCache::new(Duration::from_secs(300)));
/// session.install_unauthorized_teardown(None);
///
/// session.signup_and_login(SignupRequest::new("alice", None, "s3cret-pass")).await?;
/// let me = session.get_me().await?;
/// println!("Hello, {}", me.username);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use taskboard_shared::models::{LoginRequest, SignupRequest, TokenResponse, User};
use thiserror::Error;

use crate::cache::{ResourceCache, Subscription};
use crate::error::{ClientError, ClientResult, ValidationErrors};
use crate::http::HttpClient;
use crate::resources::keys;
use crate::token_store::{Credential, TokenStore};

/// Message shown when login fails without a server-provided reason
pub const DEFAULT_LOGIN_ERROR: &str = "Login failed. Please check your credentials.";

/// Hook notified after a forced logout
pub type LogoutHook = Arc<dyn Fn() + Send + Sync>;

/// Failure of the signup-then-login flow
///
/// The two steps fail independently; a login failure after a successful
/// signup is never reported as a signup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignupFlowError {
    /// Account was not created
    #[error("{0}")]
    Signup(ClientError),

    /// Account was created but logging in failed
    #[error("Account created, but login failed: {0}")]
    Login(ClientError),
}

impl SignupFlowError {
    pub fn user_message(&self) -> String {
        match self {
            SignupFlowError::Signup(err) => err.user_message(),
            SignupFlowError::Login(err) => {
                format!("Account created, but login failed: {}", err.user_message())
            }
        }
    }
}

/// Login/logout and current user
#[derive(Clone)]
pub struct AuthSession {
    http: HttpClient,
    tokens: Arc<dyn TokenStore>,
    cache: ResourceCache,
}

impl AuthSession {
    /// Creates a session over the client's token store
    pub fn new(http: HttpClient, cache: ResourceCache) -> Self {
        let tokens = http.token_store().clone();
        Self { http, tokens, cache }
    }

    /// Registers the default reaction to a rejected credential
    ///
    /// Clears the token store and the cache, then calls `hook` so the
    /// presentation layer can return to the login screen. Replaces any
    /// previously registered handler.
    pub fn install_unauthorized_teardown(&self, hook: Option<LogoutHook>) {
        let tokens = self.tokens.clone();
        // Weak: the cache holds fetchers that hold the HTTP client
        let cache = self.cache.downgrade();

        self.http.set_unauthorized_handler(move || {
            tracing::warn!("Session expired, logging out");
            if let Err(e) = tokens.clear() {
                tracing::error!(error = %e, "Failed to clear credential after 401");
            }
            // Pending reads settle with the 401 their own request got
            if let Some(cache) = cache.upgrade() {
                cache.expire_all(ClientError::AuthorizationExpired);
            }
            if let Some(hook) = &hook {
                hook();
            }
        });
    }

    /// Creates an account
    ///
    /// Does not log in. Any 4xx rejection is returned as a validation
    /// error, field-level when the server gave field detail.
    pub async fn signup(&self, request: SignupRequest) -> ClientResult<User> {
        let result = self.http.post_public::<_, User>("auth/signup", &request).await;

        match result {
            Ok(user) => {
                tracing::info!(username = %user.username, "Account created");
                Ok(user)
            }
            Err(ClientError::Server { status, message }) if (400..500).contains(&status) => {
                Err(ClientError::Validation(ValidationErrors::message(message)))
            }
            Err(err) => Err(err),
        }
    }

    /// Logs in and stores the returned credential
    ///
    /// This is the only way a session is established. Data cached for a
    /// previous user is dropped.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<()> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let tokens: TokenResponse = self
            .http
            .post_public("auth/login", &request)
            .await
            .map_err(into_auth_error)?;

        let mut credential = Credential::new(tokens.access_token);
        credential.refresh_token = tokens.refresh_token;
        self.tokens.set(credential)?;
        self.cache.clear();

        tracing::info!(username, "Logged in");
        Ok(())
    }

    /// Signs up, then logs in as two separately reported steps
    pub async fn signup_and_login(&self, request: SignupRequest) -> Result<User, SignupFlowError> {
        let username = request.username.clone();
        let password = request.password.clone();

        let user = self.signup(request).await.map_err(SignupFlowError::Signup)?;
        self.login(&username, &password)
            .await
            .map_err(SignupFlowError::Login)?;

        Ok(user)
    }

    /// Ends the session locally
    ///
    /// The credential is gone from memory even if removing it from durable
    /// storage fails; that failure is only logged.
    pub fn logout(&self) {
        if let Err(e) = self.tokens.clear() {
            tracing::error!(error = %e, "Failed to remove stored credential");
        }
        self.cache.clear();
        tracing::info!("Logged out");
    }

    /// Checks if a credential is stored
    pub fn is_authenticated(&self) -> bool {
        self.tokens.get().is_some()
    }

    /// Subscribes to the current user
    pub fn me(&self) -> Subscription<User> {
        let http = self.http.clone();
        self.cache.read(keys::me(), move || {
            let http = http.clone();
            async move { http.get::<User>("users/me", &[]).await }
        })
    }

    /// Fetches (or returns the cached) current user
    pub async fn get_me(&self) -> ClientResult<User> {
        let mut subscription = self.me();
        let user = subscription.settled().await?;
        Ok(User::clone(&user))
    }
}

/// Maps a rejected login to `Auth`, keeping network and 5xx errors as is
fn into_auth_error(err: ClientError) -> ClientError {
    match err {
        ClientError::Server { status, message } if (400..500).contains(&status) => {
            ClientError::Auth(message)
        }
        ClientError::Validation(errors) => match errors.detail() {
            Some(detail) if !errors.has_fields() => ClientError::Auth(detail.to_string()),
            _ => ClientError::Auth(DEFAULT_LOGIN_ERROR.to_string()),
        },
        ClientError::Decode(_) => ClientError::Auth(DEFAULT_LOGIN_ERROR.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::MemoryTokenStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn session(server: &mockito::ServerGuard, tokens: Arc<MemoryTokenStore>) -> AuthSession {
        let http = HttpClient::new(&server.url(), tokens).unwrap();
        AuthSession::new(http, ResourceCache::new(Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_login_stores_credential() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/login")
            .match_body(mockito::Matcher::Json(json!({"username": "alice", "password": "pw"})))
            .with_status(200)
            .with_body(r#"{"access_token":"tok","refresh_token":"ref"}"#)
            .create_async()
            .await;

        let tokens = Arc::new(MemoryTokenStore::new());
        let session = session(&server, tokens.clone());
        assert!(!session.is_authenticated());

        session.login("alice", "pw").await.unwrap();

        assert!(session.is_authenticated());
        assert_eq!(tokens.get().unwrap().access_token, "tok");
        assert_eq!(tokens.get().unwrap().refresh_token.as_deref(), Some("ref"));
    }

    #[tokio::test]
    async fn test_login_rejected_uses_detail() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"detail":"No active account found with the given credentials"}"#)
            .create_async()
            .await;

        let session = session(&server, Arc::new(MemoryTokenStore::new()));
        let err = session.login("alice", "wrong").await.unwrap_err();

        assert_eq!(
            err,
            ClientError::Auth("No active account found with the given credentials".to_string())
        );
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_rejected_without_detail_uses_default() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/login")
            .with_status(400)
            .with_body(r#"{"password":["This field may not be blank."]}"#)
            .create_async()
            .await;

        let session = session(&server, Arc::new(MemoryTokenStore::new()));
        let err = session.login("alice", "").await.unwrap_err();

        assert_eq!(err.user_message(), DEFAULT_LOGIN_ERROR);
    }

    #[tokio::test]
    async fn test_signup_field_errors() {
        let mut server = mockito::Server::new_async().await;
        let _signup = server
            .mock("POST", "/auth/signup")
            .with_status(400)
            .with_body(
                json!({
                    "username": ["A user with that username already exists."],
                    "email": ["A user with that email already exists."]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let login = server
            .mock("POST", "/auth/login")
            .expect(0)
            .create_async()
            .await;

        let session = session(&server, Arc::new(MemoryTokenStore::new()));
        let err = session
            .signup_and_login(SignupRequest::new("testuser", None, "password123"))
            .await
            .unwrap_err();

        let message = err.user_message();
        assert!(matches!(err, SignupFlowError::Signup(ClientError::Validation(_))));
        assert!(message.contains("username"));
        assert!(message.contains("A user with that username already exists."));
        assert!(message.contains("email"));
        assert!(message.contains("A user with that email already exists."));
        assert!(!session.is_authenticated());
        login.assert_async().await;
    }

    #[tokio::test]
    async fn test_signup_detail_error_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/signup")
            .with_status(400)
            .with_body(r#"{"detail":"Invalid password format."}"#)
            .create_async()
            .await;

        let session = session(&server, Arc::new(MemoryTokenStore::new()));
        let err = session
            .signup(SignupRequest::new("testuser", None, "weak"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Invalid password format.");
    }

    #[tokio::test]
    async fn test_signup_does_not_establish_session() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/signup")
            .with_status(201)
            .with_body(r#"{"id":1,"username":"alice","email":""}"#)
            .create_async()
            .await;

        let session = session(&server, Arc::new(MemoryTokenStore::new()));
        let user = session
            .signup(SignupRequest::new("alice", None, "pw"))
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_failure_after_signup_is_attributed_to_login() {
        let mut server = mockito::Server::new_async().await;
        let _signup = server
            .mock("POST", "/auth/signup")
            .with_status(201)
            .with_body(r#"{"id":1,"username":"alice","email":null}"#)
            .create_async()
            .await;
        let _login = server
            .mock("POST", "/auth/login")
            .with_status(500)
            .create_async()
            .await;

        let session = session(&server, Arc::new(MemoryTokenStore::new()));
        let err = session
            .signup_and_login(SignupRequest::new("alice", None, "pw"))
            .await
            .unwrap_err();

        assert!(matches!(err, SignupFlowError::Login(ClientError::Server { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_logout_is_local_and_idempotent() {
        let server = mockito::Server::new_async().await;
        let tokens = Arc::new(MemoryTokenStore::with_credential(Credential::new("tok")));
        let session = session(&server, tokens);

        assert!(session.is_authenticated());
        assert_eq!(session.is_authenticated(), session.is_authenticated());

        session.logout();
        assert!(!session.is_authenticated());
        session.logout();
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_get_me_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/me")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"id":1,"username":"alice","email":"a@example.com"}"#)
            .expect(1)
            .create_async()
            .await;

        let tokens = Arc::new(MemoryTokenStore::with_credential(Credential::new("tok")));
        let session = session(&server, tokens);

        let _held = session.me();
        let first = session.get_me().await.unwrap();
        let second = session.get_me().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.email(), Some("a@example.com"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_expired_session_tears_down_once() {
        let mut server = mockito::Server::new_async().await;
        let _me = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let tokens = Arc::new(MemoryTokenStore::with_credential(Credential::new("expired")));
        let session = session(&server, tokens.clone());
        let logouts = Arc::new(AtomicUsize::new(0));
        let counter = logouts.clone();
        session.install_unauthorized_teardown(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        let http = session.http.clone();
        let (a, b, c) = tokio::join!(
            http.get::<serde_json::Value>("users/me", &[]),
            http.get::<serde_json::Value>("projects/", &[]),
            http.get::<serde_json::Value>("tasks/", &[]),
        );

        assert!(a.is_err() && b.is_err() && c.is_err());
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
        assert!(!session.is_authenticated());
        assert!(tokens.get().is_none());
    }

    #[tokio::test]
    async fn test_get_me_reports_expired_session() {
        let mut server = mockito::Server::new_async().await;
        let _me = server
            .mock("GET", "/users/me")
            .with_status(401)
            .with_body(r#"{"detail":"Given token not valid for any token type"}"#)
            .create_async()
            .await;

        let tokens = Arc::new(MemoryTokenStore::with_credential(Credential::new("expired")));
        let session = session(&server, tokens.clone());
        session.install_unauthorized_teardown(None);

        let err = session.get_me().await.unwrap_err();

        assert_eq!(err, ClientError::AuthorizationExpired);
        assert!(!session.is_authenticated());
        assert!(session.cache.is_empty());
    }
}
