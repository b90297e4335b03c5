/// User model and authentication payloads
///
/// The user is never pushed by the server; clients fetch it on demand from
/// `GET /users/me` with a valid credential.
///
/// # Example
///
/// ```
/// use taskboard_shared::models::user::SignupRequest;
///
/// let request = SignupRequest::new("alice", None, "s3cret-pass");
/// let body = serde_json::to_value(&request).unwrap();
/// assert!(body.get("email").is_none());
/// ```

use serde::{Deserialize, Serialize};

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: i64,

    /// Login name
    pub username: String,

    /// Email address (may be empty, signup does not require it)
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    /// Email if one is set and non-empty
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.is_empty())
    }
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body of `POST /auth/signup`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,

    /// Omitted from the body when absent or empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub password: String,
}

impl SignupRequest {
    /// Creates a signup request, treating an empty email as absent
    pub fn new(username: impl Into<String>, email: Option<&str>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.filter(|e| !e.trim().is_empty()).map(str::to_string),
            password: password.into(),
        }
    }
}

/// Successful login response
///
/// Only `access_token` is required; the server may include extra fields
/// which are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for authenticated requests
    #[serde(alias = "access")]
    pub access_token: String,

    /// Optional refresh token
    #[serde(default, alias = "refresh")]
    pub refresh_token: Option<String>,
}
