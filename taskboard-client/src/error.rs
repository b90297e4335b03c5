/// Error handling for the client core
///
/// This module provides the unified error type returned by every
/// operation in the client. Each variant corresponds to one class of
/// failure the presentation layer needs to tell apart:
///
/// - `Network`: no response was received (connection refused, timeout)
/// - `Validation`: the server (or local input validation) rejected fields
/// - `Auth`: login or signup was rejected
/// - `AuthorizationExpired`: an authenticated request got a 401 mid-session
/// - `Server`: any other error response
///
/// Nothing in the client retries automatically. `is_retryable` only tells
/// the presentation layer whether offering a retry button makes sense.
///
/// # Example
///
/// ```
/// use taskboard_client::error::{ClientError, ValidationErrors};
/// use serde_json::json;
///
/// let body = json!({ "username": ["A user with that username already exists."] });
/// let err = ClientError::Validation(ValidationErrors::from_body(&body).unwrap());
/// assert_eq!(
///     err.user_message(),
///     "username: A user with that username already exists."
/// );
/// ```

use serde_json::Value as JsonValue;
use std::fmt;
use taskboard_shared::models::ProjectId;
use thiserror::Error;

/// Client result type alias
pub type ClientResult<T> = Result<T, ClientError>;

/// Unified client error type
///
/// Errors are cheap to clone so a single failed read can be handed to every
/// subscriber of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// No response received
    #[error("Network error: {0}")]
    Network(String),

    /// Field-level or top-level validation failure
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Login or signup rejected
    #[error("{0}")]
    Auth(String),

    /// Credential rejected by the server during a session
    #[error("Authorization expired")]
    AuthorizationExpired,

    /// Error response without field detail
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response received but the body could not be decoded
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Task operation attempted with no project selected
    #[error("No project selected")]
    NoProjectSelected,

    /// Task operation attempted on a project other than the selected one
    #[error("Project {0} is not the selected project")]
    ProjectNotSelected(ProjectId),

    /// Credential could not be persisted or removed
    #[error("Credential storage error: {0}")]
    Storage(String),

    /// The cache entry was dropped before its read completed
    #[error("Request cancelled")]
    Cancelled,
}

impl ClientError {
    /// Builds an error from a non-success response
    ///
    /// `status` must not be a success code. A 401 is NOT mapped here; the
    /// HTTP layer decides whether it is an expired session or a plain
    /// rejection.
    pub fn from_response(status: u16, reason: &str, body: &str) -> Self {
        let json = serde_json::from_str::<JsonValue>(body).ok();

        if (400..500).contains(&status) {
            if let Some(errors) = json.as_ref().and_then(ValidationErrors::from_body) {
                if errors.has_fields() || status == 400 {
                    return ClientError::Validation(errors);
                }
                if let Some(detail) = errors.detail() {
                    return ClientError::Server {
                        status,
                        message: detail.to_string(),
                    };
                }
            }
        }

        let message = json
            .as_ref()
            .and_then(detail_of)
            .unwrap_or_else(|| reason.to_string());

        ClientError::Server { status, message }
    }

    /// Checks if the user can reasonably retry the same action
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Message the presentation layer shows inline
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Network(_) => "Could not reach the server. Please try again.".to_string(),
            ClientError::Validation(errors) => errors.to_string(),
            ClientError::Auth(msg) => msg.clone(),
            ClientError::AuthorizationExpired => {
                "Your session has expired. Please log in again.".to_string()
            }
            ClientError::Server { status, message } if *status >= 500 => {
                tracing::debug!(status, %message, "server error hidden from user");
                "Something went wrong on the server. Please try again.".to_string()
            }
            ClientError::Server { message, .. } => message.clone(),
            ClientError::Decode(_) => "The server sent an unexpected response.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(err: validator::ValidationErrors) -> Self {
        ClientError::Validation(ValidationErrors::from(err))
    }
}

/// Messages attached to a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field name as sent by the server
    pub field: String,

    /// One or more human-readable messages
    pub messages: Vec<String>,
}

/// Structured validation failure
///
/// Keeps every field/message pair so the presentation layer can show
/// per-field detail, plus an optional top-level message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    detail: Option<String>,
    fields: Vec<FieldError>,
}

impl ValidationErrors {
    /// Validation failure carrying a single top-level message
    pub fn message(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            fields: Vec::new(),
        }
    }

    /// Adds messages for a field
    pub fn with_field(mut self, field: impl Into<String>, messages: Vec<String>) -> Self {
        self.fields.push(FieldError {
            field: field.into(),
            messages,
        });
        self
    }

    /// Parses an error body
    ///
    /// Accepts `{"detail": "..."}`, DRF-style `{"field": ["msg", ...]}`
    /// maps, and `non_field_errors`, which is treated as a top-level
    /// message. Returns `None` if the body is not an object or carries no
    /// messages at all.
    pub fn from_body(body: &JsonValue) -> Option<Self> {
        let object = body.as_object()?;
        let mut errors = ValidationErrors::default();

        for (field, value) in object {
            match field.as_str() {
                "detail" | "message" => {
                    if errors.detail.is_none() {
                        errors.detail = value.as_str().map(str::to_string);
                    }
                }
                "non_field_errors" => {
                    let messages = messages_of(value);
                    if !messages.is_empty() {
                        errors.detail = Some(messages.join(", "));
                    }
                }
                _ => {
                    let messages = messages_of(value);
                    if !messages.is_empty() {
                        errors.fields.push(FieldError {
                            field: field.clone(),
                            messages,
                        });
                    }
                }
            }
        }

        if errors.detail.is_none() && errors.fields.is_empty() {
            None
        } else {
            Some(errors)
        }
    }

    /// Top-level message, if any
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Per-field messages in server order
    pub fn fields(&self) -> &[FieldError] {
        &self.fields
    }

    /// Messages for one field
    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|f| f.field == name)
            .map(|f| f.messages.as_slice())
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    /// Field errors render as `field: m1, m2; other: m3`. With no field
    /// errors the top-level message renders verbatim.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(self.fields.len() + 1);

        if let Some(detail) = &self.detail {
            parts.push(detail.clone());
        }
        for field in &self.fields {
            parts.push(format!("{}: {}", field.field, field.messages.join(", ")));
        }

        if parts.is_empty() {
            write!(f, "Request validation failed")
        } else {
            write!(f, "{}", parts.join("; "))
        }
    }
}

impl From<validator::ValidationErrors> for ValidationErrors {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = err
            .field_errors()
            .into_iter()
            .map(|(field, errors)| FieldError {
                field: field.to_string(),
                messages: errors
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => e.code.to_string(),
                    })
                    .collect(),
            })
            .collect();

        // field_errors() is a HashMap
        fields.sort_by(|a, b| a.field.cmp(&b.field));

        Self {
            detail: None,
            fields,
        }
    }
}

/// Extracts message strings from a string or an array of strings
fn messages_of(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::String(s) => vec![s.clone()],
        JsonValue::Array(items) => items
            .iter()
            .map(|item| match item {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        JsonValue::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

/// Extracts `detail` from an error body
fn detail_of(body: &JsonValue) -> Option<String> {
    body.get("detail")
        .or_else(|| body.get("message"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}
