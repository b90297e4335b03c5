/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - A mock API server per test
/// - A client context wired to it, logged in or not
/// - JSON builders for server resources

use serde_json::{json, Value};
use std::sync::Arc;
use taskboard_client::config::ClientConfig;
use taskboard_client::token_store::{Credential, MemoryTokenStore};
use taskboard_client::ClientContext;

/// Access token used by logged-in contexts
pub const TEST_TOKEN: &str = "test-access-token";

/// Test context containing all necessary resources
pub struct TestContext {
    pub server: mockito::ServerGuard,
    pub tokens: Arc<MemoryTokenStore>,
    pub client: ClientContext,
}

impl TestContext {
    /// Creates a context with no stored credential
    pub async fn new() -> Self {
        Self::with_tokens(MemoryTokenStore::new()).await
    }

    /// Creates a context holding `TEST_TOKEN`
    pub async fn logged_in() -> Self {
        Self::with_tokens(MemoryTokenStore::with_credential(Credential::new(TEST_TOKEN))).await
    }

    async fn with_tokens(tokens: MemoryTokenStore) -> Self {
        let server = mockito::Server::new_async().await;
        let tokens = Arc::new(tokens);
        let client =
            ClientContext::with_token_store(ClientConfig::for_base_url(server.url()), tokens.clone())
                .expect("Failed to build client context");

        Self {
            server,
            tokens,
            client,
        }
    }

    /// Expected `Authorization` header for `TEST_TOKEN`
    pub fn bearer() -> String {
        format!("Bearer {}", TEST_TOKEN)
    }
}

/// Project as the server returns it
pub fn project_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "owner": "alice",
        "name": name,
        "description": null,
        "created_at": "2025-01-01T00:00:00Z"
    })
}

/// Task as the server returns it
pub fn task_json(id: i64, project: i64, title: &str, status: &str) -> Value {
    json!({
        "id": id,
        "project": project,
        "project_name": "Website",
        "title": title,
        "description": "",
        "status": status,
        "priority": "medium",
        "due_date": null,
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z"
    })
}
