/// Integration tests for the client against a mock API server
///
/// These exercise the full stack: ClientContext → Dashboard/AuthSession →
/// ResourceCache → HttpClient → HTTP.

mod common;

use common::{project_json, task_json, TestContext};
use mockito::Matcher;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taskboard_client::config::ClientConfig;
use taskboard_client::session::SignupFlowError;
use taskboard_client::token_store::TokenStore;
use taskboard_client::{ClientContext, ClientError};
use taskboard_shared::models::{CreateTask, SignupRequest, TaskStatus, UpdateTask};

#[tokio::test]
async fn test_login_then_requests_carry_token() {
    let mut ctx = TestContext::new().await;

    let login = ctx
        .server
        .mock("POST", "/auth/login")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"access_token":"fresh-token","refresh_token":"r"}"#)
        .create_async()
        .await;
    let projects = ctx
        .server
        .mock("GET", "/projects/")
        .match_header("authorization", "Bearer fresh-token")
        .with_status(200)
        .with_body(json!([project_json(1, "Website")]).to_string())
        .create_async()
        .await;

    ctx.client.session().login("alice", "pw").await.unwrap();
    let list = ctx.client.dashboard().projects().settled().await.unwrap();

    assert_eq!(list.len(), 1);
    assert_eq!(list[0].name, "Website");
    login.assert_async().await;
    projects.assert_async().await;
}

#[tokio::test]
async fn test_task_mutation_refetches_visible_list() {
    let mut ctx = TestContext::logged_in().await;

    let list = ctx
        .server
        .mock("GET", "/tasks/")
        .match_query(Matcher::UrlEncoded("project".into(), "1".into()))
        .match_header("authorization", TestContext::bearer().as_str())
        .with_status(200)
        .with_body(json!([task_json(7, 1, "Write copy", "todo")]).to_string())
        .expect(2)
        .create_async()
        .await;
    let patch = ctx
        .server
        .mock("PATCH", "/tasks/7/")
        .match_body(Matcher::Json(json!({"status": "done"})))
        .with_status(200)
        .with_body(task_json(7, 1, "Write copy", "done").to_string())
        .create_async()
        .await;

    let dashboard = ctx.client.dashboard();
    dashboard.select_project(Some(1));
    let mut tasks = dashboard.tasks().unwrap();
    let before = tasks.settled().await.unwrap();
    assert_eq!(before[0].project_id, 1);

    let updated = dashboard
        .update_task(&before[0], UpdateTask::status(TaskStatus::Done))
        .await
        .unwrap();
    assert!(updated.status.is_done());

    // The invalidation already started the refetch
    assert!(tasks.snapshot().is_loading());
    tasks.settled().await.unwrap();

    patch.assert_async().await;
    list.assert_async().await;
}

#[tokio::test]
async fn test_filters_reach_the_server() {
    let mut ctx = TestContext::logged_in().await;

    let filtered = ctx
        .server
        .mock("GET", "/tasks/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("project".into(), "3".into()),
            Matcher::UrlEncoded("status".into(), "doing".into()),
            Matcher::UrlEncoded("search".into(), "launch".into()),
        ]))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let _unfiltered = ctx
        .server
        .mock("GET", "/tasks/")
        .match_query(Matcher::Exact("project=3".into()))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let dashboard = ctx.client.dashboard();
    dashboard.select_project(Some(3));
    dashboard.set_status(Some(TaskStatus::Doing));
    dashboard.set_search("  launch ");

    let mut tasks = dashboard.tasks().unwrap();
    assert!(tasks.settled().await.unwrap().is_empty());
    filtered.assert_async().await;
}

#[tokio::test]
async fn test_create_task_in_selected_project() {
    let mut ctx = TestContext::logged_in().await;

    let create = ctx
        .server
        .mock("POST", "/tasks/")
        .match_body(Matcher::PartialJson(json!({"project": 1, "title": "Ship it"})))
        .with_status(201)
        .with_body(task_json(9, 1, "Ship it", "todo").to_string())
        .create_async()
        .await;

    let dashboard = ctx.client.dashboard();
    let err = dashboard
        .create_task(CreateTask::new(1, "Ship it"))
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::NoProjectSelected);

    dashboard.select_project(Some(1));
    let task = dashboard.create_task(CreateTask::new(1, "Ship it")).await.unwrap();

    assert_eq!(task.id, 9);
    create.assert_async().await;
}

#[tokio::test]
async fn test_deleting_selected_project() {
    let mut ctx = TestContext::logged_in().await;

    let _projects = ctx
        .server
        .mock("GET", "/projects/")
        .with_status(200)
        .with_body(json!([project_json(1, "Website")]).to_string())
        .expect_at_least(2)
        .create_async()
        .await;
    let _tasks = ctx
        .server
        .mock("GET", "/tasks/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let delete = ctx
        .server
        .mock("DELETE", "/projects/1/")
        .with_status(204)
        .create_async()
        .await;

    let dashboard = ctx.client.dashboard();
    let mut projects = dashboard.projects();
    projects.settled().await.unwrap();

    dashboard.select_project(Some(1));
    dashboard.tasks().unwrap().settled().await.unwrap();

    dashboard.delete_project(1).await.unwrap();

    assert_eq!(dashboard.selected_project(), None);
    assert!(dashboard.tasks().is_none());
    assert!(projects.snapshot().is_loading());
    projects.settled().await.unwrap();
    delete.assert_async().await;
}

#[tokio::test]
async fn test_expired_session_logs_out_once() {
    let mut ctx = TestContext::logged_in().await;

    let _rejected = ctx
        .server
        .mock("GET", Matcher::Any)
        .with_status(401)
        .with_body(r#"{"detail":"Given token not valid for any token type"}"#)
        .expect(3)
        .create_async()
        .await;

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    ctx.client
        .session()
        .install_unauthorized_teardown(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

    let dashboard = ctx.client.dashboard();
    let mut projects = dashboard.projects();
    let mut me = ctx.client.session().me();
    dashboard.select_project(Some(1));
    let mut tasks = dashboard.tasks().unwrap();

    let (a, b, c) = tokio::join!(projects.settled(), me.settled(), tasks.settled());

    for result in [a.map(|_| ()), b.map(|_| ()), c.map(|_| ())] {
        assert_eq!(result, Err(ClientError::AuthorizationExpired));
    }

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(ctx.tokens.get().is_none());
    assert!(!ctx.client.session().is_authenticated());
    assert_eq!(ctx.client.http().unauthorized_incidents(), 1);
}

#[tokio::test]
async fn test_signup_then_failed_login() {
    let mut ctx = TestContext::new().await;

    let _signup = ctx
        .server
        .mock("POST", "/auth/signup")
        .with_status(201)
        .with_body(r#"{"id":1,"username":"alice","email":""}"#)
        .create_async()
        .await;
    let _login = ctx
        .server
        .mock("POST", "/auth/login")
        .with_status(401)
        .with_body(r#"{"detail":"No active account found with the given credentials"}"#)
        .create_async()
        .await;

    let err = ctx
        .client
        .session()
        .signup_and_login(SignupRequest::new("alice", Some("  "), "s3cret-pass"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SignupFlowError::Login(ClientError::Auth(
            "No active account found with the given credentials".to_string()
        ))
    );
    assert!(!ctx.client.session().is_authenticated());
}

#[tokio::test]
async fn test_credential_survives_restart() {
    let mut server = mockito::Server::new_async().await;
    let _login = server
        .mock("POST", "/auth/login")
        .with_status(200)
        .with_body(r#"{"access_token":"persisted","refresh_token":"r"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = ClientConfig::for_base_url(server.url());
    config.storage.token_path = dir.path().join("credentials.json");

    let first = ClientContext::new(config.clone()).unwrap();
    first.session().login("alice", "pw").await.unwrap();
    drop(first);

    let second = ClientContext::new(config.clone()).unwrap();
    assert!(second.session().is_authenticated());

    second.session().logout();
    let third = ClientContext::new(config).unwrap();
    assert!(!third.session().is_authenticated());
}

#[tokio::test]
async fn test_health_is_public() {
    let mut ctx = TestContext::new().await;

    let health = ctx
        .server
        .mock("GET", "/health/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"status":"ok"}"#)
        .create_async()
        .await;

    assert!(ctx.client.health().await.unwrap().is_ok());
    health.assert_async().await;
}
