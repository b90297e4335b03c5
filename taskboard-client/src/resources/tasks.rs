/// Task resource
///
/// # Endpoints
///
/// ```text
/// GET    /tasks/?project=&status=&priority=&search=  → Task[]
/// POST   /tasks/       {project, title, description?, status?, priority?, due_date?} → Task
/// PATCH  /tasks/{id}/  {...} → Task
/// DELETE /tasks/{id}/
/// ```
///
/// Listing always takes a `TaskFilter`, so there is no way to ask for tasks
/// without naming their project.

use async_trait::async_trait;
use taskboard_shared::filter::TaskFilter;
use taskboard_shared::models::{CreateTask, Task, TaskId, UpdateTask};
use validator::Validate;

use crate::error::ClientResult;
use crate::http::HttpClient;

/// Read/write operations on tasks
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Tasks of one project matching the filter
    async fn list(&self, filter: &TaskFilter) -> ClientResult<Vec<Task>>;

    async fn create(&self, input: &CreateTask) -> ClientResult<Task>;

    async fn update(&self, id: TaskId, input: &UpdateTask) -> ClientResult<Task>;

    async fn delete(&self, id: TaskId) -> ClientResult<()>;
}

/// `TaskApi` over HTTP
#[derive(Debug, Clone)]
pub struct TasksResource {
    http: HttpClient,
}

impl TasksResource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TaskApi for TasksResource {
    async fn list(&self, filter: &TaskFilter) -> ClientResult<Vec<Task>> {
        self.http.get("tasks/", &filter.query_pairs()).await
    }

    async fn create(&self, input: &CreateTask) -> ClientResult<Task> {
        input.validate()?;
        let task: Task = self.http.post("tasks/", input).await?;
        tracing::info!(task_id = task.id, project_id = task.project_id, "Task created");
        Ok(task)
    }

    async fn update(&self, id: TaskId, input: &UpdateTask) -> ClientResult<Task> {
        input.validate()?;
        self.http.patch(&format!("tasks/{}/", id), input).await
    }

    async fn delete(&self, id: TaskId) -> ClientResult<()> {
        self.http.delete(&format!("tasks/{}/", id)).await?;
        tracing::info!(task_id = id, "Task deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::{Credential, MemoryTokenStore};
    use mockito::Matcher;
    use std::sync::Arc;
    use taskboard_shared::models::{TaskPriority, TaskStatus};

    fn resource(server: &mockito::ServerGuard) -> TasksResource {
        let tokens = Arc::new(MemoryTokenStore::with_credential(Credential::new("abc")));
        TasksResource::new(HttpClient::new(&server.url(), tokens).unwrap())
    }

    #[tokio::test]
    async fn test_list_sends_filter_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tasks/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("project".into(), "2".into()),
                Matcher::UrlEncoded("status".into(), "doing".into()),
                Matcher::UrlEncoded("priority".into(), "high".into()),
                Matcher::UrlEncoded("search".into(), "copy".into()),
            ]))
            .with_status(200)
            .with_body(r#"[{"id":1,"project":2,"title":"Write copy","status":"doing","priority":"high"}]"#)
            .create_async()
            .await;

        let filter = TaskFilter::for_project(2)
            .with_status(Some(TaskStatus::Doing))
            .with_priority(Some(TaskPriority::High))
            .with_search("copy");
        let tasks = resource(&server).list(&filter).await.unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].project_id, 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_project_only() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tasks/")
            .match_query(Matcher::Exact("project=2".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        resource(&server).list(&TaskFilter::for_project(2)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_uses_project_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tasks/")
            .match_body(Matcher::Json(serde_json::json!({
                "project": 2,
                "title": "Write copy",
                "priority": "high"
            })))
            .with_status(201)
            .with_body(r#"{"id":5,"project":2,"title":"Write copy","status":"todo","priority":"high"}"#)
            .create_async()
            .await;

        let input = CreateTask::new(2, "Write copy").with_priority(TaskPriority::High);
        let task = resource(&server).create(&input).await.unwrap();

        assert_eq!(task.id, 5);
        assert_eq!(task.status, TaskStatus::Todo);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/tasks/5/")
            .match_body(Matcher::Json(serde_json::json!({"status": "done"})))
            .with_status(200)
            .with_body(r#"{"id":5,"project":2,"title":"Write copy","status":"done","priority":"high"}"#)
            .create_async()
            .await;

        let task = resource(&server)
            .update(5, &UpdateTask::status(TaskStatus::Done))
            .await
            .unwrap();

        assert!(task.status.is_done());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_uses_detail_route() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/tasks/5/")
            .match_header("authorization", "Bearer abc")
            .with_status(204)
            .create_async()
            .await;

        resource(&server).delete(5).await.unwrap();
        mock.assert_async().await;
    }
}
