/// Project resource
///
/// # Endpoints
///
/// ```text
/// GET    /projects/        → Project[]
/// POST   /projects/        {name, description?} → Project
/// PATCH  /projects/{id}/   {name?, description?} → Project
/// DELETE /projects/{id}/
/// ```

use async_trait::async_trait;
use taskboard_shared::models::{CreateProject, Project, ProjectId, UpdateProject};
use validator::Validate;

use crate::error::ClientResult;
use crate::http::HttpClient;

/// Read/write operations on projects
#[async_trait]
pub trait ProjectApi: Send + Sync {
    /// Every project of the current user
    async fn list(&self) -> ClientResult<Vec<Project>>;

    async fn create(&self, input: &CreateProject) -> ClientResult<Project>;

    async fn update(&self, id: ProjectId, input: &UpdateProject) -> ClientResult<Project>;

    /// Deletes a project and, server-side, all of its tasks
    async fn delete(&self, id: ProjectId) -> ClientResult<()>;
}

/// `ProjectApi` over HTTP
#[derive(Debug, Clone)]
pub struct ProjectsResource {
    http: HttpClient,
}

impl ProjectsResource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ProjectApi for ProjectsResource {
    async fn list(&self) -> ClientResult<Vec<Project>> {
        self.http.get("projects/", &[]).await
    }

    async fn create(&self, input: &CreateProject) -> ClientResult<Project> {
        input.validate()?;
        let project: Project = self.http.post("projects/", input).await?;
        tracing::info!(project_id = project.id, "Project created");
        Ok(project)
    }

    async fn update(&self, id: ProjectId, input: &UpdateProject) -> ClientResult<Project> {
        input.validate()?;
        self.http.patch(&format!("projects/{}/", id), input).await
    }

    async fn delete(&self, id: ProjectId) -> ClientResult<()> {
        self.http.delete(&format!("projects/{}/", id)).await?;
        tracing::info!(project_id = id, "Project deleted");
        Ok(())
    }
}
