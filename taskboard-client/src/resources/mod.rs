/// Typed operations over the REST resources
///
/// Each resource is described by a trait so the cache-facing layers can run
/// against the HTTP implementation in production and against in-memory
/// fakes in tests.
///
/// # Resources
///
/// - `ProjectApi` / `ProjectsResource`: `/projects/`
/// - `TaskApi` / `TasksResource`: `/tasks/`
///
/// # Cache keys
///
/// The `keys` module is the single place cache keys are built, so every
/// reader and every mutation agree on their shape.

pub mod projects;
pub mod tasks;

// Re-export main types
pub use projects::{ProjectApi, ProjectsResource};
pub use tasks::{TaskApi, TasksResource};

/// Cache key derivation
///
/// ```text
/// ("me")
/// ("projects")
/// ("tasks", project_id, status | null, priority | null, search | null)
/// ```
pub mod keys {
    use crate::cache::QueryKey;
    use taskboard_shared::filter::TaskFilter;
    use taskboard_shared::models::ProjectId;

    /// Current user
    pub fn me() -> QueryKey {
        QueryKey::new("me")
    }

    /// Project list
    pub fn projects() -> QueryKey {
        QueryKey::new("projects")
    }

    /// Every task list
    pub fn all_tasks() -> QueryKey {
        QueryKey::new("tasks")
    }

    /// Every task list of one project, whatever the other filters
    pub fn project_tasks(project_id: ProjectId) -> QueryKey {
        all_tasks().with(project_id)
    }

    /// Task list for one filter combination
    ///
    /// Every filter component occupies a fixed position, absent ones as
    /// `null`, so differently shaped filters can never collide.
    pub fn tasks(filter: &TaskFilter) -> QueryKey {
        project_tasks(filter.project_id)
            .with(filter.status.map(|s| s.as_str()))
            .with(filter.priority.map(|p| p.as_str()))
            .with(filter.search())
    }

}
