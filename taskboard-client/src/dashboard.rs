/// Presentation-facing facade over projects and tasks
///
/// The dashboard combines the resource cache, the project and task
/// resources, and the selection state of the task pane:
///
/// - The project list is one cache entry, `("projects")`
/// - The task list is only queried while a project is selected, under a
///   key derived from the full filter
/// - Every mutation invalidates the keys it affects, so subscribed lists
///   refetch without a manual refresh
///
/// # Selection rules
///
/// - Selecting a different project resets status, priority and search
/// - Deleting the selected project clears the selection
/// - Task mutations require the task's project to be the selected one
///
/// # Stale responses
///
/// The task pane only ever shows the entry for the current filter. A slow
/// response for a previous selection lands in that selection's own entry
/// and never reaches the current list.
///
/// # Example
///
/// ```no_run
/// use taskboard_client::app::ClientContext;
/// use taskboard_client::config::ClientConfig;
/// use taskboard_shared::models::TaskStatus;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ctx = ClientContext::new(ClientConfig::load()?)?;
/// let dashboard = ctx.dashboard();
///
/// let mut projects = dashboard.projects();
/// let first = projects.settled().await?.first().map(|p| p.id);
///
/// dashboard.select_project(first);
/// dashboard.set_status(Some(TaskStatus::Todo));
///
/// if let Some(mut tasks) = dashboard.tasks() {
///     println!("{} open tasks", tasks.settled().await?.len());
/// }
/// # Ok(())
/// # }
/// ```

use parking_lot::Mutex;
use std::sync::Arc;
use taskboard_shared::filter::TaskFilter;
use taskboard_shared::models::{
    CreateProject, CreateTask, Project, ProjectId, Task, TaskPriority, TaskStatus, UpdateProject,
    UpdateTask,
};

use crate::cache::{ResourceCache, Subscription};
use crate::error::{ClientError, ClientResult};
use crate::resources::{keys, ProjectApi, TaskApi};

/// Task pane state
#[derive(Default)]
struct Selection {
    /// `None` while no project is selected
    filter: Option<TaskFilter>,

    /// Subscription for `filter`; dropped with it
    tasks: Option<Subscription<Vec<Task>>>,
}

/// Projects, tasks and the task pane selection
pub struct Dashboard {
    cache: ResourceCache,
    projects: Arc<dyn ProjectApi>,
    tasks: Arc<dyn TaskApi>,
    selection: Mutex<Selection>,
}

impl Dashboard {
    pub fn new(cache: ResourceCache, projects: Arc<dyn ProjectApi>, tasks: Arc<dyn TaskApi>) -> Self {
        Self {
            cache,
            projects,
            tasks,
            selection: Mutex::new(Selection::default()),
        }
    }

    /// Subscribes to the project list
    pub fn projects(&self) -> Subscription<Vec<Project>> {
        let api = self.projects.clone();
        self.cache.read(keys::projects(), move || {
            let api = api.clone();
            async move { api.list().await }
        })
    }

    /// Currently selected project
    pub fn selected_project(&self) -> Option<ProjectId> {
        self.selection.lock().filter.as_ref().map(|f| f.project_id)
    }

    /// Current task filter (`None` when no project is selected)
    pub fn filter(&self) -> Option<TaskFilter> {
        self.selection.lock().filter.clone()
    }

    /// Subscription for the task pane (`None` when no project is selected)
    ///
    /// Re-subscribes if the cache dropped the entry, e.g. after a logout.
    pub fn tasks(&self) -> Option<Subscription<Vec<Task>>> {
        let mut selection = self.selection.lock();
        self.refresh_tasks(&mut selection);
        selection.tasks.clone()
    }

    /// Selects a project, or clears the selection with `None`
    ///
    /// Re-selecting the current project keeps its filters. Selecting a
    /// different one starts from an unfiltered list.
    pub fn select_project(&self, project_id: Option<ProjectId>) {
        let mut selection = self.selection.lock();

        let current = selection.filter.as_ref().map(|f| f.project_id);
        if current == project_id {
            return;
        }

        tracing::debug!(?current, selected = ?project_id, "Project selection changed");
        selection.filter = project_id.map(TaskFilter::for_project);
        self.refresh_tasks(&mut selection);
    }

    /// Sets the status filter; ignored when no project is selected
    pub fn set_status(&self, status: Option<TaskStatus>) {
        self.update_filter(|filter| filter.status = status);
    }

    /// Sets the priority filter; ignored when no project is selected
    pub fn set_priority(&self, priority: Option<TaskPriority>) {
        self.update_filter(|filter| filter.priority = priority);
    }

    /// Sets the search text; blank text clears it
    pub fn set_search(&self, search: &str) {
        self.update_filter(|filter| filter.set_search(search));
    }

    /// Creates a project
    pub async fn create_project(&self, input: CreateProject) -> ClientResult<Project> {
        self.cache
            .mutate(self.projects.create(&input), &[keys::projects()])
            .await
    }

    /// Updates a project
    pub async fn update_project(&self, id: ProjectId, input: UpdateProject) -> ClientResult<Project> {
        // Tasks carry project_name, so their lists are refreshed too
        self.cache
            .mutate(
                self.projects.update(id, &input),
                &[keys::projects(), keys::project_tasks(id)],
            )
            .await
    }

    /// Deletes a project
    ///
    /// If it was selected the selection is cleared before the project list
    /// refetches, so the task pane never queries the deleted project.
    pub async fn delete_project(&self, id: ProjectId) -> ClientResult<()> {
        let write = async {
            self.projects.delete(id).await?;

            let mut selection = self.selection.lock();
            if selection.filter.as_ref().map(|f| f.project_id) == Some(id) {
                tracing::debug!(project_id = id, "Deleted project was selected, clearing selection");
                selection.filter = None;
                self.refresh_tasks(&mut selection);
            }
            Ok::<(), ClientError>(())
        };

        self.cache.mutate(write, &[keys::projects()]).await?;
        self.cache.remove_matching(&[keys::project_tasks(id)]);
        Ok(())
    }

    /// Creates a task in the selected project
    pub async fn create_task(&self, input: CreateTask) -> ClientResult<Task> {
        self.require_selected(input.project_id)?;
        self.cache
            .mutate(self.tasks.create(&input), &[keys::project_tasks(input.project_id)])
            .await
    }

    /// Updates a task of the selected project
    pub async fn update_task(&self, task: &Task, input: UpdateTask) -> ClientResult<Task> {
        self.require_selected(task.project_id)?;
        self.cache
            .mutate(self.tasks.update(task.id, &input), &[keys::project_tasks(task.project_id)])
            .await
    }

    /// Deletes a task of the selected project
    pub async fn delete_task(&self, task: &Task) -> ClientResult<()> {
        self.require_selected(task.project_id)?;
        self.cache
            .mutate(self.tasks.delete(task.id), &[keys::project_tasks(task.project_id)])
            .await
    }

    /// Forces a refetch of the project list and the visible task list
    pub fn reload(&self) {
        let mut prefixes = vec![keys::projects()];
        if let Some(project_id) = self.selected_project() {
            prefixes.push(keys::project_tasks(project_id));
        }
        self.cache.invalidate(&prefixes);
    }

    fn require_selected(&self, project_id: ProjectId) -> ClientResult<()> {
        match self.selected_project() {
            None => Err(ClientError::NoProjectSelected),
            Some(selected) if selected != project_id => Err(ClientError::ProjectNotSelected(project_id)),
            Some(_) => Ok(()),
        }
    }

    fn update_filter(&self, change: impl FnOnce(&mut TaskFilter)) {
        let mut selection = self.selection.lock();
        let Some(filter) = selection.filter.as_mut() else {
            tracing::debug!("Filter change ignored, no project selected");
            return;
        };

        change(filter);
        self.refresh_tasks(&mut selection);
    }

    /// Points the task subscription at the current filter's key
    fn refresh_tasks(&self, selection: &mut Selection) {
        let Some(filter) = selection.filter.clone() else {
            selection.tasks = None;
            return;
        };

        let key = keys::tasks(&filter);
        if let Some(current) = &selection.tasks {
            if current.key() == &key && current.is_live() {
                return;
            }
        }

        let api = self.tasks.clone();
        selection.tasks = Some(self.cache.read(key, move || {
            let api = api.clone();
            let filter = filter.clone();
            async move { api.list(&filter).await }
        }));
    }
}
