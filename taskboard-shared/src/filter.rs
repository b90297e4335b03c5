/// Task list filter descriptor
///
/// A `TaskFilter` is the client-side selection that parameterizes
/// `GET /tasks/`. It holds no data of its own; it is pure input to the
/// query string and to cache key derivation.
///
/// Unset and cleared components are the same thing: `None`. A search
/// string that is empty after trimming is stored as `None` too, so a text
/// box that was typed into and then emptied produces the same query as one
/// that was never touched.
///
/// # Example
///
/// ```
/// use taskboard_shared::filter::TaskFilter;
/// use taskboard_shared::models::TaskStatus;
///
/// let filter = TaskFilter::for_project(3)
///     .with_status(Some(TaskStatus::Todo))
///     .with_search("  copy ");
///
/// assert_eq!(
///     filter.query_pairs(),
///     vec![
///         ("project", "3".to_string()),
///         ("status", "todo".to_string()),
///         ("search", "copy".to_string()),
///     ]
/// );
/// ```

use serde::{Deserialize, Serialize};

use crate::models::{ProjectId, TaskPriority, TaskStatus};

/// Filter for the task list of one project
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Selected project (always required)
    pub project_id: ProjectId,

    /// Status filter
    pub status: Option<TaskStatus>,

    /// Priority filter
    pub priority: Option<TaskPriority>,

    /// Free-text search over title and description
    search: Option<String>,
}

impl TaskFilter {
    /// Filter that matches every task in a project
    pub fn for_project(project_id: ProjectId) -> Self {
        Self {
            project_id,
            status: None,
            priority: None,
            search: None,
        }
    }

    pub fn with_status(mut self, status: Option<TaskStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Option<TaskPriority>) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_search(mut self, search: impl AsRef<str>) -> Self {
        self.set_search(search);
        self
    }

    /// Sets the search text, normalizing blank input to `None`
    pub fn set_search(&mut self, search: impl AsRef<str>) {
        let trimmed = search.as_ref().trim();
        self.search = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Normalized search text
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Checks if any filter beyond the project is active
    pub fn is_narrowed(&self) -> bool {
        self.status.is_some() || self.priority.is_some() || self.search.is_some()
    }

    /// Query parameters for `GET /tasks/`
    ///
    /// Always starts with `project`; absent components are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("project", self.project_id.to_string())];

        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.as_str().to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }

        pairs
    }
}
