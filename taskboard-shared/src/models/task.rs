/// Task model and request payloads
///
/// A task belongs to exactly one project. The server reports the owning
/// project id in the `project` field; on the Rust side it is exposed as
/// `project_id`.
///
/// # Workflow
///
/// ```text
/// todo → doing → done
/// ```
///
/// Any status can be set directly through an update; the server does not
/// enforce the order above, it only restricts values to the three states.
///
/// # Wire format
///
/// ```json
/// {
///   "id": 7,
///   "project": 3,
///   "project_name": "Website",
///   "title": "Write copy",
///   "description": null,
///   "status": "doing",
///   "priority": "high",
///   "due_date": "2025-03-01",
///   "created_at": "2025-02-01T10:00:00Z",
///   "updated_at": "2025-02-02T09:30:00Z"
/// }
/// ```
///
/// # Example
///
/// ```
/// use taskboard_shared::models::task::{CreateTask, TaskPriority};
/// use validator::Validate;
///
/// let input = CreateTask::new(3, "Write copy").with_priority(TaskPriority::High);
/// assert!(input.validate().is_ok());
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::project::ProjectId;
use super::ParseEnumError;

/// Server-assigned task identifier
pub type TaskId = i64;

/// Task workflow status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Not started
    #[default]
    Todo,

    /// In progress
    Doing,

    /// Finished
    Done,
}

impl TaskStatus {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
        }
    }

    /// Checks if the task is finished
    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "doing" => Ok(TaskStatus::Doing),
            "done" => Ok(TaskStatus::Done),
            other => Err(ParseEnumError::new("status", other)),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(ParseEnumError::new("priority", other)),
        }
    }
}

/// Task as returned by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: TaskId,

    /// Owning project
    #[serde(rename = "project")]
    pub project_id: ProjectId,

    /// Owning project's name (read-only, reported by the server)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Short title
    pub title: String,

    /// Optional longer description
    #[serde(default)]
    pub description: Option<String>,

    /// Workflow status
    #[serde(default)]
    pub status: TaskStatus,

    /// Priority
    #[serde(default)]
    pub priority: TaskPriority,

    /// Optional due date (calendar day, no time)
    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    /// When the task was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the task was last updated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Checks if the task is past its due date on `today`
    ///
    /// Finished tasks are never overdue.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.due_date {
            Some(due) => !self.status.is_done() && due < today,
            None => false,
        }
    }
}

/// Input for creating a task
///
/// Status and priority fall back to the server defaults (`todo`, `medium`)
/// when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateTask {
    /// Owning project
    #[serde(rename = "project")]
    pub project_id: ProjectId,

    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl CreateTask {
    /// Creates a minimal task input with server defaults for everything else
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            description: None,
            status: None,
            priority: None,
            due_date: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Input for a partial task update
///
/// All fields are optional. Only non-None fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct UpdateTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters."))]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl UpdateTask {
    /// Update that only changes the status
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Checks if the update would change nothing
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_as_str() {
        assert_eq!(TaskStatus::Todo.as_str(), "todo");
        assert_eq!(TaskStatus::Doing.as_str(), "doing");
        assert_eq!(TaskStatus::Done.as_str(), "done");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("DOING".parse::<TaskStatus>().unwrap(), TaskStatus::Doing);
        assert_eq!(" done ".parse::<TaskStatus>().unwrap(), TaskStatus::Done);

        let err = "blocked".parse::<TaskStatus>().unwrap_err();
        assert!(err.to_string().contains("blocked"));
    }

    #[test]
    fn test_priority_from_str() {
        for priority in [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High] {
            assert_eq!(priority.as_str().parse::<TaskPriority>().unwrap(), priority);
        }
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_defaults_match_server() {
        assert_eq!(TaskStatus::default(), TaskStatus::Todo);
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
    }

    #[test]
    fn test_task_deserializes_project_field() {
        let task: Task = serde_json::from_value(json!({
            "id": 7,
            "project": 3,
            "project_name": "Website",
            "title": "Write copy",
            "description": null,
            "status": "doing",
            "priority": "high",
            "due_date": "2025-03-01",
            "created_at": "2025-02-01T10:00:00Z",
            "updated_at": "2025-02-02T09:30:00Z"
        }))
        .unwrap();

        assert_eq!(task.project_id, 3);
        assert_eq!(task.status, TaskStatus::Doing);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[test]
    fn test_create_task_omits_unset_fields() {
        let body = serde_json::to_value(CreateTask::new(3, "Write copy")).unwrap();
        assert_eq!(body, json!({ "project": 3, "title": "Write copy" }));
    }

    #[test]
    fn test_create_task_title_validation() {
        assert!(CreateTask::new(1, "").validate().is_err());
        assert!(CreateTask::new(1, "x".repeat(201)).validate().is_err());
        assert!(CreateTask::new(1, "x".repeat(200)).validate().is_ok());
    }

    #[test]
    fn test_update_task_status_only() {
        let update = UpdateTask::status(TaskStatus::Done);
        assert!(!update.is_empty());
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "status": "done" }));
        assert!(UpdateTask::default().is_empty());
    }

    #[test]
    fn test_is_overdue() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let mut task: Task = serde_json::from_value(json!({
            "id": 1, "project": 1, "title": "t", "due_date": "2025-03-01"
        }))
        .unwrap();

        assert!(task.is_overdue(today));

        task.status = TaskStatus::Done;
        assert!(!task.is_overdue(today));

        task.due_date = None;
        task.status = TaskStatus::Todo;
        assert!(!task.is_overdue(today));
    }
}
