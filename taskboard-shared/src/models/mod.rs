/// Wire models for the task-management REST API
///
/// This module contains the resource types the server returns (users,
/// projects, tasks) and the payloads the client sends to create or update
/// them.
///
/// # Models
///
/// - `User`: The authenticated account
/// - `Project`: A named container of tasks, owned by a user
/// - `Task`: A unit of work inside exactly one project

pub mod project;
pub mod task;
pub mod user;

use thiserror::Error;

// Re-export commonly used types
pub use project::{CreateProject, Project, ProjectId, UpdateProject};
pub use task::{CreateTask, Task, TaskId, TaskPriority, TaskStatus, UpdateTask};
pub use user::{LoginRequest, SignupRequest, TokenResponse, User};

/// Error parsing an enum from user input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind}: '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
