//! # Taskboard Client Library
//!
//! Client core for the Taskboard task-management API: authentication,
//! credential persistence, a keyed resource cache, and typed project/task
//! operations. Front ends (the `taskboard` CLI, or any UI) sit on top of
//! `app::ClientContext`.
//!
//! ## Modules
//!
//! - `app`: Wiring of the components below
//! - `cache`: Keyed read cache with de-duplication and invalidation
//! - `config`: Configuration management
//! - `dashboard`: Project selection, task filters and mutations
//! - `error`: Client error type and server error mapping
//! - `http`: Authenticated HTTP gateway with 401 handling
//! - `resources`: Project and task endpoints, cache keys
//! - `session`: Signup, login, logout and the current user
//! - `token_store`: Credential persistence

pub mod app;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod http;
pub mod resources;
pub mod session;
pub mod token_store;

pub use app::ClientContext;
pub use error::{ClientError, ClientResult};
