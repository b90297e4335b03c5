//! # Taskboard Shared Library
//!
//! This crate contains the wire types shared by every Taskboard consumer:
//! the resource models returned by the REST API, the payloads sent to it,
//! and the task list filter descriptor.
//!
//! ## Module Organization
//!
//! - `models`: Users, projects, tasks and their request payloads
//! - `filter`: Task list filter and query-string derivation

pub mod filter;
pub mod models;

/// Current version of the Taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
