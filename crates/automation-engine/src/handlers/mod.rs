//! HTTP handlers for the automation engine API.
//!
//! This module contains all route handlers organized by domain.

pub mod database;
pub mod enrollments;
pub mod health;
pub mod process;
pub mod triggers;
pub mod workflows;

pub use health::{api_health, health_check};
pub use process::process_workflows;
