//! Database models for the automation engine.
//!
//! This module contains SQLx-compatible model definitions
//! for the workflow, contact and delivery tables.

pub mod contact;
pub mod email;
pub mod enrollment;
pub mod execution;
pub mod workflow;

pub use contact::*;
pub use email::*;
pub use enrollment::*;
pub use execution::*;
pub use workflow::*;
