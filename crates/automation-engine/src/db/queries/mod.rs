//! Database queries for the automation engine.
//!
//! This module contains database query functions organized by table.

pub mod contact;
pub mod email;
pub mod enrollment;
pub mod execution;
pub mod workflow;
