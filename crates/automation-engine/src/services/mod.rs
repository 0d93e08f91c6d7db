//! Service layer for enrollment management and reporting.
//!
//! Services encapsulate business rules and coordinate between handlers
//! and the workflow store.

pub mod enrollment;
pub mod stats;

pub use enrollment::{EnrollmentHistory, EnrollmentService, TriggerEvent, TriggerOutcome};
pub use stats::{StatsService, WorkflowStats};
