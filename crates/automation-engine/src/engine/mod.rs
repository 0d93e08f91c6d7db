//! Workflow execution engine.
//!
//! This module contains the core logic for running automations:
//! - Step parsing and validation
//! - Wait step delays
//! - Condition evaluation for branch steps
//! - The processor that walks enrollments through their steps

pub mod delay;
pub mod evaluator;
pub mod processor;
pub mod steps;

pub use delay::DelayUnit;
pub use evaluator::ConditionEvaluator;
pub use processor::{
    EnrollmentError, EnrollmentOutcome, EnrollmentReport, ProcessSummary, ProcessorConfig,
    WorkflowProcessor,
};
pub use steps::{ConditionOperator, StepAction};
