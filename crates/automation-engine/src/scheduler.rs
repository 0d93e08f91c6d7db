//! Background poll loop that runs processing passes on an interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::engine::{ProcessSummary, WorkflowProcessor};

/// Runs [`WorkflowProcessor::process_due`] every `interval`.
pub struct Scheduler {
    processor: Arc<WorkflowProcessor>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(processor: Arc<WorkflowProcessor>, interval: Duration) -> Self {
        Self {
            processor,
            interval,
        }
    }

    /// Poll until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// A pass in flight finishes before the loop exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "Workflow scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Workflow scheduler stopped");
    }

    /// Run a single pass, logging instead of propagating failures.
    pub async fn tick(&self) -> Option<ProcessSummary> {
        match self.processor.process_due(Utc::now()).await {
            Ok(summary) => {
                if summary.processed > 0 {
                    tracing::info!(
                        processed = summary.processed,
                        completed = summary.completed,
                        waiting = summary.waiting,
                        failed = summary.failed,
                        "Scheduled pass complete"
                    );
                }
                Some(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "Scheduled pass failed");
                None
            }
        }
    }
}
