//! Workflow processor: advances due enrollments through their steps.
//!
//! One pass loads a batch of due enrollments and walks each one forward
//! until it waits, completes, fails or hits the per-run step cap. Every step
//! visit first looks up the execution already recorded for
//! (enrollment, step), so re-running a pass after a crash or overlap never
//! repeats a settled side effect.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::{AppConfig, DeliveryConfig};
use crate::db::models::{
    Contact, EmailSendStatus, Enrollment, EnrollmentStatus, ExecutionStatus, NewEmailSend,
    NewStepExecution, Workflow, WorkflowStep,
};
use crate::delivery::{EmailMessage, EmailSender, WebhookDispatcher, WebhookRequest};
use crate::error::{AppError, AppResult};
use crate::result_ext::ResultExt;
use crate::sanitize::{sanitize_headers, sanitize_sensitive_data};
use crate::store::WorkflowStore;
use crate::template::{TemplateContext, TemplateRenderer};

use super::delay::resume_at;
use super::evaluator::ConditionEvaluator;
use super::steps::{
    is_http_url, ConditionConfig, SendEmailConfig, StepAction, TagConfig, WaitConfig, WebhookConfig,
};

/// Tunables for a processing pass.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub batch_size: i64,
    pub max_steps_per_run: usize,
    /// Sender address when neither the step nor the site sets one.
    pub default_from: String,
}

impl ProcessorConfig {
    pub fn new(app: &AppConfig, delivery: &DeliveryConfig) -> Self {
        Self {
            batch_size: app.batch_size,
            max_steps_per_run: app.max_steps_per_run.max(1),
            default_from: delivery.default_from.clone(),
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::new(&AppConfig::default(), &DeliveryConfig::default())
    }
}

/// An enrollment that failed during a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentError {
    pub enrollment_id: Uuid,
    pub error: String,
}

/// Totals for one processing pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessSummary {
    /// Enrollments picked up.
    pub processed: usize,
    /// Steps actually run (replayed executions are not counted).
    pub steps_executed: usize,
    /// Enrollments that reached the end of their workflow.
    pub completed: usize,
    /// Enrollments parked on a wait step.
    pub waiting: usize,
    /// Enrollments marked failed.
    pub failed: usize,
    /// Step executions recorded as skipped.
    pub skipped: usize,
    pub errors: Vec<EnrollmentError>,
}

impl ProcessSummary {
    fn record(&mut self, enrollment_id: Uuid, report: EnrollmentReport) {
        self.steps_executed += report.steps_executed;
        self.skipped += report.skipped;

        match report.outcome {
            EnrollmentOutcome::Completed => self.completed += 1,
            EnrollmentOutcome::Waiting { .. } => self.waiting += 1,
            EnrollmentOutcome::Failed { error } => {
                self.failed += 1;
                self.errors.push(EnrollmentError { enrollment_id, error });
            }
            EnrollmentOutcome::Continued | EnrollmentOutcome::Untouched => {}
        }
    }
}

/// Where an enrollment ended up after a visit.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentOutcome {
    Completed,
    Waiting { until: DateTime<Utc> },
    Failed { error: String },
    /// Step cap reached; the next pass picks it up again.
    Continued,
    /// Workflow not active; nothing was changed.
    Untouched,
}

/// Result of processing one enrollment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentReport {
    pub outcome: EnrollmentOutcome,
    pub steps_executed: usize,
    pub skipped: usize,
}

impl EnrollmentReport {
    fn new(outcome: EnrollmentOutcome) -> Self {
        Self {
            outcome,
            steps_executed: 0,
            skipped: 0,
        }
    }
}

/// What to do after visiting a step.
enum Visit {
    Advance {
        target: Option<Uuid>,
        executed: bool,
        skipped: bool,
    },
    Park(DateTime<Utc>),
    Fail(String),
}

/// Outcome of running a step's action.
struct StepRun {
    status: ExecutionStatus,
    result: Value,
    target: Option<Uuid>,
    scheduled_for: Option<DateTime<Utc>>,
}

impl StepRun {
    fn completed(result: Value) -> Self {
        Self {
            status: ExecutionStatus::Completed,
            result,
            target: None,
            scheduled_for: None,
        }
    }
}

/// Per-enrollment state carried across step visits.
struct Walk<'a> {
    enrollment: &'a Enrollment,
    workflow: &'a Workflow,
    steps: &'a [WorkflowStep],
    contact: Contact,
    now: DateTime<Utc>,
    /// Steps visited in this run; a second visit means the branches loop.
    visited: HashSet<Uuid>,
}

impl Walk<'_> {
    fn position(&self, step_id: Uuid) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    fn context(&self) -> TemplateContext {
        let mut ctx = TemplateContext::new();
        ctx.insert("contact".to_string(), self.contact.to_template_value());
        ctx.insert(
            "workflow".to_string(),
            json!({ "id": self.workflow.id, "name": self.workflow.name }),
        );
        ctx.insert("site_id".to_string(), json!(self.enrollment.site_id));
        ctx.insert(
            "enrollment".to_string(),
            json!({ "id": self.enrollment.id, "enrolled_at": self.enrollment.enrolled_at }),
        );
        ctx
    }
}

/// Runs workflow steps against the store and delivery backends.
pub struct WorkflowProcessor {
    store: Arc<dyn WorkflowStore>,
    email: Arc<dyn EmailSender>,
    webhooks: Arc<dyn WebhookDispatcher>,
    renderer: TemplateRenderer,
    evaluator: ConditionEvaluator,
    config: ProcessorConfig,
}

impl WorkflowProcessor {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        email: Arc<dyn EmailSender>,
        webhooks: Arc<dyn WebhookDispatcher>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            email,
            webhooks,
            renderer: TemplateRenderer::new(),
            evaluator: ConditionEvaluator::new(),
            config,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Run one pass over the enrollments due at `now`.
    ///
    /// Only loading the batch can fail the pass; errors inside an
    /// enrollment are collected into the summary.
    pub async fn process_due(&self, now: DateTime<Utc>) -> AppResult<ProcessSummary> {
        let due = self
            .store
            .due_enrollments(now, self.config.batch_size)
            .await
            .log("loading due enrollments")?;

        let mut summary = ProcessSummary::default();

        for enrollment in due {
            summary.processed += 1;

            match self.process_enrollment(&enrollment, now).await {
                Ok(report) => summary.record(enrollment.id, report),
                Err(e) => {
                    tracing::error!(
                        enrollment_id = %enrollment.id,
                        workflow_id = %enrollment.workflow_id,
                        error = %e,
                        "Enrollment processing aborted"
                    );
                    summary.errors.push(EnrollmentError {
                        enrollment_id: enrollment.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            steps_executed = summary.steps_executed,
            completed = summary.completed,
            waiting = summary.waiting,
            failed = summary.failed,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "Workflow pass finished"
        );

        Ok(summary)
    }

    /// Advance a single enrollment as far as it can go at `now`.
    ///
    /// Step failures mark the enrollment failed and are reported in the
    /// outcome. An `Err` means bookkeeping itself failed; the enrollment is
    /// left as-is and retried on the next pass.
    pub async fn process_enrollment(
        &self,
        enrollment: &Enrollment,
        now: DateTime<Utc>,
    ) -> AppResult<EnrollmentReport> {
        if enrollment.status() != EnrollmentStatus::Active {
            return Ok(EnrollmentReport::new(EnrollmentOutcome::Untouched));
        }

        let Some(workflow) = self.store.workflow(enrollment.workflow_id).await? else {
            let error = format!("Workflow not found: {}", enrollment.workflow_id);
            return self.fail(enrollment, error, EnrollmentReport::new(EnrollmentOutcome::Continued)).await;
        };

        if !workflow.is_active() {
            tracing::debug!(
                enrollment_id = %enrollment.id,
                workflow_id = %workflow.id,
                status = %workflow.status,
                "Workflow not active, leaving enrollment"
            );
            return Ok(EnrollmentReport::new(EnrollmentOutcome::Untouched));
        }

        let Some(contact) = self.store.contact(enrollment.contact_id).await? else {
            let error = format!("Contact not found: {}", enrollment.contact_id);
            return self.fail(enrollment, error, EnrollmentReport::new(EnrollmentOutcome::Continued)).await;
        };

        let steps = self.store.workflow_steps(workflow.id).await?;
        if steps.is_empty() {
            return self.complete(enrollment, EnrollmentReport::new(EnrollmentOutcome::Continued)).await;
        }

        let mut walk = Walk {
            enrollment,
            workflow: &workflow,
            steps: &steps,
            contact,
            now,
            visited: HashSet::new(),
        };
        let mut report = EnrollmentReport::new(EnrollmentOutcome::Continued);

        let mut index = match enrollment.current_step_id {
            None => 0,
            Some(step_id) => match walk.position(step_id) {
                Some(index) => index,
                None => {
                    let error = format!("Current step {} is not part of workflow {}", step_id, workflow.id);
                    return self.fail(enrollment, error, report).await;
                }
            },
        };

        for _ in 0..self.config.max_steps_per_run {
            let step = &steps[index];

            if !walk.visited.insert(step.id) {
                let error = format!(
                    "Step {} revisited in one run; workflow {} branches form a loop",
                    step.id, workflow.id
                );
                return self.fail(enrollment, error, report).await;
            }

            match self.visit(&mut walk, step).await? {
                Visit::Park(until) => {
                    self.store
                        .advance_enrollment(enrollment.id, Some(step.id), Some(until))
                        .await?;
                    tracing::debug!(enrollment_id = %enrollment.id, step_id = %step.id, until = %until, "Enrollment waiting");
                    report.outcome = EnrollmentOutcome::Waiting { until };
                    return Ok(report);
                }
                Visit::Fail(error) => return self.fail(enrollment, error, report).await,
                Visit::Advance { target, executed, skipped } => {
                    if executed {
                        report.steps_executed += 1;
                    }
                    if skipped {
                        report.skipped += 1;
                    }

                    index = match target {
                        Some(target) => match walk.position(target) {
                            Some(next) => next,
                            None => {
                                let error = format!(
                                    "Branch target {} from step {} is not part of workflow {}",
                                    target, step.id, workflow.id
                                );
                                return self.fail(enrollment, error, report).await;
                            }
                        },
                        None if index + 1 < steps.len() => index + 1,
                        None => return self.complete(enrollment, report).await,
                    };
                }
            }
        }

        // Cap reached: persist the pointer and let the next pass continue.
        self.store
            .advance_enrollment(enrollment.id, Some(steps[index].id), Some(now))
            .await?;
        tracing::debug!(
            enrollment_id = %enrollment.id,
            max_steps = self.config.max_steps_per_run,
            "Step cap reached, continuing next pass"
        );
        Ok(report)
    }

    async fn complete(
        &self,
        enrollment: &Enrollment,
        mut report: EnrollmentReport,
    ) -> AppResult<EnrollmentReport> {
        self.store
            .finish_enrollment(enrollment.id, EnrollmentStatus::Completed, None)
            .await?;
        tracing::info!(enrollment_id = %enrollment.id, workflow_id = %enrollment.workflow_id, "Enrollment completed");
        report.outcome = EnrollmentOutcome::Completed;
        Ok(report)
    }

    async fn fail(
        &self,
        enrollment: &Enrollment,
        error: String,
        mut report: EnrollmentReport,
    ) -> AppResult<EnrollmentReport> {
        self.store
            .finish_enrollment(enrollment.id, EnrollmentStatus::Failed, Some(&error))
            .await?;
        tracing::warn!(enrollment_id = %enrollment.id, workflow_id = %enrollment.workflow_id, error = %error, "Enrollment failed");
        report.outcome = EnrollmentOutcome::Failed { error };
        Ok(report)
    }

    /// Visit one step, honouring any execution already recorded for it.
    async fn visit(&self, walk: &mut Walk<'_>, step: &WorkflowStep) -> AppResult<Visit> {
        let enrollment_id = walk.enrollment.id;

        if let Some(existing) = self.store.find_execution(enrollment_id, step.id).await? {
            match existing.status() {
                status if status.is_settled() => {
                    tracing::debug!(enrollment_id = %enrollment_id, step_id = %step.id, status = %status, "Step already executed");
                    return Ok(Visit::Advance {
                        target: existing.recorded_next_step(),
                        executed: false,
                        skipped: false,
                    });
                }
                ExecutionStatus::Waiting => {
                    return match existing.scheduled_for {
                        Some(until) if until > walk.now => Ok(Visit::Park(until)),
                        _ => {
                            let mut result = existing.result.clone().unwrap_or_else(|| json!({}));
                            if let Value::Object(map) = &mut result {
                                map.insert("resumed_at".to_string(), json!(walk.now));
                            }
                            self.store
                                .update_execution(existing.id, ExecutionStatus::Completed, Some(&result), None)
                                .await?;
                            Ok(Visit::Advance { target: None, executed: true, skipped: false })
                        }
                    };
                }
                // A failed attempt on a re-activated enrollment runs again.
                _ => {}
            }
        }

        let run = match StepAction::from_step(step) {
            Ok(action) => self.run(walk, step, action).await,
            Err(e) => Err(e),
        };

        match run {
            Ok(run) => {
                let mut result = sanitize_sensitive_data(&run.result);
                if let (Some(target), Value::Object(map)) = (run.target, &mut result) {
                    map.insert("next_step_id".to_string(), json!(target));
                }

                self.store
                    .insert_execution(&NewStepExecution {
                        enrollment_id,
                        step_id: step.id,
                        status: run.status,
                        result: Some(result),
                        error: None,
                        scheduled_for: run.scheduled_for,
                    })
                    .await?;

                tracing::debug!(enrollment_id = %enrollment_id, step_id = %step.id, step_type = %step.step_type, status = %run.status, "Step executed");

                match (run.status, run.scheduled_for) {
                    (ExecutionStatus::Waiting, Some(until)) => Ok(Visit::Park(until)),
                    (status, _) => Ok(Visit::Advance {
                        target: run.target,
                        executed: true,
                        skipped: status == ExecutionStatus::Skipped,
                    }),
                }
            }
            Err(e) => {
                let error = e.to_string();
                self.store
                    .insert_execution(&NewStepExecution {
                        enrollment_id,
                        step_id: step.id,
                        status: ExecutionStatus::Failed,
                        result: None,
                        error: Some(error.clone()),
                        scheduled_for: None,
                    })
                    .await?;
                Ok(Visit::Fail(error))
            }
        }
    }

    async fn run(&self, walk: &mut Walk<'_>, step: &WorkflowStep, action: StepAction) -> AppResult<StepRun> {
        match action {
            StepAction::SendEmail(cfg) => self.send_email(walk, &cfg).await,
            StepAction::Wait(cfg) => Self::wait(walk, &cfg),
            StepAction::AddTag(cfg) => self.update_tags(walk, &cfg, true).await,
            StepAction::RemoveTag(cfg) => self.update_tags(walk, &cfg, false).await,
            StepAction::Condition(cfg) => self.branch(walk, step, &cfg),
            StepAction::Webhook(cfg) => self.call_webhook(walk, step, &cfg).await,
        }
    }

    async fn send_email(&self, walk: &Walk<'_>, cfg: &SendEmailConfig) -> AppResult<StepRun> {
        let contact = &walk.contact;

        if contact.unsubscribed {
            return Ok(StepRun {
                status: ExecutionStatus::Skipped,
                result: json!({ "reason": "unsubscribed", "email": contact.email }),
                target: None,
                scheduled_for: None,
            });
        }

        let site = self.store.site(walk.enrollment.site_id).await?;
        let from_email = cfg
            .from_email
            .clone()
            .or_else(|| site.as_ref().and_then(|s| s.from_email.clone()))
            .unwrap_or_else(|| self.config.default_from.clone());
        let from_name = cfg
            .from_name
            .clone()
            .or_else(|| site.as_ref().and_then(|s| s.from_name.clone()));

        let ctx = walk.context();
        let subject = self.renderer.render(&cfg.subject, &ctx)?;
        let html = self.renderer.render(&cfg.body, &ctx)?;

        let message = EmailMessage {
            from: format_sender(from_name.as_deref(), &from_email),
            to: vec![contact.email.clone()],
            subject: subject.clone(),
            html,
            reply_to: cfg.reply_to.clone(),
        };

        let mut send = NewEmailSend {
            site_id: walk.enrollment.site_id,
            contact_id: contact.id,
            enrollment_id: Some(walk.enrollment.id),
            subject: subject.clone(),
            status: EmailSendStatus::Sent,
            provider_message_id: None,
            error: None,
        };

        match self.email.send(&message).await {
            Ok(receipt) => {
                send.provider_message_id = Some(receipt.id.clone());
                // The email is out; a bookkeeping miss must not re-send it.
                let _ = self.store.record_email_send(&send).await.log("recording email send");
                Ok(StepRun::completed(json!({
                    "message_id": receipt.id,
                    "to": contact.email,
                    "subject": subject,
                })))
            }
            Err(e) => {
                send.status = EmailSendStatus::Failed;
                send.error = Some(e.to_string());
                let _ = self.store.record_email_send(&send).await.log("recording failed email send");
                Err(e)
            }
        }
    }

    fn wait(walk: &Walk<'_>, cfg: &WaitConfig) -> AppResult<StepRun> {
        let until = resume_at(walk.now, cfg.duration, cfg.unit)?;
        Ok(StepRun {
            status: ExecutionStatus::Waiting,
            result: json!({ "duration": cfg.duration, "unit": cfg.unit, "resume_at": until }),
            target: None,
            scheduled_for: Some(until),
        })
    }

    async fn update_tags(&self, walk: &mut Walk<'_>, cfg: &TagConfig, add: bool) -> AppResult<StepRun> {
        let tag = cfg.tag.trim();
        let present = walk.contact.has_tag(tag);

        let changed = match (add, present) {
            (true, false) => {
                walk.contact.tags.push(tag.to_string());
                true
            }
            (false, true) => {
                walk.contact.tags.retain(|t| !t.trim().eq_ignore_ascii_case(tag));
                true
            }
            _ => false,
        };

        if changed {
            self.store
                .set_contact_tags(walk.contact.id, &walk.contact.tags)
                .await?;
        }

        Ok(StepRun::completed(json!({
            "tag": tag,
            "action": if add { "added" } else { "removed" },
            "changed": changed,
        })))
    }

    fn branch(&self, walk: &Walk<'_>, step: &WorkflowStep, cfg: &ConditionConfig) -> AppResult<StepRun> {
        let outcome = self.evaluator.evaluate(cfg, &walk.contact, &walk.context())?;
        let target = cfg.branch(outcome);

        if let Some(target) = target {
            if walk.position(target).is_none() {
                return Err(AppError::InvalidStep(format!(
                    "Branch target {} from step {} is not part of workflow {}",
                    target, step.id, walk.workflow.id
                )));
            }
        }

        Ok(StepRun {
            status: ExecutionStatus::Completed,
            result: json!({ "outcome": outcome }),
            target,
            scheduled_for: None,
        })
    }

    async fn call_webhook(&self, walk: &Walk<'_>, step: &WorkflowStep, cfg: &WebhookConfig) -> AppResult<StepRun> {
        let ctx = walk.context();

        let url = self.renderer.render(&cfg.url, &ctx)?;
        if !is_http_url(&url) {
            return Err(AppError::InvalidStep(format!(
                "Webhook step {} rendered url '{}' is not http(s)",
                step.id, url
            )));
        }
        let mut headers = std::collections::HashMap::with_capacity(cfg.headers.len());
        for (key, value) in &cfg.headers {
            headers.insert(key.clone(), self.renderer.render(value, &ctx)?);
        }

        let payload = match &cfg.payload {
            Some(payload) => self.renderer.render_value(payload, &ctx)?,
            None => json!({
                "event": "workflow.step",
                "workflow": ctx.get("workflow"),
                "enrollment_id": walk.enrollment.id,
                "step_id": step.id,
                "contact": ctx.get("contact"),
            }),
        };

        let request = WebhookRequest {
            url,
            method: cfg.method,
            headers,
            payload,
        };
        let response = self.webhooks.dispatch(&request).await?;

        if !response.is_success() {
            return Err(AppError::Delivery(format!(
                "Webhook {} returned status {}",
                request.url, response.status
            )));
        }

        Ok(StepRun::completed(json!({
            "url": request.url,
            "method": request.method,
            "request_headers": sanitize_headers(&request.headers),
            "status": response.status,
            "body": response.body,
        })))
    }
}

/// `Name <email>` when a display name is set.
fn format_sender(name: Option<&str>, email: &str) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{} <{}>", name, email),
        None => email.to_string(),
    }
}
