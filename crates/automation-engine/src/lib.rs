//! CreatorHub Automation Engine
//!
//! This crate runs the marketing automations of the CreatorHub platform:
//!
//! - **Workflow Processing**: Advance enrolled contacts through send email,
//!   wait, tag, condition and webhook steps
//! - **Idempotency**: Every step visit is recorded, so repeated or
//!   overlapping passes never repeat a settled side effect
//! - **Enrollment Management**: Enroll contacts directly or via trigger
//!   events, cancel enrollments and inspect their history
//! - **Reporting**: Per-workflow enrollment statistics
//!
//! ## Architecture
//!
//! A processing pass loads due enrollments from Postgres and walks each one
//! forward until it waits, completes or fails. Passes run from the built-in
//! scheduler, the `run-once` command, or a cron call to
//! `POST /functions/v1/process-workflows`.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`db`]: Database connectivity, models and queries
//! - [`store`]: Storage trait with Postgres and in-memory backends
//! - [`engine`]: Step parsing, condition evaluation and the processor
//! - [`delivery`]: Email and webhook delivery
//! - [`services`]: Enrollment management and stats
//! - [`handlers`]: HTTP route handlers
//! - [`error`]: Custom error types with Axum integration
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use automation_engine::{
//!     config::{AppConfig, DatabaseConfig, DeliveryConfig},
//!     db::create_pool,
//!     delivery::{HttpWebhookDispatcher, ResendClient},
//!     engine::{ProcessorConfig, WorkflowProcessor},
//!     store::PgStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = AppConfig::from_env()?;
//!     let delivery = DeliveryConfig::from_env()?;
//!     let pool = create_pool(&DatabaseConfig::from_env()?, &app.schema).await?;
//!     let processor = WorkflowProcessor::new(
//!         Arc::new(PgStore::new(pool)),
//!         Arc::new(ResendClient::new(&delivery)?),
//!         Arc::new(HttpWebhookDispatcher::new(&delivery)?),
//!         ProcessorConfig::new(&app, &delivery),
//!     );
//!     let summary = processor.process_due(chrono::Utc::now()).await?;
//!     println!("{}", serde_json::to_string(&summary)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod result_ext;
pub mod router;
pub mod sanitize;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod store;
pub mod template;

#[cfg(test)]
mod testing;

pub use error::{AppError, AppResult};
pub use result_ext::ResultExt;
