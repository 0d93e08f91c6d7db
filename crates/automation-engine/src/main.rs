//! Automation engine server and job runner.
//!
//! `process-workflows serve` runs the HTTP API with the background
//! scheduler; `run-once` runs a single pass for cron-style deployments.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use automation_engine::{
    config::{AppConfig, DatabaseConfig, DeliveryConfig},
    db::{create_pool, schema::init_schema, DbPool},
    delivery::{
        DryRunEmailSender, DryRunWebhookDispatcher, EmailSender, HttpWebhookDispatcher,
        ResendClient, WebhookDispatcher,
    },
    engine::{ProcessorConfig, WorkflowProcessor},
    router::build_router,
    scheduler::Scheduler,
    state::AppState,
    store::{PgStore, WorkflowStore},
};

#[derive(Parser)]
#[command(name = "process-workflows")]
#[command(version, about = "CreatorHub automation workflow engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the background scheduler (default)
    Serve,

    /// Run one processing pass, print the summary as JSON and exit
    RunOnce {
        /// Log emails and webhooks instead of sending them.
        /// Executions are still recorded, so point this at a scratch database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply the embedded database schema
    InitDb,
}

/// Initialize tracing/logging.
///
/// `LOG_FORMAT=json` switches to structured JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,automation_engine=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();

    let app_config = AppConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load app config, using defaults");
        AppConfig::default()
    });

    let db_config = DatabaseConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load database config, using defaults");
        DatabaseConfig::default()
    });

    let delivery_config = DeliveryConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load delivery config, using defaults");
        DeliveryConfig::default()
    });

    let db_pool = create_pool(&db_config, &app_config.schema).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(app_config, delivery_config, db_pool).await,
        Commands::RunOnce { dry_run } => {
            run_once(app_config, delivery_config, db_pool, dry_run).await
        }
        Commands::InitDb => {
            let applied = init_schema(&db_pool).await?;
            tracing::info!(statements = applied, schema = %app_config.schema, "Database initialized");
            Ok(())
        }
    }
}

/// Wire the processor to Postgres and the configured delivery backends.
fn build_processor(
    store: Arc<dyn WorkflowStore>,
    app_config: &AppConfig,
    delivery_config: &DeliveryConfig,
    dry_run: bool,
) -> anyhow::Result<WorkflowProcessor> {
    let email: Arc<dyn EmailSender> = if dry_run {
        Arc::new(DryRunEmailSender)
    } else if !delivery_config.has_api_key() && app_config.debug {
        tracing::warn!("RESEND_API_KEY not set, debug mode logs emails instead of sending");
        Arc::new(DryRunEmailSender)
    } else {
        Arc::new(ResendClient::new(delivery_config)?)
    };

    let webhooks: Arc<dyn WebhookDispatcher> = if dry_run {
        Arc::new(DryRunWebhookDispatcher)
    } else {
        Arc::new(HttpWebhookDispatcher::new(delivery_config)?)
    };

    Ok(WorkflowProcessor::new(
        store,
        email,
        webhooks,
        ProcessorConfig::new(app_config, delivery_config),
    ))
}

async fn run_once(
    app_config: AppConfig,
    delivery_config: DeliveryConfig,
    db_pool: DbPool,
    dry_run: bool,
) -> anyhow::Result<()> {
    let store: Arc<dyn WorkflowStore> = Arc::new(PgStore::new(db_pool));
    let processor = build_processor(store, &app_config, &delivery_config, dry_run)?;

    let summary = processor.process_due(Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn serve(
    app_config: AppConfig,
    delivery_config: DeliveryConfig,
    db_pool: DbPool,
) -> anyhow::Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting automation engine"
    );

    tracing::info!(
        host = %app_config.host,
        port = app_config.port,
        poll_interval_secs = app_config.poll_interval_secs,
        batch_size = app_config.batch_size,
        scheduler_enabled = app_config.scheduler_enabled,
        "Configuration loaded"
    );

    let store: Arc<dyn WorkflowStore> = Arc::new(PgStore::new(db_pool.clone()));
    let processor = Arc::new(build_processor(
        store.clone(),
        &app_config,
        &delivery_config,
        false,
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if app_config.scheduler_enabled {
        let scheduler = Scheduler::new(processor.clone(), app_config.poll_interval());
        Some(tokio::spawn(scheduler.run(shutdown_rx)))
    } else {
        tracing::info!("Scheduler disabled, passes run only via the process endpoint");
        None
    };

    let addr: SocketAddr = app_config.bind_address().parse()?;
    let state = AppState::new(store, processor, Some(db_pool), app_config);
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Server listening");

    // Run the server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Scheduler task ended abnormally");
        }
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
