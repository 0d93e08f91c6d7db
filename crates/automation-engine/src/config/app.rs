//! Application configuration for the automation engine.

use std::time::Duration;

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// Environment variables are prefixed with `AUTOMATION_`:
/// - `AUTOMATION_HOST`: Server bind address (default: "0.0.0.0")
/// - `AUTOMATION_PORT`: Server port (default: 8090)
/// - `AUTOMATION_POLL_INTERVAL_SECS`: Seconds between processing passes (default: 60)
/// - `AUTOMATION_BATCH_SIZE`: Enrollments loaded per pass (default: 100)
/// - `AUTOMATION_MAX_STEPS_PER_RUN`: Steps one enrollment may advance per pass (default: 25)
/// - `AUTOMATION_CRON_SECRET`: Bearer secret required by the process endpoint (optional)
/// - `AUTOMATION_SCHEMA`: Database schema holding the workflow tables (default: "public")
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable debug mode
    #[serde(default)]
    pub debug: bool,

    /// Seconds between scheduled processing passes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum due enrollments loaded per pass
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Maximum steps a single enrollment advances in one pass
    #[serde(default = "default_max_steps")]
    pub max_steps_per_run: usize,

    /// Shared secret for `POST /functions/v1/process-workflows`
    #[serde(default)]
    pub cron_secret: Option<String>,

    /// Database schema
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Run the background scheduler alongside the HTTP server
    #[serde(default = "default_true")]
    pub scheduler_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_poll_interval() -> u64 {
    60
}

fn default_batch_size() -> i64 {
    100
}

fn default_max_steps() -> usize {
    25
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `AUTOMATION_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("AUTOMATION_").from_env::<AppConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Interval between scheduled passes.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
            max_steps_per_run: default_max_steps(),
            cron_secret: None,
            schema: default_schema(),
            scheduler_enabled: true,
        }
    }
}
