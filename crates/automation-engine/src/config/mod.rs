//! Configuration module for the automation engine.
//!
//! This module provides configuration loading from environment variables
//! using the `envy` crate for type-safe environment variable parsing.

mod app;
mod database;
mod delivery;

pub use app::AppConfig;
pub use database::DatabaseConfig;
pub use delivery::DeliveryConfig;
