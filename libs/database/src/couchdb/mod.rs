//! CouchDB connector and utilities
//!
//! Provides connection management, database bootstrap and health checks over
//! CouchDB's HTTP API.

mod config;
mod connector;
mod health;

pub use config::CouchConfig;
pub use connector::{
    CouchClient, CouchDatabase, connect, connect_from_config, connect_from_config_with_retry,
    ensure_database,
};
pub use health::{HealthStatus, check_health, check_health_detailed};
