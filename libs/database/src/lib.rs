//! Database library providing connectors and utilities for CouchDB
//!
//! # Features
//!
//! - `couchdb` (default) - CouchDB support over its HTTP API
//! - `config` - Configuration support with `core_config::FromEnv`
//! - `all` - All features
//!
//! # Example
//!
//! ```ignore
//! use database::couchdb::{self, CouchConfig};
//!
//! let config = CouchConfig::with_database("http://localhost:5984", "products")
//!     .with_credentials("admin", "adminpw");
//! let client = couchdb::connect_from_config_with_retry(&config, None).await?;
//! let db = couchdb::ensure_database(&client, config.database()).await?;
//! ```

// Always available modules
pub mod common;

#[cfg(feature = "couchdb")]
pub mod couchdb;

// Re-exports for convenience
pub use common::{DatabaseError, DatabaseResult};
