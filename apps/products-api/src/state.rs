//! Application state management

use database::couchdb::{CouchClient, CouchDatabase};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    pub client: CouchClient,
    pub db: CouchDatabase,
}
