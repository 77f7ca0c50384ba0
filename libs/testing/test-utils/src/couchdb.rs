//! CouchDB test infrastructure
//!
//! Provides a `TestCouchDb` helper that runs a CouchDB container for testing.

use database::couchdb::{
    check_health, ensure_database, CouchClient, CouchConfig, CouchDatabase,
};
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

const COUCHDB_PORT: u16 = 5984;
const ADMIN_USER: &str = "admin";
const ADMIN_PASSWORD: &str = "adminpw";

/// Test CouchDB wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestCouchDb;
///
/// # async fn example() {
/// let couch = TestCouchDb::new().await;
/// let db = couch.database("products").await;
/// assert_eq!(db.name(), "products");
/// # }
/// ```
pub struct TestCouchDb {
    #[allow(dead_code)]
    container: ContainerAsync<GenericImage>,
    client: CouchClient,
    config: CouchConfig,
}

impl TestCouchDb {
    /// Start a CouchDB 3 container with an admin account
    pub async fn new() -> Self {
        let container = GenericImage::new("couchdb", "3.4")
            .with_exposed_port(COUCHDB_PORT.tcp())
            .with_wait_for(WaitFor::Nothing)
            .with_env_var("COUCHDB_USER", ADMIN_USER)
            .with_env_var("COUCHDB_PASSWORD", ADMIN_PASSWORD)
            .start()
            .await
            .expect("Failed to start CouchDB container");

        let host_port = container
            .get_host_port_ipv4(COUCHDB_PORT)
            .await
            .expect("Failed to get CouchDB port");

        let config = CouchConfig::new(format!("http://127.0.0.1:{}", host_port))
            .with_credentials(ADMIN_USER, ADMIN_PASSWORD)
            .with_timeout(10);
        let client = CouchClient::new(&config).expect("Failed to create CouchDB client");

        // the port opens before the server answers
        let mut ready = false;
        for _ in 0..60 {
            if check_health(&client).await {
                ready = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert!(ready, "CouchDB container did not become ready");

        tracing::info!(port = host_port, "Test CouchDB ready (couchdb 3.4)");

        Self {
            container,
            client,
            config,
        }
    }

    /// Get a cloned client (useful for passing to services)
    pub fn client(&self) -> CouchClient {
        self.client.clone()
    }

    /// Connection settings pointing at the container
    pub fn config(&self) -> &CouchConfig {
        &self.config
    }

    /// Create (if needed) and return a database
    pub async fn database(&self, name: &str) -> CouchDatabase {
        ensure_database(&self.client, name)
            .await
            .expect("Failed to create test database")
    }
}

// Container is automatically cleaned up when TestCouchDb is dropped
impl Drop for TestCouchDb {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test CouchDB container");
    }
}
