use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::info;

use super::CouchConfig;
use crate::common::{DatabaseError, DatabaseResult, RetryConfig, retry_with_backoff_if};

/// Handle to a CouchDB server.
///
/// Cheap to clone; the underlying `reqwest::Client` pools connections and is
/// safe to share between concurrent requests.
#[derive(Clone)]
pub struct CouchClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<(String, Option<String>)>,
}

impl CouchClient {
    /// Build a client without touching the network
    pub fn new(config: &CouchConfig) -> DatabaseResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let credentials = config
            .username
            .clone()
            .map(|user| (user, config.password.clone()));

        Ok(Self {
            http,
            base_url: config.url.clone(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start an authenticated request against `path` (relative to the server root)
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.http.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, password.as_ref()),
            None => builder,
        }
    }

    /// Handle to a database on this server. Does not check that it exists.
    pub fn database(&self, name: impl Into<String>) -> CouchDatabase {
        CouchDatabase {
            client: self.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Debug for CouchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CouchClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Handle to a single CouchDB database
#[derive(Clone, Debug)]
pub struct CouchDatabase {
    client: CouchClient,
    name: String,
}

impl CouchDatabase {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &CouchClient {
        &self.client
    }

    /// Start a request against `path` inside this database.
    ///
    /// `path` is appended verbatim; callers percent-encode document ids themselves.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let db = urlencoding::encode(&self.name);
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.client.request(method, &db)
        } else {
            self.client.request(method, &format!("{}/{}", db, path))
        }
    }
}

#[derive(Debug, Deserialize)]
struct Welcome {
    #[serde(default)]
    version: Option<String>,
}

/// Connect to CouchDB at `url` with default settings and no credentials
pub async fn connect(url: &str) -> DatabaseResult<CouchClient> {
    connect_from_config(&CouchConfig::new(url)).await
}

/// Connect using a CouchConfig
///
/// Verifies reachability and credentials with a `GET /`.
pub async fn connect_from_config(config: &CouchConfig) -> DatabaseResult<CouchClient> {
    info!(url = %config.url, "Attempting to connect to CouchDB");

    let client = CouchClient::new(config)?;

    let response = client
        .request(Method::GET, "/")
        .send()
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    match response.status() {
        status if status.is_success() => {
            let welcome: Welcome = response.json().await?;
            info!(
                version = welcome.version.as_deref().unwrap_or("unknown"),
                "Successfully connected to CouchDB"
            );
            Ok(client)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DatabaseError::ConfigError(
            "CouchDB rejected the configured credentials".to_string(),
        )),
        status => Err(DatabaseError::ConnectionFailed(format!(
            "CouchDB answered {} to the welcome probe",
            status
        ))),
    }
}

/// Connect from config with automatic retry on failure
///
/// Credential errors are not retried.
///
/// # Example
/// ```ignore
/// use database::couchdb::{CouchConfig, connect_from_config_with_retry};
/// use database::common::RetryConfig;
///
/// let config = CouchConfig::from_env()?;
/// let client = connect_from_config_with_retry(&config, Some(RetryConfig::new().with_max_retries(5))).await?;
/// ```
pub async fn connect_from_config_with_retry(
    config: &CouchConfig,
    retry_config: Option<RetryConfig>,
) -> DatabaseResult<CouchClient> {
    let config_clone = config.clone();

    retry_with_backoff_if(
        || connect_from_config(&config_clone),
        retry_config.unwrap_or_default(),
        |e| !matches!(e, DatabaseError::ConfigError(_)),
    )
    .await
}

/// Create the database if it does not exist yet and return a handle to it.
///
/// CouchDB answers 412 when the database already exists; that is success here.
pub async fn ensure_database(client: &CouchClient, name: &str) -> DatabaseResult<CouchDatabase> {
    let db = client.database(name);
    let response = db.request(Method::PUT, "").send().await?;

    match response.status() {
        StatusCode::CREATED | StatusCode::ACCEPTED => {
            info!(database = name, "Database created");
        }
        StatusCode::PRECONDITION_FAILED => {
            info!(database = name, "Database already exists, proceeding");
        }
        status => {
            let body = response.text().await.unwrap_or_default();
            return Err(DatabaseError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
    }

    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CouchClient {
        let config = CouchConfig::with_database("http://localhost:5984", "catalog")
            .with_credentials("admin", "adminpw");
        CouchClient::new(&config).unwrap()
    }

    #[test]
    fn test_request_url_is_joined_to_base() {
        let request = client().request(Method::GET, "/_up").build().unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:5984/_up");
        assert!(request.headers().contains_key(reqwest::header::AUTHORIZATION));
    }

    #[test]
    fn test_database_request_prefixes_database_name() {
        let db = client().database("catalog");
        let request = db.request(Method::GET, "_all_docs").build().unwrap();
        assert_eq!(request.url().path(), "/catalog/_all_docs");

        let root = db.request(Method::PUT, "").build().unwrap();
        assert_eq!(root.url().path(), "/catalog");
    }

    #[test]
    fn test_debug_hides_credentials() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("adminpw"));
    }

    #[tokio::test]
    #[ignore] // Requires actual CouchDB
    async fn test_connect_and_ensure_database() {
        let url =
            std::env::var("COUCHDB_URL").unwrap_or_else(|_| "http://localhost:5984".to_string());
        let config = CouchConfig::with_database(url, "connector_test")
            .with_credentials("admin", "adminpw");

        let client = connect_from_config(&config).await.unwrap();
        let db = ensure_database(&client, config.database()).await.unwrap();
        // second call hits the 412 path
        ensure_database(&client, db.name()).await.unwrap();
    }
}
