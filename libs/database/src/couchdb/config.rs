use std::fmt;

#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or};

const DEFAULT_URL: &str = "http://localhost:5984";
const DEFAULT_DATABASE: &str = "products";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// CouchDB connection settings
///
/// Credentials are kept apart from the URL so they never end up in logs.
///
/// # Example
///
/// ```ignore
/// use database::couchdb::CouchConfig;
///
/// let config = CouchConfig::with_database("http://localhost:5984", "products")
///     .with_credentials("admin", "adminpw");
/// ```
#[derive(Clone)]
pub struct CouchConfig {
    /// Server base URL, e.g. `http://localhost:5984` (no trailing slash, no credentials)
    pub url: String,

    /// Database (namespace) holding the documents
    pub database: String,

    /// Basic-auth user name
    pub username: Option<String>,

    /// Basic-auth password
    pub password: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl CouchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: normalize_url(url.into()),
            database: DEFAULT_DATABASE.to_string(),
            username: None,
            password: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_database(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::new(url)
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

impl Default for CouchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl fmt::Debug for CouchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CouchConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn normalize_url(url: String) -> String {
    let url = url.trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Load CouchConfig from environment variables
///
/// - `COUCHDB_URL` (optional) - full base URL; takes precedence over `COUCHDB_HOST`
/// - `COUCHDB_HOST` (optional, default: `localhost:5984`) - host and port, no scheme
/// - `COUCHDB_USER` (optional, default: `admin`)
/// - `COUCHDB_PASSWORD` (optional, default: `adminpw`)
/// - `COUCHDB_DATABASE` (optional, default: `products`)
/// - `COUCHDB_TIMEOUT_SECS` (optional, default: 30)
#[cfg(feature = "config")]
impl FromEnv for CouchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("COUCHDB_URL")
            .unwrap_or_else(|_| env_or_default("COUCHDB_HOST", "localhost:5984"));
        let username = env_or_default("COUCHDB_USER", "admin");
        let password = env_or_default("COUCHDB_PASSWORD", "adminpw");
        let database = env_or_default("COUCHDB_DATABASE", DEFAULT_DATABASE);
        let timeout_secs = env_parse_or("COUCHDB_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        if database.trim().is_empty() {
            return Err(ConfigError::ParseError {
                key: "COUCHDB_DATABASE".to_string(),
                details: "database name cannot be empty".to_string(),
            });
        }

        Ok(CouchConfig::with_database(url, database)
            .with_credentials(username, password)
            .with_timeout(timeout_secs))
    }
}
