//! Configuration for Products API

use core_config::{app_info, server::ServerConfig, AppInfo, FromEnv};
use database::couchdb::CouchConfig;

pub use core_config::Environment;

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub couchdb: CouchConfig,
    pub server: ServerConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let couchdb = CouchConfig::from_env()?;
        let server = ServerConfig::from_env()?;

        Ok(Self {
            app: app_info!(),
            couchdb,
            server,
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env_defaults() {
        temp_env::with_vars(
            [
                ("COUCHDB_URL", None::<&str>),
                ("COUCHDB_HOST", None),
                ("COUCHDB_DATABASE", None),
                ("PORT", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.couchdb.url(), "http://localhost:5984");
                assert_eq!(config.couchdb.database(), "products");
                assert_eq!(config.server.port, 8081);
                assert_eq!(config.app.name, "products_api");
            },
        );
    }

    #[test]
    fn test_config_from_env_overrides() {
        temp_env::with_vars(
            [
                ("COUCHDB_URL", Some("http://couch:5984")),
                ("COUCHDB_DATABASE", Some("catalog")),
                ("PORT", Some("9000")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.couchdb.url(), "http://couch:5984");
                assert_eq!(config.couchdb.database(), "catalog");
                assert_eq!(config.server.port, 9000);
            },
        );
    }

    #[test]
    fn test_config_from_env_rejects_bad_port() {
        temp_env::with_var("PORT", Some("eighty"), || {
            assert!(Config::from_env().is_err());
        });
    }
}
