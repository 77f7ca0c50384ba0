use reqwest::Method;
use std::time::Instant;

use super::CouchClient;

/// Health check status for CouchDB
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the server reported itself as up
    pub healthy: bool,
    /// Error details when unhealthy
    pub message: Option<String>,
    /// Round-trip time in milliseconds
    pub response_time_ms: u64,
}

/// Probe `GET /_up`
pub async fn check_health(client: &CouchClient) -> bool {
    check_health_detailed(client).await.healthy
}

/// Probe `GET /_up` and report latency and any error
pub async fn check_health_detailed(client: &CouchClient) -> HealthStatus {
    let start = Instant::now();

    let result = client.request(Method::GET, "/_up").send().await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(response) if response.status().is_success() => HealthStatus {
            healthy: true,
            message: None,
            response_time_ms,
        },
        Ok(response) => HealthStatus {
            healthy: false,
            message: Some(format!("CouchDB answered {}", response.status())),
            response_time_ms,
        },
        Err(e) => HealthStatus {
            healthy: false,
            message: Some(e.to_string()),
            response_time_ms,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::couchdb::CouchConfig;

    #[tokio::test]
    async fn test_check_health_unreachable_server() {
        // port 9 (discard) is closed on any sane test host
        let config = CouchConfig::new("http://127.0.0.1:9").with_timeout(2);
        let client = CouchClient::new(&config).unwrap();

        let status = check_health_detailed(&client).await;
        assert!(!status.healthy);
        assert!(status.message.is_some());
    }

    #[tokio::test]
    #[ignore] // Requires actual CouchDB
    async fn test_check_health() {
        let config = CouchConfig::new("http://localhost:5984");
        let client = CouchClient::new(&config).unwrap();
        assert!(check_health(&client).await);
    }
}
