//! Readiness endpoint

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use axum_helpers::{run_health_checks, HealthCheckFuture};
use database::couchdb::check_health_detailed;

use crate::state::AppState;

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let couchdb: HealthCheckFuture = Box::pin(async move {
        let status = check_health_detailed(&state.client).await;
        if status.healthy {
            Ok(())
        } else {
            Err(status.message.unwrap_or_else(|| "CouchDB is down".to_string()))
        }
    });

    run_health_checks(vec![("couchdb", couchdb)]).await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .with_state(state)
}
