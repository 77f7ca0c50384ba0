//! Products API - REST server over a CouchDB product catalog

use axum_helpers::server::{create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use database::couchdb::{connect_from_config_with_retry, ensure_database};
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    info!("Connecting to CouchDB at {}", config.couchdb.url());

    let client = connect_from_config_with_retry(&config.couchdb, None).await?;
    let db = ensure_database(&client, config.couchdb.database()).await?;

    info!(
        "Using CouchDB database: {}",
        config.couchdb.database()
    );

    let state = AppState {
        config: config.clone(),
        client,
        db,
    };

    api::init_indexes(&state).await?;

    let server = state.config.server.clone();
    let app_info = state.config.app;

    let api_routes = api::routes(&state);
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes, &server).await?;
    let app = router.merge(health_router(app_info));

    info!("Starting Products API on port {}", server.port);

    create_production_app(
        app,
        &server,
        Duration::from_secs(30),
        async move {
            info!("Shutting down: releasing CouchDB client");
            drop(state);
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Products API shutdown complete");
    Ok(())
}
