//! Products API routes

use axum::Router;
use domain_products::{handlers, CouchDocumentStore, ProductService, StoreProductRepository};

use crate::state::AppState;

/// Create products router
pub fn router(state: &AppState) -> Router {
    let store = CouchDocumentStore::new(state.db.clone());
    let repository = StoreProductRepository::new(store);
    let service = ProductService::new(repository);
    handlers::router(service)
}

/// Install the design document backing the name index
pub async fn init_indexes(state: &AppState) -> eyre::Result<()> {
    CouchDocumentStore::new(state.db.clone())
        .init_indexes()
        .await?;
    Ok(())
}
