//! Products Domain
//!
//! Product catalog over a revisioned document store (CouchDB in production,
//! an in-memory map for tests and local runs).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Input validation, unit of work per call
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Revision checks, name uniqueness, bulk outcomes
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌────────────┐
//! │    Store    │ ◄── │ Name index │
//! └─────────────┘     └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use database::couchdb::{connect_from_config, ensure_database, CouchConfig};
//! use domain_products::{handlers, CouchDocumentStore, ProductService, StoreProductRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CouchConfig::with_database("http://localhost:5984", "products")
//!     .with_credentials("admin", "adminpw");
//! let client = connect_from_config(&config).await?;
//! let db = ensure_database(&client, config.database()).await?;
//!
//! let store = CouchDocumentStore::new(db);
//! store.init_indexes().await?;
//!
//! let service = ProductService::new(StoreProductRepository::new(store));
//! let router = handlers::router(service);
//! # Ok(())
//! # }
//! ```

pub mod couchdb;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod repository;
pub mod service;
pub mod store;
pub mod uniqueness;

// Re-export commonly used types
pub use couchdb::CouchDocumentStore;
pub use error::{ProductError, ProductResult};
pub use handlers::ApiDoc;
pub use memory::InMemoryDocumentStore;
pub use models::{
    BulkItemResult, BulkItemStatus, BulkResponse, BulkUpdateItem, CreateProduct, Product,
    UpdateProduct,
};
pub use repository::{ProductRepository, StoreProductRepository};
pub use service::ProductService;
pub use store::{DocumentStore, StoreError, StoreResult, StoredDocument};
pub use uniqueness::NameIndex;
