//! Product Service - unit-of-work boundary over the repository

use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

use crate::error::{ProductError, ProductResult};
use crate::models::{BulkResponse, BulkUpdateItem, CreateProduct, Product, UpdateProduct};
use crate::repository::ProductRepository;

/// Product service forwarding to the repository.
///
/// Each method is one unit of work and gets its own tracing span.
pub struct ProductService<R: ProductRepository> {
    repository: Arc<R>,
}

impl<R: ProductRepository> Clone for ProductService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

fn validate_all<T: Validate>(items: &[T]) -> ProductResult<()> {
    for (index, item) in items.iter().enumerate() {
        item.validate()
            .map_err(|e| ProductError::Validation(format!("item {}: {}", index, e)))?;
    }
    Ok(())
}

impl<R: ProductRepository> ProductService<R> {
    /// Create a new ProductService with the given repository
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Create a new product
    #[instrument(skip(self, input), fields(product_name = %input.name))]
    pub async fn create_product(&self, input: CreateProduct) -> ProductResult<Product> {
        input
            .validate()
            .map_err(|e| ProductError::Validation(e.to_string()))?;

        self.repository.create(input).await
    }

    /// Get a product by ID
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &str) -> ProductResult<Product> {
        self.repository.get_by_id(id).await
    }

    /// List all products
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> ProductResult<Vec<Product>> {
        self.repository.get_all().await
    }

    /// Update an existing product
    #[instrument(skip(self, input))]
    pub async fn update_product(&self, id: &str, input: UpdateProduct) -> ProductResult<Product> {
        input
            .validate()
            .map_err(|e| ProductError::Validation(e.to_string()))?;

        self.repository.update_by_id(id, input).await
    }

    /// Delete a product.
    ///
    /// Without a revision the current one is read first. That read and the
    /// delete are two calls, so a concurrent update in between still makes
    /// the delete fail with `RevisionConflict`.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &str, rev: Option<String>) -> ProductResult<()> {
        let rev = match rev {
            Some(rev) => rev,
            None => self.repository.get_by_id(id).await?.rev,
        };

        self.repository.delete_by_id(id, &rev).await
    }

    /// Create several products in one batch
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn bulk_create(&self, items: Vec<CreateProduct>) -> ProductResult<BulkResponse> {
        validate_all(&items)?;
        self.repository.bulk_create(items).await
    }

    /// Update several products in one batch
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn bulk_update(&self, items: Vec<BulkUpdateItem>) -> ProductResult<BulkResponse> {
        validate_all(&items)?;
        self.repository.bulk_update(items).await
    }
}
