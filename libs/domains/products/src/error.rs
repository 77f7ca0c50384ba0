use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Revision conflict on product {0}: the supplied revision is not the current one")]
    RevisionConflict(String),

    #[error("Product with name '{0}' already exists")]
    DuplicateName(String),

    #[error("Product with id '{0}' already exists")]
    IdTaken(String),

    #[error("No valid items to process")]
    NoValidItems,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

pub type ProductResult<T> = Result<T, ProductError>;

/// Single-document store failures keep their kind: a missing document is
/// `NotFound` and a revision mismatch is `RevisionConflict`.
impl From<StoreError> for ProductError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => ProductError::NotFound(id),
            StoreError::Conflict { id } => ProductError::RevisionConflict(id),
            other => ProductError::Store(other),
        }
    }
}

/// Convert ProductError to AppError for standardized error responses
impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound(id) => AppError::NotFound(format!("Product {} not found", id)),
            ProductError::RevisionConflict(id) => AppError::RevisionConflict(format!(
                "Product {} was modified by someone else; fetch it again and retry",
                id
            )),
            ProductError::DuplicateName(name) => {
                AppError::Conflict(format!("Product with name '{}' already exists", name))
            }
            ProductError::IdTaken(id) => {
                AppError::Conflict(format!("Product with id '{}' already exists", id))
            }
            ProductError::NoValidItems => {
                AppError::BadRequest("No valid items to process".to_string())
            }
            ProductError::Validation(msg) => AppError::BadRequest(msg),
            ProductError::Store(e) if e.is_transient() => AppError::ServiceUnavailable(e.to_string()),
            ProductError::Store(e) => AppError::Database(e.to_string()),
        }
    }
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
