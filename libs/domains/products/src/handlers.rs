//! HTTP handlers for Products API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use axum_helpers::{
    errors::responses::{
        BadRequestValidationResponse, ConflictResponse, InternalServerErrorResponse,
        NotFoundResponse, ServiceUnavailableResponse,
    },
    ValidatedJson,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi};

use crate::error::ProductResult;
use crate::models::{
    BulkCreateRequest, BulkItemResult, BulkItemStatus, BulkResponse, BulkUpdateItem,
    BulkUpdateRequest, CreateProduct, Product, UpdateProduct,
};
use crate::repository::ProductRepository;
use crate::service::ProductService;

/// OpenAPI documentation for Products API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_products,
        create_product,
        get_product,
        update_product,
        delete_product,
        bulk_create,
        bulk_update,
    ),
    components(
        schemas(
            Product, CreateProduct, UpdateProduct, BulkUpdateItem,
            BulkResponse, BulkItemResult, BulkItemStatus
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            ConflictResponse,
            InternalServerErrorResponse,
            ServiceUnavailableResponse
        )
    ),
    tags(
        (name = "Products", description = "Product catalog endpoints")
    )
)]
pub struct ApiDoc;

/// Create the products router with all HTTP endpoints
pub fn router<R: ProductRepository + 'static>(service: ProductService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/bulk-create", post(bulk_create))
        .route("/bulk-update", put(bulk_update))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .with_state(shared_service)
}

/// List all products
#[utoipa::path(
    get,
    path = "",
    tag = "Products",
    responses(
        (status = 200, description = "List of products", body = Vec<Product>),
        (status = 500, response = InternalServerErrorResponse),
        (status = 503, response = ServiceUnavailableResponse)
    )
)]
async fn list_products<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
) -> ProductResult<Json<Vec<Product>>> {
    let products = service.list_products().await?;
    Ok(Json(products))
}

/// Create a new product
#[utoipa::path(
    post,
    path = "",
    tag = "Products",
    request_body = CreateProduct,
    responses(
        (status = 201, description = "Product created successfully", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    ValidatedJson(input): ValidatedJson<CreateProduct>,
) -> ProductResult<impl IntoResponse> {
    let product = service.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    Path(id): Path<String>,
) -> ProductResult<Json<Product>> {
    let product = service.get_product(&id).await?;
    Ok(Json(product))
}

/// Update a product
///
/// The body must carry the product's current `_rev`.
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = String, Path, description = "Product ID")
    ),
    request_body = UpdateProduct,
    responses(
        (status = 200, description = "Product updated successfully", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<UpdateProduct>,
) -> ProductResult<Json<Product>> {
    let product = service.update_product(&id, input).await?;
    Ok(Json(product))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteParams {
    /// Revision to delete; the current one is used when omitted
    pub rev: Option<String>,
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = String, Path, description = "Product ID"),
        DeleteParams
    ),
    responses(
        (status = 204, description = "Product deleted successfully"),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> ProductResult<impl IntoResponse> {
    service.delete_product(&id, params.rev).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create products in bulk
///
/// Every name is checked against existing products first; one taken name
/// rejects the whole batch before anything is written.
#[utoipa::path(
    post,
    path = "/bulk-create",
    tag = "Products",
    request_body = Vec<CreateProduct>,
    responses(
        (status = 201, description = "Per-item outcome of the batch", body = BulkResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn bulk_create<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    ValidatedJson(request): ValidatedJson<BulkCreateRequest>,
) -> ProductResult<impl IntoResponse> {
    let response = service.bulk_create(request.items).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Update products in bulk
///
/// Items without an id or revision, or whose new name is taken, are skipped
/// and reported; the rest are written.
#[utoipa::path(
    put,
    path = "/bulk-update",
    tag = "Products",
    request_body = Vec<BulkUpdateItem>,
    responses(
        (status = 200, description = "Per-item outcome of the batch", body = BulkResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn bulk_update<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    ValidatedJson(request): ValidatedJson<BulkUpdateRequest>,
) -> ProductResult<Json<BulkResponse>> {
    let response = service.bulk_update(request.items).await?;
    Ok(Json(response))
}
