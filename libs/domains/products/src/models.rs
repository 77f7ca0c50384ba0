use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;
use validator::Validate;

use crate::store::StoredDocument;

/// Product entity as stored and returned by the API.
///
/// Serialized with the store's own `_id`/`_rev` keys; `id`/`rev` are accepted
/// on input as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    /// Unique identifier, immutable after creation
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    /// Opaque revision token; changes on every successful write
    #[serde(rename = "_rev", alias = "rev")]
    pub rev: String,

    /// Product name, unique across live products
    pub name: String,

    /// Unit price, strictly positive
    pub price: f64,
}

/// Document body persisted for a product; id and revision live in the envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ProductBody {
    pub name: String,
    pub price: f64,
}

impl ProductBody {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({ "name": self.name, "price": self.price })
    }
}

impl Product {
    pub(crate) fn from_body(id: impl Into<String>, rev: impl Into<String>, body: ProductBody) -> Self {
        Self {
            id: id.into(),
            rev: rev.into(),
            name: body.name,
            price: body.price,
        }
    }
}

impl TryFrom<StoredDocument> for Product {
    type Error = serde_json::Error;

    fn try_from(doc: StoredDocument) -> Result<Self, Self::Error> {
        let body: ProductBody = serde_json::from_value(doc.body)?;
        Ok(Product::from_body(doc.id, doc.rev, body))
    }
}

/// DTO for creating a new product
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProduct {
    /// Caller-chosen identifier; generated when absent
    #[serde(
        default,
        rename = "_id",
        alias = "id",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(length(min = 1, max = 200))]
    pub id: Option<String>,

    #[validate(length(min = 3, max = 100))]
    pub name: String,

    #[validate(range(exclusive_min = 0.0))]
    pub price: f64,
}

/// DTO for updating a product; the revision must be the current one
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProduct {
    #[serde(rename = "_rev", alias = "rev")]
    #[validate(length(min = 1))]
    pub rev: String,

    #[validate(length(min = 3, max = 100))]
    pub name: String,

    #[validate(range(exclusive_min = 0.0))]
    pub price: f64,
}

/// One entry of a bulk update request.
///
/// Items missing an id or a revision are skipped rather than rejected, so
/// both are optional here.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct BulkUpdateItem {
    #[serde(
        default,
        rename = "_id",
        alias = "id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,

    #[serde(
        default,
        rename = "_rev",
        alias = "rev",
        skip_serializing_if = "Option::is_none"
    )]
    pub rev: Option<String>,

    #[validate(length(min = 3, max = 100))]
    pub name: String,

    #[validate(range(exclusive_min = 0.0))]
    pub price: f64,
}

/// Body of `POST /bulk-create`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(transparent)]
pub struct BulkCreateRequest {
    #[validate(nested)]
    pub items: Vec<CreateProduct>,
}

/// Body of `PUT /bulk-update`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(transparent)]
pub struct BulkUpdateRequest {
    #[validate(nested)]
    pub items: Vec<BulkUpdateItem>,
}

/// Outcome of a single bulk item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BulkItemStatus {
    Created,
    Updated,
    /// Dropped before the batch write (duplicate name, missing id, lookup failure)
    Skipped,
    /// Rejected by the store during the batch write
    Failed,
}

/// Per-item report of a bulk operation, in request order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BulkItemResult {
    /// Position of the item in the request
    pub index: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// New revision when the write succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    pub status: BulkItemStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BulkItemResult {
    pub fn written(index: usize, id: String, rev: String, status: BulkItemStatus) -> Self {
        Self {
            index,
            id: Some(id),
            rev: Some(rev),
            status,
            reason: None,
        }
    }

    pub fn skipped(index: usize, id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            index,
            id,
            rev: None,
            status: BulkItemStatus::Skipped,
            reason: Some(reason.into()),
        }
    }

    pub fn failed(index: usize, id: String, reason: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id),
            rev: None,
            status: BulkItemStatus::Failed,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, BulkItemStatus::Created | BulkItemStatus::Updated)
    }
}

/// Summary of a bulk operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BulkResponse {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub items: Vec<BulkItemResult>,
}

impl BulkResponse {
    /// Build the summary, sorting items back into request order
    pub fn from_items(mut items: Vec<BulkItemResult>) -> Self {
        items.sort_by_key(|item| item.index);
        let succeeded = items.iter().filter(|i| i.is_success()).count();
        let skipped = items
            .iter()
            .filter(|i| i.status == BulkItemStatus::Skipped)
            .count();
        let failed = items
            .iter()
            .filter(|i| i.status == BulkItemStatus::Failed)
            .count();

        Self {
            succeeded,
            skipped,
            failed,
            items,
        }
    }
}
