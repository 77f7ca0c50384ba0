use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{ProductError, ProductResult};
use crate::models::{
    BulkItemResult, BulkItemStatus, BulkResponse, BulkUpdateItem, CreateProduct, Product,
    ProductBody, UpdateProduct,
};
use crate::store::{BulkWrite, BulkWriteOutcome, DocumentStore, StoreError, StoredDocument};
use crate::uniqueness::NameIndex;

/// Upper bound on concurrent store lookups issued by a single bulk call
const BULK_LOOKUP_CONCURRENCY: usize = 8;

/// A bulk update item that passed its checks and is ready to be written
struct PreparedUpdate {
    index: usize,
    name: String,
    write: BulkWrite,
}

/// Repository trait for Product persistence
///
/// Writes are guarded by revision tokens; name uniqueness is checked
/// against the `by_name` index before each write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Create a new product, generating an id when none is given
    async fn create(&self, input: CreateProduct) -> ProductResult<Product>;

    /// Get a live product by ID
    async fn get_by_id(&self, id: &str) -> ProductResult<Product>;

    /// List every live product
    async fn get_all(&self) -> ProductResult<Vec<Product>>;

    /// Replace name and price; `input.rev` must be the current revision
    async fn update_by_id(&self, id: &str, input: UpdateProduct) -> ProductResult<Product>;

    /// Tombstone a product at the given revision
    async fn delete_by_id(&self, id: &str, rev: &str) -> ProductResult<()>;

    /// Create many products in one batch.
    ///
    /// Rejects the whole batch with `DuplicateName` if any name is already
    /// taken. Names inside the batch are not checked against each other.
    async fn bulk_create(&self, items: Vec<CreateProduct>) -> ProductResult<BulkResponse>;

    /// Update many products in one batch, skipping ineligible items
    async fn bulk_update(&self, items: Vec<BulkUpdateItem>) -> ProductResult<BulkResponse>;
}

/// ProductRepository over any [`DocumentStore`]
pub struct StoreProductRepository<S> {
    store: Arc<S>,
    names: NameIndex<S>,
}

impl<S: DocumentStore> StoreProductRepository<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Build over a store handle shared with other components
    pub fn from_shared(store: Arc<S>) -> Self {
        let names = NameIndex::new(Arc::clone(&store));
        Self { store, names }
    }

    /// Fetch the raw live document, hiding design documents
    async fn fetch(&self, id: &str) -> ProductResult<(StoredDocument, Product)> {
        if is_reserved(id) {
            return Err(ProductError::NotFound(id.to_string()));
        }

        let doc = self.store.get(id).await?;
        let product = decode(doc.clone())?;
        Ok((doc, product))
    }

    /// Check one bulk update item and turn it into a write, or a skip report
    async fn prepare_update(
        &self,
        index: usize,
        item: BulkUpdateItem,
    ) -> Result<PreparedUpdate, BulkItemResult> {
        let id = match item.id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(BulkItemResult::skipped(index, None, "missing id")),
        };
        let rev = match item.rev {
            Some(rev) if !rev.is_empty() => rev,
            _ => return Err(BulkItemResult::skipped(index, Some(id), "missing revision")),
        };

        let (doc, product) = match self.fetch(&id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(product_id = %id, error = %e, "Skipping bulk update item");
                return Err(BulkItemResult::skipped(
                    index,
                    Some(id),
                    format!("lookup failed: {}", e),
                ));
            }
        };

        // CouchDB rejects a malformed rev for the whole `_bulk_docs` request,
        // so a stale or bogus one must never reach the batch
        if rev != doc.rev {
            return Err(BulkItemResult::failed(index, id, "revision conflict"));
        }

        if product.name != item.name {
            match self.names.is_taken(&item.name, Some(&id)).await {
                Ok(false) => {}
                Ok(true) => {
                    return Err(BulkItemResult::skipped(
                        index,
                        Some(id),
                        format!("name '{}' already taken", item.name),
                    ))
                }
                Err(e) => {
                    return Err(BulkItemResult::skipped(
                        index,
                        Some(id),
                        format!("uniqueness check failed: {}", e),
                    ))
                }
            }
        }

        let body = merge_body(doc.body, &ProductBody::new(item.name.clone(), item.price));
        Ok(PreparedUpdate {
            index,
            name: item.name,
            write: BulkWrite {
                id,
                rev: Some(doc.rev),
                body,
            },
        })
    }
}

fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

/// Ids starting with `_` belong to the store (design documents and the like).
/// An empty id would address the database itself.
fn is_reserved(id: &str) -> bool {
    id.is_empty() || id.starts_with('_')
}

fn decode(doc: StoredDocument) -> ProductResult<Product> {
    Product::try_from(doc).map_err(|e| ProductError::Store(StoreError::from(e)))
}

/// Overlay name and price on the stored body, keeping any other fields
fn merge_body(current: Value, update: &ProductBody) -> Value {
    match (current, update.to_value()) {
        (Value::Object(mut current), Value::Object(update)) => {
            current.extend(update);
            Value::Object(current)
        }
        (_, update) => update,
    }
}

fn bulk_result(index: usize, outcome: BulkWriteOutcome, on_success: BulkItemStatus) -> BulkItemResult {
    match outcome {
        BulkWriteOutcome::Written { id, rev } => BulkItemResult::written(index, id, rev, on_success),
        BulkWriteOutcome::Conflict { id } => {
            let reason = match on_success {
                BulkItemStatus::Created => "id already exists",
                _ => "revision conflict",
            };
            BulkItemResult::failed(index, id, reason)
        }
        BulkWriteOutcome::Failed { id, reason } => BulkItemResult::failed(index, id, reason),
    }
}

fn log_bulk_summary(operation: &str, response: &BulkResponse) {
    info!(
        operation,
        succeeded = response.succeeded,
        skipped = response.skipped,
        failed = response.failed,
        "Bulk operation finished"
    );
}

#[async_trait]
impl<S: DocumentStore + 'static> ProductRepository for StoreProductRepository<S> {
    #[instrument(skip(self, input), fields(product_name = %input.name))]
    async fn create(&self, input: CreateProduct) -> ProductResult<Product> {
        if input.name.trim().is_empty() {
            return Err(ProductError::Validation("name must not be empty".to_string()));
        }

        let id = input.id.unwrap_or_else(generate_id);
        if is_reserved(&id) {
            return Err(ProductError::Validation(format!(
                "id '{}' is reserved: ids may not be empty or start with '_'",
                id
            )));
        }

        if self.names.is_taken(&input.name, None).await? {
            return Err(ProductError::DuplicateName(input.name));
        }

        let body = ProductBody::new(input.name, input.price);
        // no retry here: a lost acknowledgement would turn into a duplicate insert
        let rev = match self.store.put(&id, None, body.to_value()).await {
            Ok(rev) => rev,
            Err(StoreError::Conflict { .. }) => return Err(ProductError::IdTaken(id)),
            Err(e) => return Err(e.into()),
        };

        info!(product_id = %id, %rev, "Product created");
        Ok(Product::from_body(id, rev, body))
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: &str) -> ProductResult<Product> {
        let (_, product) = self.fetch(id).await?;
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn get_all(&self) -> ProductResult<Vec<Product>> {
        let docs = self.store.all_docs().await?;

        let products = docs
            .into_iter()
            .filter(|doc| !doc.is_design())
            .filter_map(|doc| {
                let id = doc.id.clone();
                match Product::try_from(doc) {
                    Ok(product) => Some(product),
                    Err(e) => {
                        warn!(doc_id = %id, error = %e, "Skipping document that is not a product");
                        None
                    }
                }
            })
            .collect();

        Ok(products)
    }

    #[instrument(skip(self, input), fields(product_name = %input.name))]
    async fn update_by_id(&self, id: &str, input: UpdateProduct) -> ProductResult<Product> {
        let (current, product) = self.fetch(id).await?;

        if input.rev != current.rev {
            return Err(ProductError::RevisionConflict(id.to_string()));
        }

        if input.name != product.name && self.names.is_taken(&input.name, Some(id)).await? {
            return Err(ProductError::DuplicateName(input.name));
        }

        let update = ProductBody::new(input.name, input.price);
        let body = merge_body(current.body, &update);
        // a writer racing past the revision check above still loses here
        let rev = self.store.put(id, Some(current.rev), body).await?;

        info!(product_id = %id, %rev, "Product updated");
        Ok(Product::from_body(id, rev, update))
    }

    #[instrument(skip(self))]
    async fn delete_by_id(&self, id: &str, rev: &str) -> ProductResult<()> {
        if is_reserved(id) {
            return Err(ProductError::NotFound(id.to_string()));
        }

        self.store.delete(id, rev).await?;
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn bulk_create(&self, items: Vec<CreateProduct>) -> ProductResult<BulkResponse> {
        if items.is_empty() {
            return Err(ProductError::NoValidItems);
        }

        let checks: Vec<_> = stream::iter(items.iter().map(|item| item.name.clone()).collect::<Vec<_>>())
            .map(|name| async move { self.names.is_taken(&name, None).await })
            .buffered(BULK_LOOKUP_CONCURRENCY)
            .collect()
            .await;

        for (item, taken) in items.iter().zip(checks) {
            if taken? {
                return Err(ProductError::DuplicateName(item.name.clone()));
            }
        }

        let mut writes = Vec::with_capacity(items.len());
        for item in items {
            let id = item.id.unwrap_or_else(generate_id);
            if is_reserved(&id) {
                return Err(ProductError::Validation(format!(
                    "id '{}' is reserved: ids may not be empty or start with '_'",
                    id
                )));
            }
            writes.push(BulkWrite {
                id,
                rev: None,
                body: ProductBody::new(item.name, item.price).to_value(),
            });
        }

        let outcomes = self.store.bulk_put(writes).await?;
        let results = outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| bulk_result(index, outcome, BulkItemStatus::Created))
            .collect();

        let response = BulkResponse::from_items(results);
        log_bulk_summary("bulk_create", &response);
        Ok(response)
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn bulk_update(&self, items: Vec<BulkUpdateItem>) -> ProductResult<BulkResponse> {
        let prepared: Vec<_> = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move { self.prepare_update(index, item).await })
            .buffered(BULK_LOOKUP_CONCURRENCY)
            .collect()
            .await;

        let mut results = Vec::with_capacity(prepared.len());
        let mut indices = Vec::new();
        let mut writes = Vec::new();
        // target name -> id of the earlier item in this batch that claimed it
        let mut claimed: HashMap<String, String> = HashMap::new();
        for entry in prepared {
            let update = match entry {
                Ok(update) => update,
                Err(rejected) => {
                    results.push(rejected);
                    continue;
                }
            };

            match claimed.get(&update.name) {
                Some(owner) if *owner != update.write.id => {
                    results.push(BulkItemResult::skipped(
                        update.index,
                        Some(update.write.id),
                        "name already taken in batch",
                    ));
                }
                _ => {
                    claimed.insert(update.name, update.write.id.clone());
                    indices.push(update.index);
                    writes.push(update.write);
                }
            }
        }

        if writes.is_empty() {
            if results.iter().all(|r| r.status == BulkItemStatus::Skipped) {
                warn!(skipped = results.len(), "Bulk update had no eligible items");
                return Err(ProductError::NoValidItems);
            }

            let response = BulkResponse::from_items(results);
            log_bulk_summary("bulk_update", &response);
            return Ok(response);
        }

        let outcomes = self.store.bulk_put(writes).await?;
        results.extend(
            indices
                .into_iter()
                .zip(outcomes)
                .map(|(index, outcome)| bulk_result(index, outcome, BulkItemStatus::Updated)),
        );

        let response = BulkResponse::from_items(results);
        log_bulk_summary("bulk_update", &response);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{IndexRow, MockDocumentStore};
    use mockall::predicate::eq;
    use serde_json::json;

    fn stored(id: &str, rev: &str, name: &str, price: f64) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            rev: rev.to_string(),
            body: json!({ "name": name, "price": price }),
        }
    }

    fn create_input(name: &str) -> CreateProduct {
        CreateProduct {
            id: None,
            name: name.to_string(),
            price: 9.99,
        }
    }

    #[tokio::test]
    async fn test_create_is_not_retried_on_transport_failure() {
        let mut store = MockDocumentStore::new();
        store.expect_query_index().returning(|_, _| Ok(vec![]));
        store
            .expect_put()
            .times(1)
            .returning(|_, _, _| Err(StoreError::Transport("connection reset".into())));

        let repo = StoreProductRepository::new(store);
        let err = repo.create(create_input("Widget")).await.unwrap_err();

        assert!(matches!(err, ProductError::Store(StoreError::Transport(_))));
    }

    #[tokio::test]
    async fn test_create_with_existing_id_is_id_taken() {
        let mut store = MockDocumentStore::new();
        store.expect_query_index().returning(|_, _| Ok(vec![]));
        store
            .expect_put()
            .withf(|id, rev, _| id == "p1" && rev.is_none())
            .returning(|id, _, _| Err(StoreError::Conflict { id: id.to_string() }));

        let repo = StoreProductRepository::new(store);
        let input = CreateProduct {
            id: Some("p1".into()),
            ..create_input("Widget")
        };

        let err = repo.create(input).await.unwrap_err();
        assert!(matches!(err, ProductError::IdTaken(ref id) if id == "p1"));
    }

    #[tokio::test]
    async fn test_create_duplicate_name_never_writes() {
        let mut store = MockDocumentStore::new();
        store
            .expect_query_index()
            .with(eq("by_name"), eq("Widget"))
            .returning(|_, key| {
                Ok(vec![IndexRow {
                    key: key.to_string(),
                    id: "other".into(),
                }])
            });
        store.expect_put().never();

        let repo = StoreProductRepository::new(store);
        let err = repo.create(create_input("Widget")).await.unwrap_err();

        assert!(matches!(err, ProductError::DuplicateName(ref name) if name == "Widget"));
    }

    #[tokio::test]
    async fn test_create_rejects_reserved_id() {
        let store = MockDocumentStore::new();
        let repo = StoreProductRepository::new(store);
        let input = CreateProduct {
            id: Some("_design/products".into()),
            ..create_input("Widget")
        };

        let err = repo.create(input).await.unwrap_err();
        assert!(matches!(err, ProductError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_id_is_reserved() {
        // no expectations: touching the store would panic
        let store = MockDocumentStore::new();
        let repo = StoreProductRepository::new(store);

        let err = repo.get_by_id("").await.unwrap_err();
        assert!(matches!(err, ProductError::NotFound(_)));

        let input = CreateProduct {
            id: Some(String::new()),
            ..create_input("Widget")
        };
        let err = repo.create(input).await.unwrap_err();
        assert!(matches!(err, ProductError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_design_document_is_not_found() {
        // no expectations: touching the store would panic
        let store = MockDocumentStore::new();
        let repo = StoreProductRepository::new(store);

        let err = repo.get_by_id("_design/products").await.unwrap_err();
        assert!(matches!(err, ProductError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_with_stale_revision_never_writes() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .with(eq("p1"))
            .returning(|_| Ok(stored("p1", "2-current", "Widget", 1.0)));
        store.expect_put().never();

        let repo = StoreProductRepository::new(store);
        let input = UpdateProduct {
            rev: "1-stale".into(),
            name: "Widget".into(),
            price: 2.0,
        };

        let err = repo.update_by_id("p1", input).await.unwrap_err();
        assert!(matches!(err, ProductError::RevisionConflict(_)));
    }

    #[tokio::test]
    async fn test_update_keeping_name_skips_uniqueness_check() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .returning(|_| Ok(stored("p1", "1-a", "Widget", 1.0)));
        store.expect_query_index().never();
        store
            .expect_put()
            .withf(|id, rev, body| {
                id == "p1" && rev.as_deref() == Some("1-a") && body["price"] == json!(2.5)
            })
            .returning(|_, _, _| Ok("2-b".into()));

        let repo = StoreProductRepository::new(store);
        let input = UpdateProduct {
            rev: "1-a".into(),
            name: "Widget".into(),
            price: 2.5,
        };

        let product = repo.update_by_id("p1", input).await.unwrap();
        assert_eq!(product.rev, "2-b");
        assert_eq!(product.price, 2.5);
    }

    #[tokio::test]
    async fn test_update_lost_race_is_revision_conflict() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .returning(|_| Ok(stored("p1", "1-a", "Widget", 1.0)));
        store
            .expect_put()
            .returning(|id, _, _| Err(StoreError::Conflict { id: id.to_string() }));

        let repo = StoreProductRepository::new(store);
        let input = UpdateProduct {
            rev: "1-a".into(),
            name: "Widget".into(),
            price: 2.0,
        };

        let err = repo.update_by_id("p1", input).await.unwrap_err();
        assert!(matches!(err, ProductError::RevisionConflict(_)));
    }

    #[test]
    fn test_merge_body_keeps_unknown_fields() {
        let merged = merge_body(
            json!({ "name": "Old", "price": 1.0, "legacy_sku": "A-1" }),
            &ProductBody::new("New", 2.0),
        );
        assert_eq!(
            merged,
            json!({ "name": "New", "price": 2.0, "legacy_sku": "A-1" })
        );
    }

    #[tokio::test]
    async fn test_bulk_update_skips_item_whose_lookup_fails() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .with(eq("a"))
            .returning(|_| Ok(stored("a", "1-a", "Alpha", 1.0)));
        store
            .expect_get()
            .with(eq("b"))
            .returning(|_| Err(StoreError::Transport("timeout".into())));
        store
            .expect_bulk_put()
            .withf(|writes| writes.len() == 1 && writes[0].id == "a")
            .returning(|_| {
                Ok(vec![BulkWriteOutcome::Written {
                    id: "a".into(),
                    rev: "2-a".into(),
                }])
            });

        let repo = StoreProductRepository::new(store);
        let items = vec![
            BulkUpdateItem {
                id: Some("a".into()),
                rev: Some("1-a".into()),
                name: "Alpha".into(),
                price: 3.0,
            },
            BulkUpdateItem {
                id: Some("b".into()),
                rev: Some("1-b".into()),
                name: "Beta".into(),
                price: 3.0,
            },
        ];

        let response = repo.bulk_update(items).await.unwrap();
        assert_eq!(response.succeeded, 1);
        assert_eq!(response.skipped, 1);
        assert_eq!(response.items[1].status, BulkItemStatus::Skipped);
        assert_eq!(response.items[1].id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_bulk_update_stale_revision_never_reaches_store() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .returning(|id| Ok(stored(id, "2-x", "Alpha", 1.0)));
        store.expect_bulk_put().never();

        let repo = StoreProductRepository::new(store);
        let items = vec![BulkUpdateItem {
            id: Some("a".into()),
            rev: Some("abc".into()),
            name: "Alpha".into(),
            price: 3.0,
        }];

        let response = repo.bulk_update(items).await.unwrap();
        assert_eq!(response.failed, 1);
        assert_eq!(response.items[0].status, BulkItemStatus::Failed);
        assert_eq!(response.items[0].reason.as_deref(), Some("revision conflict"));
    }

    #[tokio::test]
    async fn test_bulk_update_reports_store_conflicts_as_failed() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .returning(|id| Ok(stored(id, "1-stale", "Alpha", 1.0)));
        store.expect_bulk_put().returning(|writes| {
            Ok(writes
                .into_iter()
                .map(|w| BulkWriteOutcome::Conflict { id: w.id })
                .collect())
        });

        let repo = StoreProductRepository::new(store);
        let items = vec![BulkUpdateItem {
            id: Some("a".into()),
            rev: Some("1-stale".into()),
            name: "Alpha".into(),
            price: 3.0,
        }];

        let response = repo.bulk_update(items).await.unwrap();
        assert_eq!(response.failed, 1);
        assert_eq!(response.items[0].reason.as_deref(), Some("revision conflict"));
    }

    #[tokio::test]
    async fn test_bulk_update_with_nothing_eligible() {
        let mut store = MockDocumentStore::new();
        store.expect_bulk_put().never();

        let repo = StoreProductRepository::new(store);
        let items = vec![BulkUpdateItem {
            id: None,
            rev: None,
            name: "Alpha".into(),
            price: 1.0,
        }];

        let err = repo.bulk_update(items).await.unwrap_err();
        assert!(matches!(err, ProductError::NoValidItems));
    }

    #[tokio::test]
    async fn test_bulk_create_store_failure_fails_whole_call() {
        let mut store = MockDocumentStore::new();
        store.expect_query_index().returning(|_, _| Ok(vec![]));
        store
            .expect_bulk_put()
            .returning(|_| Err(StoreError::Transport("connection refused".into())));

        let repo = StoreProductRepository::new(store);
        let err = repo
            .bulk_create(vec![create_input("Alpha"), create_input("Beta")])
            .await
            .unwrap_err();

        assert!(matches!(err, ProductError::Store(_)));
    }
}
