//! CouchDB integration tests
//!
//! These run the repository against a real CouchDB via testcontainers and
//! need Docker: `cargo test -p domain_products -- --ignored`.

use domain_products::*;
use test_utils::{assertions::*, TestCouchDb, TestDataBuilder};

async fn repository(
    couch: &TestCouchDb,
    builder: &TestDataBuilder,
) -> StoreProductRepository<CouchDocumentStore> {
    let db = couch.database(&builder.database_name()).await;
    let store = CouchDocumentStore::new(db);
    store.init_indexes().await.unwrap();
    StoreProductRepository::new(store)
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_init_indexes_is_idempotent() {
    let couch = TestCouchDb::new().await;
    let builder = TestDataBuilder::from_test_name("init_indexes_idempotent");
    let store = CouchDocumentStore::new(couch.database(&builder.database_name()).await);

    store.init_indexes().await.unwrap();
    let installed = store.get("_design/products").await.unwrap();

    store.init_indexes().await.unwrap();
    let again = store.get("_design/products").await.unwrap();
    assert_eq!(installed.rev, again.rev);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_crud_round_trip() {
    let couch = TestCouchDb::new().await;
    let builder = TestDataBuilder::from_test_name("couch_crud_round_trip");
    let repo = repository(&couch, &builder).await;

    let created = repo
        .create(CreateProduct {
            id: None,
            name: "Widget".into(),
            price: 9.99,
        })
        .await
        .unwrap();

    let updated = repo
        .update_by_id(
            &created.id,
            UpdateProduct {
                rev: created.rev.clone(),
                name: "Widget2".into(),
                price: 12.5,
            },
        )
        .await
        .unwrap();
    assert_rev_advanced(&created.rev, &updated.rev, "couch update");

    let stale = repo.delete_by_id(&created.id, &created.rev).await.unwrap_err();
    assert!(matches!(stale, ProductError::RevisionConflict(_)));

    repo.delete_by_id(&updated.id, &updated.rev).await.unwrap();
    let gone = repo.get_by_id(&created.id).await.unwrap_err();
    assert!(matches!(gone, ProductError::NotFound(_)));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_name_index_sees_writes() {
    let couch = TestCouchDb::new().await;
    let builder = TestDataBuilder::from_test_name("couch_name_index");
    let repo = repository(&couch, &builder).await;

    repo.create(CreateProduct {
        id: Some(builder.id("first")),
        name: "X".into(),
        price: 1.0,
    })
    .await
    .unwrap();

    let err = repo
        .create(CreateProduct {
            id: None,
            name: "X".into(),
            price: 1.0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ProductError::DuplicateName(_)));

    let all = repo.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_bulk_update_against_couchdb() {
    let couch = TestCouchDb::new().await;
    let builder = TestDataBuilder::from_test_name("couch_bulk_update");
    let repo = repository(&couch, &builder).await;

    let created = repo
        .bulk_create(vec![
            CreateProduct {
                id: Some(builder.id("a")),
                name: "Alpha".into(),
                price: 1.0,
            },
            CreateProduct {
                id: Some(builder.id("b")),
                name: "Beta".into(),
                price: 1.0,
            },
        ])
        .await
        .unwrap();
    assert_eq!(created.succeeded, 2);

    let alpha = &created.items[0];
    let response = repo
        .bulk_update(vec![
            BulkUpdateItem {
                id: alpha.id.clone(),
                rev: alpha.rev.clone(),
                name: "Alpha".into(),
                price: 3.0,
            },
            BulkUpdateItem {
                id: Some(builder.id("b")),
                rev: None,
                name: "Beta".into(),
                price: 3.0,
            },
        ])
        .await
        .unwrap();

    assert_eq!(response.succeeded, 1);
    assert_eq!(response.skipped, 1);
    assert_eq!(repo.get_by_id(&builder.id("a")).await.unwrap().price, 3.0);
}
