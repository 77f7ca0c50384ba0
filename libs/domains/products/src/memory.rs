//! In-memory document store
//!
//! Mirrors the revision rules of the CouchDB gateway so the repository can be
//! exercised without a server.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{
    BulkWrite, BulkWriteOutcome, DocumentStore, IndexRow, StoreError, StoreResult,
    StoredDocument, BY_NAME_INDEX,
};

#[derive(Debug, Clone)]
struct Entry {
    generation: u64,
    rev: String,
    body: Value,
    deleted: bool,
}

/// Thread-safe document store held in a map. Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    docs: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live documents
    pub async fn len(&self) -> usize {
        self.docs.read().await.values().filter(|e| !e.deleted).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn next_rev(generation: u64) -> String {
    format!("{}-{}", generation, Uuid::new_v4().simple())
}

/// Apply one write under the caller's lock
fn apply_write(
    docs: &mut HashMap<String, Entry>,
    id: &str,
    rev: Option<&str>,
    body: Value,
) -> StoreResult<String> {
    let conflict = || StoreError::Conflict { id: id.to_string() };

    let generation = match (docs.get(id), rev) {
        (None, None) => 1,
        (None, Some(_)) => return Err(conflict()),
        // a tombstoned id can be recreated without a revision
        (Some(entry), None) if entry.deleted => entry.generation + 1,
        (Some(_), None) => return Err(conflict()),
        (Some(entry), Some(rev)) if entry.rev == rev && !entry.deleted => entry.generation + 1,
        (Some(_), Some(_)) => return Err(conflict()),
    };

    let rev = next_rev(generation);
    docs.insert(
        id.to_string(),
        Entry {
            generation,
            rev: rev.clone(),
            body,
            deleted: false,
        },
    );
    Ok(rev)
}

fn live_document(id: &str, entry: &Entry) -> Option<StoredDocument> {
    (!entry.deleted).then(|| StoredDocument {
        id: id.to_string(),
        rev: entry.rev.clone(),
        body: entry.body.clone(),
    })
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: &str) -> StoreResult<StoredDocument> {
        let docs = self.docs.read().await;
        docs.get(id)
            .and_then(|entry| live_document(id, entry))
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn put(&self, id: &str, rev: Option<String>, body: Value) -> StoreResult<String> {
        let mut docs = self.docs.write().await;
        apply_write(&mut docs, id, rev.as_deref(), body)
    }

    async fn delete(&self, id: &str, rev: &str) -> StoreResult<String> {
        let mut docs = self.docs.write().await;
        let entry = match docs.get_mut(id) {
            Some(entry) if !entry.deleted => entry,
            _ => return Err(StoreError::NotFound { id: id.to_string() }),
        };

        if entry.rev != rev {
            return Err(StoreError::Conflict { id: id.to_string() });
        }

        entry.generation += 1;
        entry.rev = next_rev(entry.generation);
        entry.body = Value::Null;
        entry.deleted = true;
        Ok(entry.rev.clone())
    }

    async fn bulk_put(&self, writes: Vec<BulkWrite>) -> StoreResult<Vec<BulkWriteOutcome>> {
        let mut docs = self.docs.write().await;
        let outcomes = writes
            .into_iter()
            .map(
                |write| match apply_write(&mut docs, &write.id, write.rev.as_deref(), write.body) {
                    Ok(rev) => BulkWriteOutcome::Written { id: write.id, rev },
                    Err(StoreError::Conflict { id }) => BulkWriteOutcome::Conflict { id },
                    Err(e) => BulkWriteOutcome::Failed {
                        id: write.id,
                        reason: e.to_string(),
                    },
                },
            )
            .collect();
        Ok(outcomes)
    }

    async fn query_index(&self, index: &str, key: &str) -> StoreResult<Vec<IndexRow>> {
        if index != BY_NAME_INDEX {
            return Err(StoreError::Backend {
                status: 404,
                error: "not_found".to_string(),
                reason: "missing_named_view".to_string(),
            });
        }

        let docs = self.docs.read().await;
        let mut rows: Vec<IndexRow> = docs
            .iter()
            .filter(|(id, entry)| !entry.deleted && !id.starts_with("_design/"))
            .filter(|(_, entry)| entry.body.get("name").and_then(Value::as_str) == Some(key))
            .map(|(id, _)| IndexRow {
                key: key.to_string(),
                id: id.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    async fn all_docs(&self) -> StoreResult<Vec<StoredDocument>> {
        let docs = self.docs.read().await;
        let mut live: Vec<StoredDocument> = docs
            .iter()
            .filter_map(|(id, entry)| live_document(id, entry))
            .collect();
        live.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(live)
    }
}
