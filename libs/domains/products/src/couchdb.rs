//! CouchDB implementation of the document store gateway

use async_trait::async_trait;
use database::couchdb::CouchDatabase;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::store::{
    BulkWrite, BulkWriteOutcome, DocumentStore, IndexRow, StoreError, StoreResult,
    StoredDocument, BY_NAME_INDEX, BY_NAME_MAP_FN, DESIGN_DOC_ID,
};

/// Document store backed by a single CouchDB database
#[derive(Clone, Debug)]
pub struct CouchDocumentStore {
    db: CouchDatabase,
}

impl CouchDocumentStore {
    pub fn new(db: CouchDatabase) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &CouchDatabase {
        &self.db
    }

    /// Install the product views.
    ///
    /// Safe to call on every startup: an identical design document is left
    /// alone, an outdated one is replaced.
    #[instrument(skip(self), fields(db = %self.db.name()))]
    pub async fn init_indexes(&self) -> StoreResult<()> {
        let views = json!({ BY_NAME_INDEX: { "map": BY_NAME_MAP_FN } });

        let rev = match self.get(DESIGN_DOC_ID).await {
            Ok(existing) if existing.body.get("views") == Some(&views) => {
                info!("Design document up to date");
                return Ok(());
            }
            Ok(existing) => Some(existing.rev),
            Err(StoreError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        let body = json!({ "language": "javascript", "views": views });
        match self.put(DESIGN_DOC_ID, rev, body).await {
            Ok(rev) => info!(%rev, "Design document installed"),
            Err(StoreError::Conflict { .. }) => {
                info!("Design document installed concurrently, proceeding")
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct CouchErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct WriteAck {
    rev: String,
}

#[derive(Debug, Deserialize)]
struct BulkRow {
    id: Option<String>,
    rev: Option<String>,
    error: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ViewResponse<R> {
    rows: Vec<R>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    doc: Option<Value>,
}

/// Percent-encode a document id for use as a path segment.
/// Design document ids keep their literal `_design/` prefix.
fn doc_path(id: &str) -> String {
    match id.strip_prefix("_design/") {
        Some(name) => format!("_design/{}", urlencoding::encode(name)),
        None => urlencoding::encode(id).into_owned(),
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_decode() {
        StoreError::Serialization(err.to_string())
    } else {
        StoreError::Transport(err.to_string())
    }
}

async fn backend_error(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let body: CouchErrorBody = response.json().await.unwrap_or_default();
    StoreError::Backend {
        status,
        error: body.error,
        reason: body.reason,
    }
}

/// Map a failed single-document response to a store error.
///
/// `with_rev` marks writes that carried a caller revision: CouchDB answers a
/// malformed one with 400 `bad_request`, which is still a lost revision check.
async fn document_error(id: &str, response: Response, with_rev: bool) -> StoreError {
    let status = response.status();
    let body: CouchErrorBody = response.json().await.unwrap_or_default();
    classify_document_error(id, status, body, with_rev)
}

fn classify_document_error(
    id: &str,
    status: StatusCode,
    body: CouchErrorBody,
    with_rev: bool,
) -> StoreError {
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound { id: id.to_string() },
        StatusCode::CONFLICT => StoreError::Conflict { id: id.to_string() },
        StatusCode::BAD_REQUEST if with_rev && body.error == "bad_request" => {
            StoreError::Conflict { id: id.to_string() }
        }
        status => StoreError::Backend {
            status: status.as_u16(),
            error: body.error,
            reason: body.reason,
        },
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> StoreResult<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(StoreError::Serialization(format!(
            "document has no string '{}'",
            key
        ))),
    }
}

/// Split CouchDB's `_id`/`_rev` envelope off a raw document
fn split_envelope(value: Value) -> StoreResult<StoredDocument> {
    let Value::Object(mut map) = value else {
        return Err(StoreError::Serialization(
            "document is not a JSON object".to_string(),
        ));
    };

    let id = take_string(&mut map, "_id")?;
    let rev = take_string(&mut map, "_rev")?;
    map.retain(|key, _| !key.starts_with('_'));

    Ok(StoredDocument {
        id,
        rev,
        body: Value::Object(map),
    })
}

/// Attach the `_id`/`_rev` envelope to a document body
fn with_envelope(id: Option<&str>, rev: Option<&str>, body: Value) -> Value {
    let mut map = match body {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Some(id) = id {
        map.insert("_id".to_string(), Value::String(id.to_string()));
    }
    if let Some(rev) = rev {
        map.insert("_rev".to_string(), Value::String(rev.to_string()));
    }
    Value::Object(map)
}

/// Pair `_bulk_docs` result rows with the submitted ids.
///
/// CouchDB answers in submission order; a missing row counts as a failure.
fn bulk_outcomes(ids: Vec<String>, rows: Vec<BulkRow>) -> Vec<BulkWriteOutcome> {
    let mut rows = rows.into_iter();
    ids.into_iter()
        .map(|submitted| match rows.next() {
            Some(BulkRow {
                id,
                rev: Some(rev),
                error: None,
                ..
            }) => BulkWriteOutcome::Written {
                id: id.unwrap_or(submitted),
                rev,
            },
            Some(BulkRow {
                error: Some(error), ..
            }) if error == "conflict" => BulkWriteOutcome::Conflict { id: submitted },
            Some(row) => BulkWriteOutcome::Failed {
                id: submitted,
                reason: match (row.error, row.reason) {
                    (Some(error), Some(reason)) => format!("{}: {}", error, reason),
                    (Some(error), None) => error,
                    _ => "store returned no revision".to_string(),
                },
            },
            None => BulkWriteOutcome::Failed {
                id: submitted,
                reason: "missing from store response".to_string(),
            },
        })
        .collect()
}

#[async_trait]
impl DocumentStore for CouchDocumentStore {
    #[instrument(skip(self), fields(db = %self.db.name()))]
    async fn get(&self, id: &str) -> StoreResult<StoredDocument> {
        let response = self
            .db
            .request(Method::GET, &doc_path(id))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(document_error(id, response, false).await);
        }

        let value: Value = response.json().await.map_err(transport_error)?;
        split_envelope(value)
    }

    #[instrument(skip(self, body), fields(db = %self.db.name()))]
    async fn put(&self, id: &str, rev: Option<String>, body: Value) -> StoreResult<String> {
        let with_rev = rev.is_some();
        let response = self
            .db
            .request(Method::PUT, &doc_path(id))
            .json(&with_envelope(None, rev.as_deref(), body))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(document_error(id, response, with_rev).await);
        }

        let ack: WriteAck = response.json().await.map_err(transport_error)?;
        debug!(rev = %ack.rev, "Document written");
        Ok(ack.rev)
    }

    #[instrument(skip(self), fields(db = %self.db.name()))]
    async fn delete(&self, id: &str, rev: &str) -> StoreResult<String> {
        let response = self
            .db
            .request(Method::DELETE, &doc_path(id))
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(document_error(id, response, true).await);
        }

        let ack: WriteAck = response.json().await.map_err(transport_error)?;
        Ok(ack.rev)
    }

    #[instrument(skip(self, writes), fields(db = %self.db.name(), count = writes.len()))]
    async fn bulk_put(&self, writes: Vec<BulkWrite>) -> StoreResult<Vec<BulkWriteOutcome>> {
        if writes.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = writes.iter().map(|w| w.id.clone()).collect();
        let docs: Vec<Value> = writes
            .into_iter()
            .map(|w| with_envelope(Some(&w.id), w.rev.as_deref(), w.body))
            .collect();

        let response = self
            .db
            .request(Method::POST, "_bulk_docs")
            .json(&json!({ "docs": docs }))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let rows: Vec<BulkRow> = response.json().await.map_err(transport_error)?;
        let outcomes = bulk_outcomes(ids, rows);

        let rejected = outcomes
            .iter()
            .filter(|o| !matches!(o, BulkWriteOutcome::Written { .. }))
            .count();
        if rejected > 0 {
            warn!(rejected, "Batch write partially rejected");
        }

        Ok(outcomes)
    }

    #[instrument(skip(self), fields(db = %self.db.name()))]
    async fn query_index(&self, index: &str, key: &str) -> StoreResult<Vec<IndexRow>> {
        let path = format!("{}/_view/{}", doc_path(DESIGN_DOC_ID), urlencoding::encode(index));
        let key = serde_json::to_string(key)?;

        let response = self
            .db
            .request(Method::GET, &path)
            .query(&[("key", key.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let view: ViewResponse<IndexRow> = response.json().await.map_err(transport_error)?;
        Ok(view.rows)
    }

    #[instrument(skip(self), fields(db = %self.db.name()))]
    async fn all_docs(&self) -> StoreResult<Vec<StoredDocument>> {
        let response = self
            .db
            .request(Method::GET, "_all_docs")
            .query(&[("include_docs", "true")])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let listing: ViewResponse<AllDocsRow> = response.json().await.map_err(transport_error)?;
        listing
            .rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(split_envelope)
            .collect()
    }
}
