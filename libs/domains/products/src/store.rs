//! Document store gateway.
//!
//! A revisioned key/value store of JSON documents with a secondary
//! name index. Every write must present the document's current revision
//! (none for a fresh id); a stale revision yields [`StoreError::Conflict`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Design document holding the product views
pub const DESIGN_DOC_ID: &str = "_design/products";

/// View mapping `name -> id` for every live document carrying a name
pub const BY_NAME_INDEX: &str = "by_name";

/// Map function installed for [`BY_NAME_INDEX`]
pub const BY_NAME_MAP_FN: &str = "function(doc) { if (doc.name) emit(doc.name, doc._id); }";

/// A document as read from the store. `body` excludes the `_id`/`_rev` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub rev: String,
    pub body: Value,
}

impl StoredDocument {
    pub fn is_design(&self) -> bool {
        self.id.starts_with("_design/")
    }
}

/// One document of a batch write
#[derive(Debug, Clone, PartialEq)]
pub struct BulkWrite {
    pub id: String,
    /// Current revision, `None` to create
    pub rev: Option<String>,
    pub body: Value,
}

/// Per-document result of a batch write, in input order
#[derive(Debug, Clone, PartialEq)]
pub enum BulkWriteOutcome {
    Written { id: String, rev: String },
    Conflict { id: String },
    Failed { id: String, reason: String },
}

/// Row of a secondary index query
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexRow {
    pub key: String,
    pub id: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {id} not found")]
    NotFound { id: String },

    #[error("document update conflict on {id}")]
    Conflict { id: String },

    #[error("store unreachable: {0}")]
    Transport(String),

    #[error("store answered {status} {error}: {reason}")]
    Backend {
        status: u16,
        error: String,
        reason: String,
    },

    #[error("malformed document: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Failures worth retrying later; never retried here
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport(_) => true,
            StoreError::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Gateway to a revisioned document store.
///
/// Implementations must be safe to share between concurrent requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the live document with `id`
    async fn get(&self, id: &str) -> StoreResult<StoredDocument>;

    /// Create (`rev = None`) or replace a document; returns the new revision
    async fn put(&self, id: &str, rev: Option<String>, body: Value) -> StoreResult<String>;

    /// Tombstone a document; returns the tombstone revision
    async fn delete(&self, id: &str, rev: &str) -> StoreResult<String>;

    /// Write several documents in one round trip. Each document succeeds or
    /// fails on its own; the batch is not atomic.
    async fn bulk_put(&self, writes: Vec<BulkWrite>) -> StoreResult<Vec<BulkWriteOutcome>>;

    /// Exact-key lookup on a secondary index
    async fn query_index(&self, index: &str, key: &str) -> StoreResult<Vec<IndexRow>>;

    /// Every live document, design documents included, ordered by id
    async fn all_docs(&self) -> StoreResult<Vec<StoredDocument>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(StoreError::Transport("reset".into()).is_transient());
        assert!(StoreError::Backend {
            status: 503,
            error: "unavailable".into(),
            reason: "maintenance".into()
        }
        .is_transient());
        assert!(!StoreError::Backend {
            status: 400,
            error: "bad_request".into(),
            reason: "invalid json".into()
        }
        .is_transient());
        assert!(!StoreError::Conflict { id: "p1".into() }.is_transient());
    }

    #[test]
    fn test_design_document_detection() {
        let doc = StoredDocument {
            id: DESIGN_DOC_ID.into(),
            rev: "1-a".into(),
            body: Value::Null,
        };
        assert!(doc.is_design());
    }
}
