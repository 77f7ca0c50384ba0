//! Name uniqueness checks over the `by_name` index.
//!
//! Check-then-act: two concurrent writers can both pass the check. The
//! index only narrows that window, it does not close it.

use std::sync::Arc;
use tracing::debug;

use crate::store::{DocumentStore, StoreResult, BY_NAME_INDEX};

pub struct NameIndex<S> {
    store: Arc<S>,
}

impl<S> Clone for NameIndex<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> NameIndex<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Ids of live documents carrying exactly `name`
    pub async fn owners(&self, name: &str) -> StoreResult<Vec<String>> {
        let rows = self.store.query_index(BY_NAME_INDEX, name).await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    /// Whether a live document other than `exclude_id` carries `name`
    pub async fn is_taken(&self, name: &str, exclude_id: Option<&str>) -> StoreResult<bool> {
        let owners = self.owners(name).await?;
        let taken = owners.iter().any(|id| Some(id.as_str()) != exclude_id);
        debug!(name, ?exclude_id, taken, "Name uniqueness checked");
        Ok(taken)
    }
}
